/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

pub mod config;
pub mod entry;
pub mod pathname;

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{GuardError, Result};
use crate::platform::{Platform, PlatformError};
use config::GuardConfig;
use entry::{Collection, FileEntry, Folder, GuardState, FOLDER_SENTINEL};
use pathname::RelPath;

pub const STATE_FILE_NAME: &str = ".guardfile";
const STATE_TMP_NAME: &str = ".guardfile.tmp";

/// Structural tokens of the CLI grammar; never valid as collection or
/// folder names.
pub const RESERVED_KEYWORDS: [&str; 11] = [
    "file",
    "collection",
    "folder",
    "add",
    "remove",
    "enable",
    "disable",
    "toggle",
    "show",
    "to",
    "from",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_KEYWORDS.contains(&name)
}

/// The entire persistent state of one workspace: configuration, file
/// entries, collections, and folder-collections. Serialization order of the
/// fields is the on-disk key order of `.guardfile`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Registry {
    #[serde(skip)]
    workspace: PathBuf,
    pub config: GuardConfig,
    files: Vec<FileEntry>,
    collections: Vec<Collection>,
    folders: Vec<Folder>,
}

impl Registry {
    pub fn new(workspace: PathBuf, config: GuardConfig) -> Self {
        Registry {
            workspace,
            config,
            files: Vec::new(),
            collections: Vec::new(),
            folders: Vec::new(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn state_path(&self) -> PathBuf {
        self.workspace.join(STATE_FILE_NAME)
    }

    pub fn exists(workspace: &Path) -> bool {
        workspace.join(STATE_FILE_NAME).is_file()
    }

    /// Load and validate the state file. Any structural violation rejects
    /// the whole document with a single `Malformed` error.
    pub fn load(workspace: &Path) -> Result<Registry> {
        let state_path = workspace.join(STATE_FILE_NAME);
        let text = match fs::read_to_string(&state_path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(GuardError::NotFound(format!("'{}'", STATE_FILE_NAME)));
            }
            Err(err) => return Err(err.into()),
        };
        let mut registry: Registry =
            serde_yaml::from_str(&text).map_err(|err| GuardError::Malformed(err.to_string()))?;
        registry.workspace = workspace.to_path_buf();
        registry.validate()?;
        debug!(
            "loaded registry: {} file(s), {} collection(s), {} folder(s)",
            registry.files.len(),
            registry.collections.len(),
            registry.folders.len()
        );
        Ok(registry)
    }

    fn validate(&self) -> Result<()> {
        for entry in &self.files {
            let canonical = pathname::canonicalize(&self.workspace, entry.path.as_str())
                .map_err(|err| GuardError::Malformed(err.to_string()))?;
            if canonical != entry.path {
                return Err(GuardError::Malformed(format!(
                    "file path '{}' is not stored canonical",
                    entry.path
                )));
            }
            if self.files.iter().filter(|e| e.path == entry.path).count() > 1 {
                return Err(GuardError::Malformed(format!(
                    "duplicate file entry '{}'",
                    entry.path
                )));
            }
        }
        for collection in &self.collections {
            self.validate_name(&collection.name)?;
            if collection.name.starts_with(FOLDER_SENTINEL) {
                return Err(GuardError::Malformed(format!(
                    "collection name '{}' carries the folder sentinel",
                    collection.name
                )));
            }
            for member in &collection.members {
                if self.file(member).is_none() {
                    return Err(GuardError::Malformed(format!(
                        "collection '{}' references unregistered file '{}'",
                        collection.name, member
                    )));
                }
            }
        }
        for folder in &self.folders {
            if folder.name != Folder::name_for(&folder.path) {
                return Err(GuardError::Malformed(format!(
                    "folder name '{}' does not match its path '{}'",
                    folder.name, folder.path
                )));
            }
            if self.folders.iter().filter(|f| f.path == folder.path).count() > 1 {
                return Err(GuardError::Malformed(format!(
                    "duplicate folder entry '{}'",
                    folder.path
                )));
            }
        }
        Ok(())
    }

    fn validate_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(GuardError::Malformed("empty collection name".to_owned()));
        }
        if is_reserved(name) {
            return Err(GuardError::Malformed(format!(
                "collection name '{}' is a reserved keyword",
                name
            )));
        }
        if self.collections.iter().filter(|c| c.name == name).count() > 1 {
            return Err(GuardError::Malformed(format!(
                "duplicate collection '{}'",
                name
            )));
        }
        Ok(())
    }

    /// Persist the registry. This is the only write path to the state file;
    /// every mutating operation must end here.
    ///
    /// Protocol: clear the immutable flag if set (failing loudly when the
    /// platform refuses), write a sibling temporary file, atomically rename
    /// it over the state file, then re-set the immutable flag when a guard
    /// is active and the privilege is there. A crash between any two steps
    /// leaves either the old or the new contents, never a torn file.
    pub fn save(&self, platform: &dyn Platform) -> Result<()> {
        let state_path = self.state_path();
        if state_path.exists() {
            match platform.is_immutable(&state_path) {
                Ok(true) => {
                    platform
                        .set_immutable(&state_path, false)
                        .map_err(|err| match err {
                            PlatformError::Denied => {
                                GuardError::Denied(format!("'{}'", STATE_FILE_NAME))
                            }
                            other => GuardError::Invalid(format!(
                                "cannot clear immutable flag on '{}': {}",
                                STATE_FILE_NAME, other
                            )),
                        })?;
                }
                Ok(false) => {}
                Err(PlatformError::Denied) => {
                    return Err(GuardError::Denied(format!("'{}'", STATE_FILE_NAME)));
                }
                Err(_) => {}
            }
        }

        let yaml = serde_yaml::to_string(self)
            .map_err(|err| GuardError::Invalid(format!("cannot serialize state: {}", err)))?;
        let tmp_path = self.workspace.join(STATE_TMP_NAME);
        fs::write(&tmp_path, yaml)?;
        self.apply_state_file_attributes(&tmp_path, platform);
        fs::rename(&tmp_path, &state_path)?;

        if self.any_guard_active() && platform.has_elevated_privilege() {
            if let Err(err) = platform.set_immutable(&state_path, true) {
                warn!("could not protect '{}': {}", STATE_FILE_NAME, err);
            }
        }
        Ok(())
    }

    /// The state file carries the configured ownership and mode, widened
    /// with owner read/write so the registry stays usable unprivileged.
    fn apply_state_file_attributes(&self, tmp_path: &Path, platform: &dyn Platform) {
        use std::os::unix::fs::PermissionsExt;
        let mode = self.config.mode | 0o600;
        if let Err(err) = fs::set_permissions(tmp_path, fs::Permissions::from_mode(mode)) {
            warn!("could not set mode on '{}': {}", STATE_FILE_NAME, err);
        }
        if platform.has_elevated_privilege()
            && (self.config.owner_opt().is_some() || self.config.group_opt().is_some())
        {
            if let Err(err) =
                platform.chown(tmp_path, self.config.owner_opt(), self.config.group_opt())
            {
                debug!("could not chown '{}': {}", STATE_FILE_NAME, err);
            }
        }
    }

    /// Delete the state file, clearing the immutable flag first.
    pub fn delete_state_file(&self, platform: &dyn Platform) -> Result<()> {
        let state_path = self.state_path();
        if let Ok(true) = platform.is_immutable(&state_path) {
            platform
                .set_immutable(&state_path, false)
                .map_err(|_| GuardError::Denied(format!("'{}'", STATE_FILE_NAME)))?;
        }
        fs::remove_file(&state_path)?;
        Ok(())
    }

    // Lookups. Linear scans: a workspace registry holds tens of entries,
    // not thousands.

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn file(&self, path: &RelPath) -> Option<&FileEntry> {
        self.files.iter().find(|entry| &entry.path == path)
    }

    pub fn file_mut(&mut self, path: &RelPath) -> Option<&mut FileEntry> {
        self.files.iter_mut().find(|entry| &entry.path == path)
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn collection_mut(&mut self, name: &str) -> Option<&mut Collection> {
        self.collections.iter_mut().find(|c| c.name == name)
    }

    pub fn folder_by_path(&self, path: &RelPath) -> Option<&Folder> {
        self.folders.iter().find(|f| &f.path == path)
    }

    pub fn folder_by_path_mut(&mut self, path: &RelPath) -> Option<&mut Folder> {
        self.folders.iter_mut().find(|f| &f.path == path)
    }

    pub fn collections_containing(&self, path: &RelPath) -> Vec<&str> {
        self.collections
            .iter()
            .filter(|c| c.contains(path))
            .map(|c| c.name.as_str())
            .collect()
    }

    // Mutations. These touch only the in-memory model; callers persist via
    // `save`.

    /// Register a path, capturing its original attributes. Re-registration
    /// is a no-op that keeps the first capture intact.
    pub fn register_file(&mut self, path: RelPath, mode: u32, owner: String, group: String) -> bool {
        if self.file(&path).is_some() {
            return false;
        }
        self.files.push(FileEntry {
            path,
            guard: false,
            original_mode: mode,
            original_owner: owner,
            original_group: group,
        });
        true
    }

    /// Drop a file entry and every membership referencing it.
    pub fn drop_file(&mut self, path: &RelPath) -> bool {
        let before = self.files.len();
        self.files.retain(|entry| &entry.path != path);
        for collection in &mut self.collections {
            collection.members.retain(|member| member != path);
        }
        before != self.files.len()
    }

    pub fn add_collection(&mut self, collection: Collection) {
        self.collections.push(collection);
    }

    pub fn drop_collection(&mut self, name: &str) -> bool {
        let before = self.collections.len();
        self.collections.retain(|c| c.name != name);
        before != self.collections.len()
    }

    pub fn ensure_folder(&mut self, path: &RelPath) {
        if self.folder_by_path(path).is_none() {
            self.folders.push(Folder::new(path.clone()));
        }
    }

    pub fn drop_folder(&mut self, path: &RelPath) -> bool {
        let before = self.folders.len();
        self.folders.retain(|f| &f.path != path);
        before != self.folders.len()
    }

    // Derived state.

    pub fn any_guard_active(&self) -> bool {
        self.files.iter().any(|entry| entry.guard)
            || self.collections.iter().any(|c| c.guard)
            || self.folders.iter().any(|f| f.guard)
    }

    pub fn file_state(&self, path: &RelPath) -> GuardState {
        match self.file(path) {
            Some(entry) if entry.guard => GuardState::Guarded,
            Some(_) => GuardState::Unguarded,
            None => GuardState::Untracked,
        }
    }

    /// Fold over a set of member guard flags.
    fn fold_states(tracked: &[bool]) -> GuardState {
        if tracked.is_empty() || tracked.iter().all(|guarded| !guarded) {
            GuardState::Unguarded
        } else if tracked.iter().all(|guarded| *guarded) {
            GuardState::Guarded
        } else {
            GuardState::Mixed
        }
    }

    pub fn collection_state(&self, name: &str) -> GuardState {
        let collection = match self.collection(name) {
            Some(collection) => collection,
            None => return GuardState::Untracked,
        };
        if collection.guard {
            return GuardState::Guarded;
        }
        let members: Vec<bool> = collection
            .members
            .iter()
            .filter_map(|path| self.file(path))
            .map(|entry| entry.guard)
            .collect();
        match Registry::fold_states(&members) {
            // Every member protected through some other collection/folder.
            GuardState::Guarded => GuardState::Implicit,
            other => other,
        }
    }

    /// Effective state of a directory, folded over its direct-child regular
    /// files that are registered. Untracked unless a folder entry exists;
    /// the folder's own flag only steers toggling, never the display.
    pub fn folder_state(&self, path: &RelPath) -> GuardState {
        if self.folder_by_path(path).is_none() {
            return GuardState::Untracked;
        }
        Registry::fold_states(&self.tracked_children(path))
    }

    fn tracked_children(&self, path: &RelPath) -> Vec<bool> {
        self.disk_children(path)
            .into_iter()
            .filter_map(|child| self.file(&child))
            .map(|entry| entry.guard)
            .collect()
    }

    /// Direct-child regular files of a workspace directory, in name order.
    /// Symlinks and the state file itself are skipped; traversal is never
    /// recursive.
    pub fn disk_children(&self, path: &RelPath) -> Vec<RelPath> {
        let dir = path.to_path(&self.workspace);
        let mut children = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return children,
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(name) => name,
                None => continue,
            };
            if name == STATE_FILE_NAME || name == STATE_TMP_NAME {
                continue;
            }
            match entry.file_type() {
                Ok(kind) if kind.is_file() => children.push(path.join(name)),
                _ => {}
            }
        }
        children.sort();
        children
    }

    /// Whether a file stays protected by some guarded collection or folder,
    /// optionally ignoring one collection (the one being mutated).
    pub fn guarded_by_other(&self, path: &RelPath, exclude: Option<&str>) -> bool {
        let by_collection = self.collections.iter().any(|c| {
            c.guard && Some(c.name.as_str()) != exclude && c.contains(path)
        });
        let by_folder = self
            .folders
            .iter()
            .any(|f| f.guard && Some(f.name.as_str()) != exclude && path.is_direct_child_of(&f.path));
        by_collection || by_folder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::platform::fake::FakePlatform;
    use crate::platform::HostPlatform;
    use tempfile::TempDir;

    fn rel(path: &str) -> RelPath {
        RelPath::try_from(path).unwrap()
    }

    fn sample_registry(workspace: &Path) -> Registry {
        let mut registry = Registry::new(
            workspace.to_path_buf(),
            GuardConfig {
                mode: 0o000,
                owner: String::new(),
                group: String::new(),
            },
        );
        registry.register_file(rel("a.txt"), 0o644, "alice".to_owned(), "staff".to_owned());
        registry.register_file(rel("b.txt"), 0o600, String::new(), String::new());
        let mut docs = Collection::new("docs".to_owned());
        docs.members.push(rel("a.txt"));
        registry.add_collection(docs);
        registry
    }

    #[test]
    fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "a").unwrap();
        std::fs::write(temp.path().join("b.txt"), "b").unwrap();
        let registry = sample_registry(temp.path());

        registry.save(&HostPlatform).unwrap();
        let loaded = Registry::load(temp.path()).unwrap();
        assert_eq!(registry, loaded);
    }

    #[test]
    fn state_file_key_order_is_stable() {
        let temp = TempDir::new().unwrap();
        let registry = sample_registry(temp.path());
        std::fs::write(temp.path().join("a.txt"), "a").unwrap();
        std::fs::write(temp.path().join("b.txt"), "b").unwrap();

        registry.save(&HostPlatform).unwrap();
        let text = std::fs::read_to_string(temp.path().join(STATE_FILE_NAME)).unwrap();
        let config_at = text.find("config:").unwrap();
        let files_at = text.find("files:").unwrap();
        let collections_at = text.find("collections:").unwrap();
        let folders_at = text.find("folders:").unwrap();
        assert!(config_at < files_at);
        assert!(files_at < collections_at);
        assert!(collections_at < folders_at);
        assert!(text.contains("guard_mode: '0000'"), "yaml: {}", text);
    }

    #[test]
    fn load_missing_state_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Registry::load(temp.path()),
            Err(GuardError::NotFound(_))
        ));
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(STATE_FILE_NAME),
            "config:\n  guard_mode: '0000'\n  guard_owner: ''\n  guard_group: ''\nfiles: []\ncollections: []\nfolders: []\nsurprise: 1\n",
        )
        .unwrap();
        assert!(matches!(
            Registry::load(temp.path()),
            Err(GuardError::Malformed(_))
        ));
    }

    #[test]
    fn load_rejects_member_without_file_entry() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(STATE_FILE_NAME),
            "config:\n  guard_mode: '0000'\n  guard_owner: ''\n  guard_group: ''\nfiles: []\ncollections:\n- name: docs\n  guard: false\n  files: [a.txt]\nfolders: []\n",
        )
        .unwrap();
        assert!(matches!(
            Registry::load(temp.path()),
            Err(GuardError::Malformed(_))
        ));
    }

    #[test]
    fn load_rejects_reserved_collection_name() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(STATE_FILE_NAME),
            "config:\n  guard_mode: '0000'\n  guard_owner: ''\n  guard_group: ''\nfiles: []\ncollections:\n- name: toggle\n  guard: false\n  files: []\nfolders: []\n",
        )
        .unwrap();
        assert!(matches!(
            Registry::load(temp.path()),
            Err(GuardError::Malformed(_))
        ));
    }

    #[test]
    fn load_rejects_escaping_path() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(STATE_FILE_NAME),
            "config:\n  guard_mode: '0000'\n  guard_owner: ''\n  guard_group: ''\nfiles:\n- path: ../outside.txt\n  guard: false\n  mode: '0644'\n  owner: ''\n  group: ''\ncollections: []\nfolders: []\n",
        )
        .unwrap();
        assert!(matches!(
            Registry::load(temp.path()),
            Err(GuardError::Malformed(_))
        ));
    }

    #[test]
    fn load_rejects_path_through_symlink() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real");
        std::fs::create_dir(&real).unwrap();
        std::fs::write(real.join("data.txt"), "content").unwrap();
        std::os::unix::fs::symlink(&real, temp.path().join("link")).unwrap();
        std::fs::write(
            temp.path().join(STATE_FILE_NAME),
            "config:\n  guard_mode: '0000'\n  guard_owner: ''\n  guard_group: ''\nfiles:\n- path: link/data.txt\n  guard: false\n  mode: '0644'\n  owner: ''\n  group: ''\ncollections: []\nfolders: []\n",
        )
        .unwrap();
        assert!(matches!(
            Registry::load(temp.path()),
            Err(GuardError::Malformed(_))
        ));
    }

    #[test]
    fn reregistration_preserves_originals() {
        let temp = TempDir::new().unwrap();
        let mut registry = sample_registry(temp.path());

        assert!(!registry.register_file(
            rel("a.txt"),
            0o000,
            "intruder".to_owned(),
            "wheel".to_owned()
        ));
        let entry = registry.file(&rel("a.txt")).unwrap();
        assert_eq!(0o644, entry.original_mode);
        assert_eq!("alice", entry.original_owner);
        assert_eq!("staff", entry.original_group);
    }

    #[test]
    fn drop_file_removes_memberships() {
        let temp = TempDir::new().unwrap();
        let mut registry = sample_registry(temp.path());

        assert!(registry.drop_file(&rel("a.txt")));
        assert!(registry.file(&rel("a.txt")).is_none());
        assert!(registry.collection("docs").unwrap().members.is_empty());
        // The collection itself survives.
        assert!(registry.collection("docs").is_some());
    }

    #[test]
    fn collection_state_derivation() {
        let temp = TempDir::new().unwrap();
        let mut registry = sample_registry(temp.path());
        let mut both = Collection::new("both".to_owned());
        both.members.push(rel("a.txt"));
        both.members.push(rel("b.txt"));
        registry.add_collection(both);

        assert_eq!(GuardState::Unguarded, registry.collection_state("both"));
        registry.file_mut(&rel("a.txt")).unwrap().guard = true;
        assert_eq!(GuardState::Mixed, registry.collection_state("both"));
        registry.file_mut(&rel("b.txt")).unwrap().guard = true;
        assert_eq!(GuardState::Implicit, registry.collection_state("both"));
        registry.collection_mut("both").unwrap().guard = true;
        assert_eq!(GuardState::Guarded, registry.collection_state("both"));
        assert_eq!(GuardState::Untracked, registry.collection_state("nope"));
    }

    #[test]
    fn folder_state_derivation() {
        let temp = TempDir::new().unwrap();
        let logs = temp.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        std::fs::write(logs.join("one.log"), "1").unwrap();
        std::fs::write(logs.join("two.log"), "2").unwrap();

        let mut registry = Registry::new(temp.path().to_path_buf(), GuardConfig::default());
        assert_eq!(GuardState::Untracked, registry.folder_state(&rel("logs")));

        registry.ensure_folder(&rel("logs"));
        registry.register_file(rel("logs/one.log"), 0o644, String::new(), String::new());
        registry.register_file(rel("logs/two.log"), 0o644, String::new(), String::new());
        assert_eq!(GuardState::Unguarded, registry.folder_state(&rel("logs")));

        registry.file_mut(&rel("logs/one.log")).unwrap().guard = true;
        assert_eq!(GuardState::Mixed, registry.folder_state(&rel("logs")));

        registry.file_mut(&rel("logs/two.log")).unwrap().guard = true;
        assert_eq!(GuardState::Guarded, registry.folder_state(&rel("logs")));
    }

    #[test]
    fn disk_children_is_non_recursive_and_skips_state_file() {
        let temp = TempDir::new().unwrap();
        let logs = temp.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        std::fs::create_dir(logs.join("nested")).unwrap();
        std::fs::write(logs.join("nested").join("deep.log"), "x").unwrap();
        std::fs::write(logs.join("one.log"), "1").unwrap();

        let registry = Registry::new(temp.path().to_path_buf(), GuardConfig::default());
        assert_eq!(vec![rel("logs/one.log")], registry.disk_children(&rel("logs")));

        // The state file never registers itself.
        std::fs::write(temp.path().join(STATE_FILE_NAME), "").unwrap();
        std::fs::write(temp.path().join("top.txt"), "t").unwrap();
        let children: Vec<String> = registry
            .disk_children(&rel("top.txt"))
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert!(children.is_empty(), "not a directory: {:?}", children);
    }

    #[test]
    fn guarded_by_other_checks_collections_and_folders() {
        let temp = TempDir::new().unwrap();
        let mut registry = sample_registry(temp.path());
        registry.collection_mut("docs").unwrap().guard = true;

        assert!(registry.guarded_by_other(&rel("a.txt"), None));
        assert!(!registry.guarded_by_other(&rel("a.txt"), Some("docs")));
        assert!(!registry.guarded_by_other(&rel("b.txt"), None));

        registry.ensure_folder(&rel("logs"));
        registry.folder_by_path_mut(&rel("logs")).unwrap().guard = true;
        registry.register_file(rel("logs/x.log"), 0o644, String::new(), String::new());
        assert!(registry.guarded_by_other(&rel("logs/x.log"), None));
        assert!(!registry.guarded_by_other(&rel("logs/x.log"), Some("@logs")));
    }

    #[test]
    fn save_is_atomic_and_ignores_stale_tmp() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "a").unwrap();
        std::fs::write(temp.path().join("b.txt"), "b").unwrap();
        let registry = sample_registry(temp.path());
        registry.save(&HostPlatform).unwrap();

        // A crash after writing the temp file but before the rename leaves
        // a stray sibling; the next load must see the committed state.
        std::fs::write(temp.path().join(STATE_TMP_NAME), "files: [garbage").unwrap();
        let loaded = Registry::load(temp.path()).unwrap();
        assert_eq!(registry, loaded);

        // And the next save replaces the stray temp file.
        loaded.save(&HostPlatform).unwrap();
        assert!(!temp.path().join(STATE_TMP_NAME).exists());
    }

    #[test]
    fn save_fails_loudly_when_immutable_cannot_be_cleared() {
        let temp = TempDir::new().unwrap();
        let registry = sample_registry(temp.path());
        let state_path = registry.state_path();
        std::fs::write(&state_path, "placeholder").unwrap();

        let platform = FakePlatform::new();
        platform.add_file(&state_path, 0o644, 0, 0);
        platform
            .files
            .borrow_mut()
            .get_mut(&state_path)
            .unwrap()
            .immutable = true;
        platform.deny_next("set_immutable", &state_path);

        let result = registry.save(&platform);
        assert!(matches!(result, Err(GuardError::Denied(_))));
        // The refused save must not have replaced the old contents.
        assert_eq!(
            "placeholder",
            std::fs::read_to_string(&state_path).unwrap()
        );
    }

    #[test]
    fn state_file_stays_owner_accessible_with_zero_mode() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "a").unwrap();
        std::fs::write(temp.path().join("b.txt"), "b").unwrap();
        let registry = sample_registry(temp.path());
        registry.save(&HostPlatform).unwrap();

        let mode = std::fs::metadata(registry.state_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(0o600, mode & 0o777);
    }
}
