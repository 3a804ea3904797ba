/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fs;

use crate::errors::{GuardError, Result};
use crate::registry::entry::FOLDER_SENTINEL;
use crate::registry::pathname::{self, RelPath};
use crate::registry::{is_reserved, Registry};

/// What a free-form argument turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    File(RelPath),
    Collection(String),
    Folder(RelPath),
}

/// Explicit `file|collection|folder` keyword; short-circuits detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    File,
    Collection,
    Folder,
}

impl Keyword {
    pub fn parse(word: &str) -> Option<Keyword> {
        match word {
            "file" => Some(Keyword::File),
            "collection" => Some(Keyword::Collection),
            "folder" => Some(Keyword::Folder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: Target,
    /// A file on disk shadowed a same-named collection; the file won.
    pub shadowed_collection: bool,
}

impl Resolution {
    fn plain(target: Target) -> Resolution {
        Resolution {
            target,
            shadowed_collection: false,
        }
    }
}

/// Classify one argument. Detection priority: existing directory, existing
/// regular file, collection name, registered file entry. Classification is
/// the single place this ordering lives.
pub fn resolve(registry: &Registry, arg: &str, keyword: Option<Keyword>) -> Result<Resolution> {
    match keyword {
        Some(Keyword::File) => {
            let path = canonical(registry, arg)?;
            if on_disk_kind(registry, &path) == DiskKind::Regular
                || registry.file(&path).is_some()
            {
                Ok(Resolution::plain(Target::File(path)))
            } else {
                Err(GuardError::NotFound(format!("file '{}'", arg)))
            }
        }
        Some(Keyword::Collection) => {
            if registry.collection(arg).is_some() {
                Ok(Resolution::plain(Target::Collection(arg.to_owned())))
            } else {
                Err(GuardError::NotFound(format!("collection '{}'", arg)))
            }
        }
        Some(Keyword::Folder) => {
            let path = canonical(registry, arg)?;
            if on_disk_kind(registry, &path) == DiskKind::Directory {
                Ok(Resolution::plain(Target::Folder(path)))
            } else {
                Err(GuardError::NotFound(format!("folder '{}'", arg)))
            }
        }
        None => auto_detect(registry, arg),
    }
}

fn auto_detect(registry: &Registry, arg: &str) -> Result<Resolution> {
    // The sentinel spelling of a folder-collection (`@logs`) addresses the
    // directory behind it.
    if let Some(dir) = arg.strip_prefix(FOLDER_SENTINEL) {
        if let Ok(path) = canonical(registry, dir) {
            if on_disk_kind(registry, &path) == DiskKind::Directory {
                return Ok(Resolution::plain(Target::Folder(path)));
            }
        }
        return Err(GuardError::NotFound(format!("folder '{}'", arg)));
    }
    if let Ok(path) = canonical(registry, arg) {
        match on_disk_kind(registry, &path) {
            DiskKind::Directory => return Ok(Resolution::plain(Target::Folder(path))),
            DiskKind::Regular => {
                return Ok(Resolution {
                    shadowed_collection: registry.collection(arg).is_some(),
                    target: Target::File(path),
                });
            }
            DiskKind::Absent => {}
        }
    }
    if registry.collection(arg).is_some() {
        return Ok(Resolution::plain(Target::Collection(arg.to_owned())));
    }
    // Registered but gone from disk; `remove` and `show` still accept it.
    if let Ok(path) = canonical(registry, arg) {
        if registry.file(&path).is_some() {
            return Ok(Resolution::plain(Target::File(path)));
        }
    }
    Err(GuardError::NotFound(format!("'{}'", arg)))
}

/// Reserved-word enforcement; runs before any name creates a collection or
/// folder.
pub fn ensure_name_allowed(name: &str) -> Result<()> {
    if is_reserved(name) {
        return Err(GuardError::Reserved(name.to_owned()));
    }
    if name.is_empty() {
        return Err(GuardError::Invalid("empty name".to_owned()));
    }
    if name.starts_with(FOLDER_SENTINEL) {
        return Err(GuardError::Invalid(format!(
            "collection name '{}' is reserved for folders",
            name
        )));
    }
    Ok(())
}

#[derive(PartialEq, Eq)]
enum DiskKind {
    Directory,
    Regular,
    Absent,
}

fn canonical(registry: &Registry, arg: &str) -> Result<RelPath> {
    pathname::canonicalize(registry.workspace(), arg)
        .map_err(|err| GuardError::Invalid(err.to_string()))
}

fn on_disk_kind(registry: &Registry, path: &RelPath) -> DiskKind {
    match fs::symlink_metadata(path.to_path(registry.workspace())) {
        Ok(meta) if meta.is_dir() => DiskKind::Directory,
        Ok(meta) if meta.is_file() => DiskKind::Regular,
        _ => DiskKind::Absent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::registry::config::GuardConfig;
    use crate::registry::entry::Collection;
    use tempfile::TempDir;

    fn rel(path: &str) -> RelPath {
        RelPath::try_from(path).unwrap()
    }

    fn setup() -> (TempDir, Registry) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("logs")).unwrap();
        std::fs::write(temp.path().join("a.txt"), "a").unwrap();
        std::fs::write(temp.path().join("docs"), "a file named docs").unwrap();
        let mut registry = Registry::new(temp.path().to_path_buf(), GuardConfig::default());
        registry.add_collection(Collection::new("docs".to_owned()));
        registry.add_collection(Collection::new("sources".to_owned()));
        registry.register_file(rel("gone.txt"), 0o644, String::new(), String::new());
        (temp, registry)
    }

    #[test]
    fn directory_wins_over_everything() {
        let (_temp, registry) = setup();
        assert_eq!(
            Target::Folder(rel("logs")),
            resolve(&registry, "logs", None).unwrap().target
        );
    }

    #[test]
    fn file_on_disk_wins_over_collection_with_warning() {
        let (_temp, registry) = setup();
        let resolution = resolve(&registry, "docs", None).unwrap();
        assert_eq!(Target::File(rel("docs")), resolution.target);
        assert!(resolution.shadowed_collection);

        let plain = resolve(&registry, "a.txt", None).unwrap();
        assert_eq!(Target::File(rel("a.txt")), plain.target);
        assert!(!plain.shadowed_collection);
    }

    #[test]
    fn collection_name_resolves_when_no_file_exists() {
        let (_temp, registry) = setup();
        assert_eq!(
            Target::Collection("sources".to_owned()),
            resolve(&registry, "sources", None).unwrap().target
        );
    }

    #[test]
    fn registered_but_missing_file_still_resolves() {
        let (_temp, registry) = setup();
        assert_eq!(
            Target::File(rel("gone.txt")),
            resolve(&registry, "gone.txt", None).unwrap().target
        );
    }

    #[test]
    fn unknown_argument_is_not_found() {
        let (_temp, registry) = setup();
        let err = resolve(&registry, "nothing-here", None).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn keywords_short_circuit() {
        let (_temp, registry) = setup();
        // Explicit collection keyword beats the file on disk.
        assert_eq!(
            Target::Collection("docs".to_owned()),
            resolve(&registry, "docs", Some(Keyword::Collection))
                .unwrap()
                .target
        );
        // Explicit file keyword refuses a directory.
        assert!(resolve(&registry, "logs", Some(Keyword::File)).is_err());
        // Explicit folder keyword refuses a regular file.
        assert!(resolve(&registry, "a.txt", Some(Keyword::Folder)).is_err());
    }

    #[test]
    fn sentinel_spelling_addresses_the_folder() {
        let (_temp, registry) = setup();
        assert_eq!(
            Target::Folder(rel("logs")),
            resolve(&registry, "@logs", None).unwrap().target
        );
        assert!(resolve(&registry, "@absent", None).is_err());
    }

    #[test]
    fn sentinel_prefix_is_not_a_valid_collection_name() {
        assert!(matches!(
            ensure_name_allowed("@logs"),
            Err(GuardError::Invalid(_))
        ));
    }

    #[test]
    fn reserved_names_are_rejected() {
        assert!(matches!(
            ensure_name_allowed("toggle"),
            Err(GuardError::Reserved(_))
        ));
        assert!(matches!(
            ensure_name_allowed("from"),
            Err(GuardError::Reserved(_))
        ));
        assert!(ensure_name_allowed("mycoll").is_ok());
    }
}
