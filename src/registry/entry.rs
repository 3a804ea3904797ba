/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use serde::{Deserialize, Serialize};

use super::config::octal_mode;
use super::pathname::RelPath;

/// Registry record for one workspace file. The `original_*` fields are
/// captured at first registration and never overwritten afterwards; they
/// are what `disable` restores.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub path: RelPath,
    pub guard: bool,
    #[serde(rename = "mode", with = "octal_mode")]
    pub original_mode: u32,
    #[serde(rename = "owner")]
    pub original_owner: String,
    #[serde(rename = "group")]
    pub original_group: String,
}

/// User-named set of registered files. Member order is insertion order and
/// is preserved for display.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Collection {
    pub name: String,
    pub guard: bool,
    #[serde(rename = "files")]
    pub members: Vec<RelPath>,
}

impl Collection {
    pub fn new(name: String) -> Self {
        Collection {
            name,
            guard: false,
            members: Vec::new(),
        }
    }

    pub fn contains(&self, path: &RelPath) -> bool {
        self.members.contains(path)
    }
}

/// A collection whose membership is the direct-child regular files of one
/// workspace directory, materialized at operation time. The `@`-prefixed
/// name keeps it distinguishable in the shared namespace.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Folder {
    pub name: String,
    pub path: RelPath,
    pub guard: bool,
}

pub const FOLDER_SENTINEL: char = '@';

impl Folder {
    pub fn new(path: RelPath) -> Self {
        Folder {
            name: Folder::name_for(&path),
            path,
            guard: false,
        }
    }

    pub fn name_for(path: &RelPath) -> String {
        format!("{}{}", FOLDER_SENTINEL, path)
    }
}

/// Derived guard indicator of a displayed entity; computed, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardState {
    /// Explicitly guarded.
    Guarded,
    /// Tracked, not guarded.
    Unguarded,
    /// Collection not guarded itself, but every member is (via another
    /// collection or folder).
    Implicit,
    /// Members disagree.
    Mixed,
    /// Not in the registry at all.
    Untracked,
}

impl GuardState {
    pub fn indicator(self) -> char {
        match self {
            GuardState::Guarded => 'G',
            GuardState::Unguarded => '-',
            GuardState::Implicit => 'g',
            GuardState::Mixed => '~',
            GuardState::Untracked => '·',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_name_carries_sentinel() {
        let folder = Folder::new(RelPath::try_from("logs/archive").unwrap());
        assert_eq!("@logs/archive", folder.name);
        assert!(!folder.guard);
    }

    #[test]
    fn indicators() {
        assert_eq!('G', GuardState::Guarded.indicator());
        assert_eq!('-', GuardState::Unguarded.indicator());
        assert_eq!('g', GuardState::Implicit.indicator());
        assert_eq!('~', GuardState::Mixed.indicator());
        assert_eq!('·', GuardState::Untracked.indicator());
    }

    #[test]
    fn file_entry_serializes_with_short_field_names() {
        let entry = FileEntry {
            path: RelPath::try_from("a.txt").unwrap(),
            guard: true,
            original_mode: 0o644,
            original_owner: "alice".to_owned(),
            original_group: String::new(),
        };
        let yaml = serde_yaml::to_string(&entry).unwrap();
        assert!(yaml.contains("mode: '0644'"), "unexpected yaml: {}", yaml);
        assert!(yaml.contains("owner: alice"), "unexpected yaml: {}", yaml);
        let back: FileEntry = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(entry, back);
    }
}
