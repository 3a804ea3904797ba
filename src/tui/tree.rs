/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::HashSet;

use walkdir::WalkDir;

use crate::registry::pathname::RelPath;
use crate::registry::{Registry, STATE_FILE_NAME};
use crate::resolver::Target;

/// Entries the Files panel never shows.
const HIDDEN_NAMES: [&str; 2] = [".git", STATE_FILE_NAME];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    /// A directory in the Files panel.
    Dir(RelPath),
    /// A regular file in the Files panel.
    File(RelPath),
    /// A collection heading in the Collections panel.
    Collection(String),
    /// A folder-collection heading in the Collections panel.
    Folder(RelPath),
    /// A member file listed under an expanded collection or folder.
    Member(RelPath),
}

/// One visible line of a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Stable identity across rebuilds; selection and expansion key.
    pub id: String,
    pub depth: usize,
    pub label: String,
    pub indicator: char,
    pub kind: RowKind,
    pub expandable: bool,
    pub expanded: bool,
}

impl Row {
    /// What `Space` should toggle for this row.
    pub fn toggle_target(&self) -> Target {
        match &self.kind {
            RowKind::Dir(path) | RowKind::Folder(path) => Target::Folder(path.clone()),
            RowKind::File(path) | RowKind::Member(path) => Target::File(path.clone()),
            RowKind::Collection(name) => Target::Collection(name.clone()),
        }
    }
}

/// Files panel: the workspace directory tree, folders collapsed unless
/// their id is in `expanded`, directories before files, name order.
pub fn files_rows(registry: &Registry, expanded: &HashSet<String>) -> Vec<Row> {
    let mut rows = Vec::new();
    push_dir_level(registry, None, 0, expanded, &mut rows);
    rows
}

fn push_dir_level(
    registry: &Registry,
    dir: Option<&RelPath>,
    depth: usize,
    expanded: &HashSet<String>,
    rows: &mut Vec<Row>,
) {
    let abs = match dir {
        Some(dir) => dir.to_path(registry.workspace()),
        None => registry.workspace().to_path_buf(),
    };
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in WalkDir::new(&abs)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        let name = match entry.file_name().to_str() {
            Some(name) => name.to_owned(),
            None => continue,
        };
        if HIDDEN_NAMES.contains(&name.as_str()) {
            continue;
        }
        let rel = match dir {
            Some(dir) => dir.join(&name),
            None => match RelPath::try_from(name.as_str()) {
                Ok(rel) => rel,
                Err(_) => continue,
            },
        };
        let kind = entry.file_type();
        if kind.is_dir() {
            dirs.push((name, rel));
        } else if kind.is_file() {
            files.push((name, rel));
        }
        // Symlinks stay invisible: guard never traverses them.
    }

    for (name, rel) in dirs {
        let id = format!("d:{}", rel);
        let is_open = expanded.contains(&id);
        rows.push(Row {
            id: id.clone(),
            depth,
            label: format!("{}/", name),
            indicator: registry.folder_state(&rel).indicator(),
            kind: RowKind::Dir(rel.clone()),
            expandable: true,
            expanded: is_open,
        });
        if is_open {
            push_dir_level(registry, Some(&rel), depth + 1, expanded, rows);
        }
    }
    for (name, rel) in files {
        rows.push(Row {
            id: format!("f:{}", rel),
            depth,
            label: name,
            indicator: registry.file_state(&rel).indicator(),
            kind: RowKind::File(rel),
            expandable: false,
            expanded: false,
        });
    }
}

/// Collections panel: named collections nested by strict membership
/// subset, then folder-collections, each expandable into its members.
pub fn collection_rows(registry: &Registry, expanded: &HashSet<String>) -> Vec<Row> {
    let mut rows = Vec::new();
    let collections = registry.collections();
    let parents: Vec<Option<usize>> = (0..collections.len())
        .map(|idx| parent_of(registry, idx))
        .collect();
    for idx in 0..collections.len() {
        if parents[idx].is_none() {
            push_collection(registry, idx, &parents, 0, expanded, &mut rows);
        }
    }
    for folder in registry.folders() {
        let id = format!("c:{}", folder.name);
        let is_open = expanded.contains(&id);
        let members = registry.disk_children(&folder.path);
        rows.push(Row {
            id,
            depth: 0,
            label: format!("{} ({} files)", folder.name, members.len()),
            indicator: registry.folder_state(&folder.path).indicator(),
            kind: RowKind::Folder(folder.path.clone()),
            expandable: !members.is_empty(),
            expanded: is_open,
        });
        if is_open {
            push_members(registry, &members, 1, &mut rows);
        }
    }
    rows
}

/// A collection nests under the smallest collection whose members form a
/// strict superset of its own; equal or overlapping sets stay siblings.
fn parent_of(registry: &Registry, idx: usize) -> Option<usize> {
    let collections = registry.collections();
    let child = &collections[idx];
    if child.members.is_empty() {
        return None;
    }
    let mut best: Option<usize> = None;
    for (candidate_idx, candidate) in collections.iter().enumerate() {
        if candidate_idx == idx || candidate.members.len() <= child.members.len() {
            continue;
        }
        if child
            .members
            .iter()
            .all(|member| candidate.members.contains(member))
        {
            let better = match best {
                Some(best_idx) => candidate.members.len() < collections[best_idx].members.len(),
                None => true,
            };
            if better {
                best = Some(candidate_idx);
            }
        }
    }
    best
}

fn push_collection(
    registry: &Registry,
    idx: usize,
    parents: &[Option<usize>],
    depth: usize,
    expanded: &HashSet<String>,
    rows: &mut Vec<Row>,
) {
    let collection = &registry.collections()[idx];
    let id = format!("c:{}", collection.name);
    let is_open = expanded.contains(&id);
    rows.push(Row {
        id,
        depth,
        label: format!("{} ({} files)", collection.name, collection.members.len()),
        indicator: registry.collection_state(&collection.name).indicator(),
        kind: RowKind::Collection(collection.name.clone()),
        expandable: !collection.members.is_empty(),
        expanded: is_open,
    });
    if is_open {
        push_members(registry, &collection.members, depth + 1, rows);
    }
    for (child_idx, parent) in parents.iter().enumerate() {
        if *parent == Some(idx) {
            push_collection(registry, child_idx, parents, depth + 1, expanded, rows);
        }
    }
}

fn push_members(registry: &Registry, members: &[RelPath], depth: usize, rows: &mut Vec<Row>) {
    for member in members {
        rows.push(Row {
            id: format!("m:{}", member),
            depth,
            label: member.to_string(),
            indicator: registry.file_state(member).indicator(),
            kind: RowKind::Member(member.clone()),
            expandable: false,
            expanded: false,
        });
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

    fn workspace() -> (TempDir, Registry) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/main.c"), "c").unwrap();
        std::fs::write(temp.path().join("README"), "r").unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        std::fs::write(temp.path().join(STATE_FILE_NAME), "").unwrap();
        let registry = Registry::new(temp.path().to_path_buf(), GuardConfig::default());
        (temp, registry)
    }

    #[test]
    fn files_tree_collapses_dirs_and_hides_chrome() {
        let (_temp, registry) = workspace();
        let rows = files_rows(&registry, &HashSet::new());
        let labels: Vec<&str> = rows.iter().map(|row| row.label.as_str()).collect();
        assert_eq!(vec!["src/", "README"], labels);
        // Untracked everywhere: indicator is the untracked dot.
        assert!(rows.iter().all(|row| row.indicator == '·'));
    }

    #[test]
    fn files_tree_expands_on_demand() {
        let (_temp, registry) = workspace();
        let mut expanded = HashSet::new();
        expanded.insert("d:src".to_owned());
        let rows = files_rows(&registry, &expanded);
        let labels: Vec<&str> = rows.iter().map(|row| row.label.as_str()).collect();
        assert_eq!(vec!["src/", "main.c", "README"], labels);
        assert_eq!(1, rows[1].depth);
    }

    #[test]
    fn subset_collections_nest_under_their_superset() {
        let (_temp, mut registry) = workspace();
        registry.register_file(rel("README"), 0o644, String::new(), String::new());
        registry.register_file(rel("src/main.c"), 0o644, String::new(), String::new());
        let mut all = Collection::new("all".to_owned());
        all.members.push(rel("README"));
        all.members.push(rel("src/main.c"));
        let mut sub = Collection::new("sub".to_owned());
        sub.members.push(rel("README"));
        registry.add_collection(all);
        registry.add_collection(sub);

        let rows = collection_rows(&registry, &HashSet::new());
        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(vec!["c:all", "c:sub"], ids);
        assert_eq!(0, rows[0].depth);
        assert_eq!(1, rows[1].depth, "subset renders as a child");
    }

    #[test]
    fn overlapping_collections_stay_siblings() {
        let (_temp, mut registry) = workspace();
        registry.register_file(rel("README"), 0o644, String::new(), String::new());
        registry.register_file(rel("src/main.c"), 0o644, String::new(), String::new());
        let mut left = Collection::new("left".to_owned());
        left.members.push(rel("README"));
        left.members.push(rel("src/main.c"));
        let mut right = Collection::new("right".to_owned());
        right.members.push(rel("src/main.c"));
        right.members.push(rel("README"));
        registry.add_collection(left);
        registry.add_collection(right);

        let rows = collection_rows(&registry, &HashSet::new());
        assert!(rows.iter().all(|row| row.depth == 0));
    }

    #[test]
    fn expanded_collection_lists_members() {
        let (_temp, mut registry) = workspace();
        registry.register_file(rel("README"), 0o644, String::new(), String::new());
        registry.file_mut(&rel("README")).unwrap().guard = true;
        let mut docs = Collection::new("docs".to_owned());
        docs.members.push(rel("README"));
        registry.add_collection(docs);

        let mut expanded = HashSet::new();
        expanded.insert("c:docs".to_owned());
        let rows = collection_rows(&registry, &expanded);
        assert_eq!(2, rows.len());
        assert_eq!("m:README", rows[1].id);
        assert_eq!('G', rows[1].indicator);
        // The collection itself is implicitly guarded through its member.
        assert_eq!('g', rows[0].indicator);
    }
}
