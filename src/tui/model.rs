/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::HashSet;
use std::path::PathBuf;

use crate::registry::Registry;

use super::tree::{self, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Files,
    Collections,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    None,
    Error(String),
}

/// One panel: its visible rows, the selection, and which container rows are
/// expanded. Rows are a pure projection of the registry snapshot and get
/// rebuilt on every structural change; selection and expansion survive by
/// row id.
pub struct PanelState {
    pub rows: Vec<Row>,
    pub selected: usize,
    pub expanded: HashSet<String>,
}

impl PanelState {
    fn new(rows: Vec<Row>) -> Self {
        PanelState {
            rows,
            selected: 0,
            expanded: HashSet::new(),
        }
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.rows.get(self.selected)
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.rows.len() {
            self.selected += 1;
        }
    }

    /// Swap in freshly built rows, keeping the cursor on the same entity
    /// when it still exists, clamped into range otherwise.
    pub fn replace_rows(&mut self, rows: Vec<Row>) {
        let anchor = self.selected_row().map(|row| row.id.clone());
        self.rows = rows;
        self.selected = anchor
            .and_then(|id| self.rows.iter().position(|row| row.id == id))
            .unwrap_or_else(|| self.selected.min(self.rows.len().saturating_sub(1)));
    }
}

/// The whole TUI state. The registry snapshot is the single source of
/// truth; both trees are projections of it.
pub struct Model {
    pub workspace: PathBuf,
    pub registry: Registry,
    pub files: PanelState,
    pub collections: PanelState,
    pub focus: Focus,
    pub modal: Modal,
    pub last_size: (u16, u16),
}

impl Model {
    pub fn new(workspace: PathBuf, registry: Registry) -> Self {
        let files = PanelState::new(tree::files_rows(&registry, &HashSet::new()));
        let collections = PanelState::new(tree::collection_rows(&registry, &HashSet::new()));
        Model {
            workspace,
            registry,
            files,
            collections,
            focus: Focus::Files,
            modal: Modal::None,
            last_size: (0, 0),
        }
    }

    pub fn focused_panel(&self) -> &PanelState {
        match self.focus {
            Focus::Files => &self.files,
            Focus::Collections => &self.collections,
        }
    }

    pub fn focused_panel_mut(&mut self) -> &mut PanelState {
        match self.focus {
            Focus::Files => &mut self.files,
            Focus::Collections => &mut self.collections,
        }
    }

    /// Replace the snapshot and rebuild both trees, preserving expansion
    /// and selection where the rows still exist.
    pub fn refresh(&mut self, registry: Registry) {
        self.registry = registry;
        self.rebuild();
    }

    pub fn rebuild(&mut self) {
        let files = tree::files_rows(&self.registry, &self.files.expanded);
        self.files.replace_rows(files);
        let collections = tree::collection_rows(&self.registry, &self.collections.expanded);
        self.collections.replace_rows(collections);
    }

    pub fn guarded_count(&self) -> usize {
        self.registry
            .files()
            .iter()
            .filter(|entry| entry.guard)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::registry::config::GuardConfig;
    use tempfile::TempDir;

    fn model() -> (TempDir, Model) {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "a").unwrap();
        std::fs::write(temp.path().join("b.txt"), "b").unwrap();
        let registry = Registry::new(temp.path().to_path_buf(), GuardConfig::default());
        let model = Model::new(temp.path().to_path_buf(), registry);
        (temp, model)
    }

    #[test]
    fn selection_is_bounded() {
        let (_temp, mut model) = model();
        assert_eq!(2, model.files.rows.len());
        model.files.move_up();
        assert_eq!(0, model.files.selected);
        model.files.move_down();
        model.files.move_down();
        model.files.move_down();
        assert_eq!(1, model.files.selected);
    }

    #[test]
    fn refresh_preserves_selection_by_id() {
        let (temp, mut model) = model();
        model.files.move_down();
        let anchor = model.files.selected_row().unwrap().id.clone();

        // A new file appears before the selected one.
        std::fs::write(temp.path().join("0.txt"), "0").unwrap();
        let registry = Registry::new(temp.path().to_path_buf(), GuardConfig::default());
        model.refresh(registry);

        assert_eq!(anchor, model.files.selected_row().unwrap().id);
        assert_eq!(3, model.files.rows.len());
    }

    #[test]
    fn refresh_clamps_selection_when_row_vanishes() {
        let (temp, mut model) = model();
        model.files.move_down();
        std::fs::remove_file(temp.path().join("b.txt")).unwrap();
        let registry = Registry::new(temp.path().to_path_buf(), GuardConfig::default());
        model.refresh(registry);
        assert_eq!(0, model.files.selected);
    }
}
