/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};

use crate::resolver::Target;

use super::model::{Focus, Modal, Model};

/// Side effect requested by one update step; the event loop executes it.
#[derive(Debug, PartialEq, Eq)]
pub enum UiCommand {
    None,
    Quit,
    Refresh,
    Toggle(Target),
}

/// The keyboard/resize state machine. Pure with respect to the outside
/// world: it only rewrites the model and names the effect to run.
pub fn handle(model: &mut Model, event: Event) -> UiCommand {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key(model, key),
        Event::Resize(width, height) => {
            model.last_size = (width, height);
            UiCommand::None
        }
        _ => UiCommand::None,
    }
}

fn handle_key(model: &mut Model, key: KeyEvent) -> UiCommand {
    // The error modal swallows everything except Enter.
    if let Modal::Error(_) = model.modal {
        if key.code == KeyCode::Enter {
            model.modal = Modal::None;
        }
        return UiCommand::None;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => UiCommand::Quit,
        KeyCode::Tab => {
            model.focus = match model.focus {
                Focus::Files => Focus::Collections,
                Focus::Collections => Focus::Files,
            };
            UiCommand::None
        }
        KeyCode::Up => {
            model.focused_panel_mut().move_up();
            UiCommand::None
        }
        KeyCode::Down => {
            model.focused_panel_mut().move_down();
            UiCommand::None
        }
        KeyCode::Right => {
            expand_selected(model, true);
            UiCommand::None
        }
        KeyCode::Left => {
            expand_selected(model, false);
            UiCommand::None
        }
        KeyCode::Char(' ') => match model.focused_panel().selected_row() {
            Some(row) => UiCommand::Toggle(row.toggle_target()),
            None => UiCommand::None,
        },
        KeyCode::Char('r') => UiCommand::Refresh,
        _ => UiCommand::None,
    }
}

/// `→` expands a container row, `←` collapses it; both are no-ops on plain
/// files.
fn expand_selected(model: &mut Model, open: bool) {
    let panel = model.focused_panel();
    let row = match panel.selected_row() {
        Some(row) if row.expandable => row,
        _ => return,
    };
    let id = row.id.clone();
    let panel = model.focused_panel_mut();
    let changed = if open {
        panel.expanded.insert(id)
    } else {
        panel.expanded.remove(&id)
    };
    if changed {
        model.rebuild();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::registry::config::GuardConfig;
    use crate::registry::pathname::RelPath;
    use crate::registry::Registry;
    use crossterm::event::KeyModifiers;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn model() -> (TempDir, Model) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/lib.c"), "c").unwrap();
        std::fs::write(temp.path().join("a.txt"), "a").unwrap();
        let registry = Registry::new(temp.path().to_path_buf(), GuardConfig::default());
        let model = Model::new(temp.path().to_path_buf(), registry);
        (temp, model)
    }

    #[test]
    fn tab_swaps_focus() {
        let (_temp, mut model) = model();
        assert_eq!(Focus::Files, model.focus);
        assert_eq!(UiCommand::None, handle(&mut model, key(KeyCode::Tab)));
        assert_eq!(Focus::Collections, model.focus);
        handle(&mut model, key(KeyCode::Tab));
        assert_eq!(Focus::Files, model.focus);
    }

    #[test]
    fn arrows_fold_directories() {
        let (_temp, mut model) = model();
        // First row is the "src/" directory.
        assert_eq!(2, model.files.rows.len());
        handle(&mut model, key(KeyCode::Right));
        assert_eq!(3, model.files.rows.len());
        assert!(model.files.rows[0].expanded);
        handle(&mut model, key(KeyCode::Left));
        assert_eq!(2, model.files.rows.len());
    }

    #[test]
    fn right_on_a_file_is_a_noop() {
        let (_temp, mut model) = model();
        handle(&mut model, key(KeyCode::Down));
        let before = model.files.rows.clone();
        handle(&mut model, key(KeyCode::Right));
        assert_eq!(before, model.files.rows);
    }

    #[test]
    fn space_requests_a_toggle_of_the_selection() {
        let (_temp, mut model) = model();
        handle(&mut model, key(KeyCode::Down));
        let command = handle(&mut model, key(KeyCode::Char(' ')));
        assert_eq!(
            UiCommand::Toggle(Target::File(RelPath::try_from("a.txt").unwrap())),
            command
        );

        handle(&mut model, key(KeyCode::Up));
        let command = handle(&mut model, key(KeyCode::Char(' ')));
        assert_eq!(
            UiCommand::Toggle(Target::Folder(RelPath::try_from("src").unwrap())),
            command
        );
    }

    #[test]
    fn quit_keys() {
        let (_temp, mut model) = model();
        assert_eq!(UiCommand::Quit, handle(&mut model, key(KeyCode::Char('q'))));
        assert_eq!(UiCommand::Quit, handle(&mut model, key(KeyCode::Esc)));
    }

    #[test]
    fn error_modal_swallows_keys_until_enter() {
        let (_temp, mut model) = model();
        model.modal = Modal::Error("boom".to_owned());
        assert_eq!(UiCommand::None, handle(&mut model, key(KeyCode::Char('q'))));
        assert_eq!(UiCommand::None, handle(&mut model, key(KeyCode::Char(' '))));
        assert!(matches!(model.modal, Modal::Error(_)));
        assert_eq!(UiCommand::None, handle(&mut model, key(KeyCode::Enter)));
        assert_eq!(Modal::None, model.modal);
    }

    #[test]
    fn resize_is_recorded() {
        let (_temp, mut model) = model();
        handle(&mut model, Event::Resize(100, 42));
        assert_eq!((100, 42), model.last_size);
    }
}
