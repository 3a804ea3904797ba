/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The interactive two-panel interface. Strictly single-threaded and
//! cooperative: read one event, update the model, redraw. Engine calls run
//! synchronously in the loop and are expected to finish in milliseconds.

pub mod model;
pub mod tree;
pub mod update;
pub mod view;

use std::io::{self, Stdout};
use std::path::PathBuf;

use anyhow::Context;
use crossterm::event;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::engine::Engine;
use crate::platform::Platform;
use crate::registry::Registry;

use model::{Modal, Model};
use update::UiCommand;

type Tui = Terminal<CrosstermBackend<Stdout>>;

pub fn run(workspace: PathBuf, platform: &dyn Platform) -> anyhow::Result<()> {
    // Load before touching the terminal so a broken state file surfaces as
    // a plain error message.
    let registry = Registry::load(&workspace).context("cannot open the workspace registry")?;
    let mut model = Model::new(workspace, registry);

    let mut terminal = setup_terminal().context("cannot set up the terminal")?;
    let result = event_loop(&mut terminal, &mut model, platform);
    restore_terminal(terminal)?;
    result
}

fn setup_terminal() -> anyhow::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    Ok(terminal)
}

fn restore_terminal(mut terminal: Tui) -> anyhow::Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn event_loop(terminal: &mut Tui, model: &mut Model, platform: &dyn Platform) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| view::render(frame, model))?;
        let event = event::read()?;
        match update::handle(model, event) {
            UiCommand::Quit => return Ok(()),
            UiCommand::Refresh => refresh(model),
            UiCommand::Toggle(target) => {
                let mut engine = Engine::new(model.registry.clone(), platform);
                match engine.toggle(std::slice::from_ref(&target)) {
                    Ok(report) if report.failed() => {
                        let message = report
                            .failures
                            .first()
                            .map(|failure| failure.error.to_string())
                            .unwrap_or_else(|| "operation failed".to_owned());
                        model.modal = Modal::Error(message);
                        // Partial progress was persisted; show what is real.
                        refresh(model);
                    }
                    Ok(_) => model.refresh(engine.registry),
                    Err(err) => {
                        model.modal = Modal::Error(err.to_string());
                        refresh(model);
                    }
                }
            }
            UiCommand::None => {}
        }
    }
}

/// Reload the registry from disk and rebuild both trees; expansion and
/// selection survive where the rows still exist.
fn refresh(model: &mut Model) {
    match Registry::load(&model.workspace) {
        Ok(registry) => model.refresh(registry),
        Err(err) => model.modal = Modal::Error(err.to_string()),
    }
}
