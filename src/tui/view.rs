/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use super::model::{Focus, Modal, Model, PanelState};

pub const MIN_WIDTH: u16 = 40;
pub const MIN_HEIGHT: u16 = 15;

const KEY_LEGEND: &str = "Tab panel · ↑↓ move · ←→ fold · Space toggle · r refresh · q quit";

/// Draw the whole application. Below the minimum size nothing but the
/// notice is rendered; a partially drawn app never appears.
pub fn render(frame: &mut Frame<'_>, model: &Model) {
    let area = frame.area();
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let notice = Paragraph::new(format!(
            "Terminal too small\nneed at least {}x{}",
            MIN_WIDTH, MIN_HEIGHT
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        frame.render_widget(notice, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_title(frame, chunks[0], model);
    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    render_panel(
        frame,
        panels[0],
        &model.files,
        "Files",
        model.focus == Focus::Files,
    );
    render_panel(
        frame,
        panels[1],
        &model.collections,
        "Collections",
        model.focus == Focus::Collections,
    );
    render_status(frame, chunks[2]);

    if let Modal::Error(message) = &model.modal {
        render_error_modal(frame, area, message);
    }
}

fn render_title(frame: &mut Frame<'_>, area: Rect, model: &Model) {
    let title = Line::from(vec![
        Span::styled("guard", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(
            " — {} — {} file(s) guarded",
            model.workspace.display(),
            model.guarded_count()
        )),
    ]);
    frame.render_widget(Paragraph::new(title), area);
}

fn render_panel(
    frame: &mut Frame<'_>,
    area: Rect,
    panel: &PanelState,
    title: &str,
    focused: bool,
) {
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);

    let items: Vec<ListItem> = panel
        .rows
        .iter()
        .map(|row| {
            let fold = if row.expandable {
                if row.expanded {
                    "▾ "
                } else {
                    "▸ "
                }
            } else {
                "  "
            };
            let line = format!(
                "{:indent$}{}{} {}",
                "",
                fold,
                row.indicator,
                row.label,
                indent = row.depth * 2
            );
            ListItem::new(line)
        })
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    if !panel.rows.is_empty() && focused {
        state.select(Some(panel.selected));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_status(frame: &mut Frame<'_>, area: Rect) {
    let status = Paragraph::new(KEY_LEGEND).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, area);
}

fn render_error_modal(frame: &mut Frame<'_>, area: Rect, message: &str) {
    let modal = centered(area, 60, 20);
    frame.render_widget(Clear, modal);
    let text = format!("{}\n\nPress Enter to continue", message);
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title("Error")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    frame.render_widget(paragraph, modal);
}

/// A centered sub-rectangle taking the given percentages of the area.
fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_stays_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let modal = centered(area, 60, 20);
        assert!(modal.width <= 60);
        assert!(modal.x >= 20);
        assert!(modal.y >= area.y);
        assert!(modal.bottom() <= area.bottom());
    }
}
