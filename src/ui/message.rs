use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::Line;
use ratatui::widgets::{Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::context::PageMessage;

use super::common::{
    aligned_summary_area, controls_lines, draw_art, draw_controls, draw_install_summary,
    draw_page_title, message_line, split_main_and_summary, titled_block,
};
use super::{InstallSummary, MessageAction, LCS_ART};

// Text page; Enter continues when `can_continue`, Esc goes back when `can_go_back`
pub fn run_message(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    title: &str,
    body: &[Line<'_>],
    can_continue: bool,
    can_go_back: bool,
    message: Option<&PageMessage>,
    summary: &InstallSummary,
) -> Result<MessageAction> {
    let mut scroll: u16 = 0;
    loop {
        terminal.draw(|f| {
            draw_message(
                f.size(),
                f,
                title,
                body,
                can_continue,
                can_go_back,
                scroll,
                message,
                summary,
            )
        })?;

        let timeout = Duration::from_millis(100);
        if event::poll(timeout).context("poll events")? {
            if let Event::Key(key) = event::read().context("read event")? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Enter if can_continue => return Ok(MessageAction::Next),
                    KeyCode::Esc if can_go_back => return Ok(MessageAction::Back),
                    KeyCode::Char('q') | KeyCode::Char('Q')
                        if key.modifiers.contains(KeyModifiers::CONTROL) =>
                    {
                        return Ok(MessageAction::Quit)
                    }
                    KeyCode::Up => scroll = scroll.saturating_sub(1),
                    KeyCode::Down => scroll = scroll.saturating_add(1),
                    KeyCode::PageUp => scroll = scroll.saturating_sub(10),
                    KeyCode::PageDown => scroll = scroll.saturating_add(10),
                    _ => {}
                }
            }
        }
    }
}

fn draw_message(
    area: Rect,
    f: &mut Frame<'_>,
    title: &str,
    body: &[Line<'_>],
    can_continue: bool,
    can_go_back: bool,
    scroll: u16,
    message: Option<&PageMessage>,
    summary: &InstallSummary,
) {
    let (main_area, summary_area) = split_main_and_summary(area);
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(LCS_ART.len() as u16),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(5),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(main_area);

    draw_art(layout[0], f);
    draw_page_title(layout[1], f, title);

    let mut row: Vec<(&str, &str)> = vec![("Up/Down", "to scroll")];
    if can_continue {
        row.push(("Enter", "to continue"));
    }
    if can_go_back {
        row.push(("Esc", "to go back"));
    }
    let mut controls = controls_lines(&[row.as_slice()]);
    if !can_continue {
        controls.extend(controls_lines(&[&[("Ctrl+Q", "to quit")]]));
    }
    draw_controls(layout[3], f, controls);

    let text = Paragraph::new(body.to_vec())
        .block(titled_block(" Info ").padding(Padding::new(1, 1, 1, 0)))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(text, layout[4]);

    let fallback = if can_continue {
        "Press Enter to continue."
    } else {
        "Press Ctrl+Q to exit."
    };
    f.render_widget(Paragraph::new(message_line(message, fallback)), layout[5]);

    let summary_area = aligned_summary_area(summary_area, main_area, layout[3]);
    draw_install_summary(summary_area, f, summary);
}
