/////////
/// Scrollable full-screen text, used for the install command listing
////////
use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use super::common::{controls_lines, draw_art, draw_controls, draw_page_title, titled_block};
use super::{ViewerAction, LCS_ART};

pub fn run_viewer(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    title: &str,
    lines: &[String],
) -> Result<ViewerAction> {
    let mut scroll: usize = 0;
    loop {
        terminal.draw(|f| draw_viewer(f.size(), f, title, lines, scroll))?;

        let timeout = Duration::from_millis(100);
        if event::poll(timeout).context("poll events")? {
            if let Event::Key(key) = event::read().context("read event")? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let last = lines.len().saturating_sub(1);
                match key.code {
                    KeyCode::Esc | KeyCode::Enter => return Ok(ViewerAction::Back),
                    KeyCode::Char('q') | KeyCode::Char('Q')
                        if key.modifiers.contains(KeyModifiers::CONTROL) =>
                    {
                        return Ok(ViewerAction::Quit)
                    }
                    KeyCode::Up => scroll = scroll.saturating_sub(1),
                    KeyCode::Down => scroll = (scroll + 1).min(last),
                    KeyCode::PageUp => scroll = scroll.saturating_sub(10),
                    KeyCode::PageDown => scroll = (scroll + 10).min(last),
                    KeyCode::Home => scroll = 0,
                    KeyCode::End => scroll = last,
                    _ => {}
                }
            }
        }
    }
}

// Comment lines are stage headers
fn styled_line(line: &str) -> Line<'static> {
    if line.starts_with('#') {
        Line::from(Span::styled(line.to_string(), Style::default().fg(Color::Yellow)))
    } else {
        Line::from(Span::raw(line.to_string()))
    }
}

fn draw_viewer(area: Rect, f: &mut Frame<'_>, title: &str, lines: &[String], scroll: usize) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(LCS_ART.len() as u16),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(4),
            Constraint::Min(6),
        ])
        .split(area);

    draw_art(layout[0], f);
    draw_page_title(layout[1], f, title);
    draw_controls(
        layout[3],
        f,
        controls_lines(&[&[
            ("Up/Down/PgUp/PgDn", "to scroll"),
            ("Esc", "to go back"),
        ]]),
    );

    let shown: Vec<Line> = if lines.is_empty() {
        vec![Line::from("Nothing needs to be installed.")]
    } else {
        lines.iter().map(|line| styled_line(line)).collect()
    };
    let scroll = scroll.min(u16::MAX as usize) as u16;
    let text = Paragraph::new(shown)
        .block(titled_block(" Commands "))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(text, layout[4]);
}
