use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::ui::colors::PURE_WHITE;

use super::common::{
    aligned_summary_area, controls_lines, draw_art, draw_controls, draw_install_summary,
    draw_page_title, split_main_and_summary, titled_block,
};
use super::{ConfirmAction, InstallSummary, LCS_ART};

// Waiting for the user to pick one of two answers
pub fn run_confirm_selector(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    title: &str,
    text_lines: &[Line<'_>],
    options: [&str; 2],
    summary: &InstallSummary,
) -> Result<ConfirmAction> {
    let mut cursor = 0usize;
    let mut scroll: u16 = 0;

    // Main loop for the confirmation screen
    loop {
        terminal.draw(|f| {
            draw_confirm_selector(
                f.size(),
                f,
                title,
                text_lines,
                scroll,
                cursor,
                &options,
                summary,
            )
        })?;

        // User input
        let timeout = Duration::from_millis(100);
        if event::poll(timeout).context("poll events")? {
            if let Event::Key(key) = event::read().context("read event")? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Up => {
                        if cursor > 0 {
                            cursor -= 1;
                        }
                    }
                    KeyCode::Down => {
                        if cursor + 1 < options.len() {
                            cursor += 1;
                        }
                    }
                    KeyCode::PageUp => scroll = scroll.saturating_sub(5),
                    KeyCode::PageDown => scroll = scroll.saturating_add(5),
                    KeyCode::Enter => {
                        return Ok(if cursor == 0 {
                            ConfirmAction::Yes
                        } else {
                            ConfirmAction::No
                        })
                    }
                    KeyCode::Char('1') => return Ok(ConfirmAction::Yes),
                    KeyCode::Char('2') => return Ok(ConfirmAction::No),
                    KeyCode::Esc => return Ok(ConfirmAction::Back),
                    KeyCode::Char('q') | KeyCode::Char('Q')
                        if key.modifiers.contains(KeyModifiers::CONTROL) =>
                    {
                        return Ok(ConfirmAction::Quit)
                    }
                    _ => {}
                }
            }
        }
    }
}

// Confirmation screen UI
fn draw_confirm_selector(
    area: Rect,
    f: &mut Frame<'_>,
    title: &str,
    text_lines: &[Line<'_>],
    scroll: u16,
    cursor: usize,
    options: &[&str],
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
            Constraint::Length(options.len() as u16 + 3),
        ])
        .split(main_area);

    draw_art(layout[0], f);
    draw_page_title(layout[1], f, title);
    draw_controls(
        layout[3],
        f,
        controls_lines(&[
            &[
                ("Up/Down", "to move"),
                ("Enter", "to select"),
                ("1/2", "quick select"),
            ],
            &[("PgUp/PgDn", "to scroll the text")],
        ]),
    );

    let text = Paragraph::new(text_lines.to_vec())
        .block(titled_block(" Info ").padding(Padding::new(1, 1, 1, 0)))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(text, layout[4]);

    let items: Vec<ListItem> = options
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            let line = Line::from(vec![
                Span::raw(format!("{:>2}) ", idx + 1)),
                Span::raw(*label),
            ]);
            ListItem::new(line)
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Black))
                .padding(Padding::new(1, 0, 0, 0))
                .title(Line::from(vec![
                    Span::styled("[", Style::default().fg(Color::Black)),
                    Span::styled(
                        " Confirm ",
                        Style::default().fg(PURE_WHITE).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled("]", Style::default().fg(Color::Black)),
                ])),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    let mut state = ListState::default();
    state.select(Some(cursor.min(options.len() - 1)));
    f.render_stateful_widget(list, layout[5], &mut state);

    let summary_area = aligned_summary_area(summary_area, main_area, layout[3]);
    draw_install_summary(summary_area, f, summary);
}
