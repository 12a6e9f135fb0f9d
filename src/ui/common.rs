use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Padding, Paragraph, Wrap};
use ratatui::Frame;

use crate::context::PageMessage;
use crate::ui::colors::PURE_WHITE;

use super::keybinds::{draw_keybinds, keybinds_height};
use super::{InstallSummary, LCS_ART};

#[derive(Clone, Copy, Debug)]
enum SummaryStatus {
    Pending,
    Current,
    Done,
}

fn summary_status_style(status: SummaryStatus) -> Style {
    match status {
        SummaryStatus::Pending => Style::default().fg(Color::White),
        SummaryStatus::Current => Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
        SummaryStatus::Done => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    }
}

// Builds the lines of text to be displayed in the summary panel
fn summary_lines(summary: &InstallSummary) -> Vec<Line<'_>> {
    let mut lines = Vec::with_capacity(summary.entries.len());

    for (idx, (label, value)) in summary.entries.iter().enumerate() {
        let status = if idx < summary.current_index {
            SummaryStatus::Done
        } else if idx == summary.current_index {
            SummaryStatus::Current
        } else {
            SummaryStatus::Pending
        };

        let mut spans = Vec::new();
        match status {
            // Completed sections show "[OK]" and their value
            SummaryStatus::Done => {
                spans.push(Span::styled(
                    "[OK]",
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ));
                spans.push(Span::raw(" "));
                spans.push(Span::styled(
                    format!("{label}:"),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ));
                if let Some(value) = value {
                    spans.push(Span::styled(
                        format!(" {value}"),
                        Style::default().fg(Color::Blue),
                    ));
                }
            }
            SummaryStatus::Current | SummaryStatus::Pending => {
                let style = summary_status_style(status);
                spans.push(Span::styled("[..]", style));
                spans.push(Span::styled(" ", style));
                spans.push(Span::styled(format!("{label}:"), style));
            }
        }
        lines.push(Line::from(spans));
    }
    lines
}

// Split an area into a main content area and a summary sidebar
pub(crate) fn split_main_and_summary(area: Rect) -> (Rect, Rect) {
    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(74), Constraint::Percentage(26)])
        .split(area);
    (layout[0], layout[1])
}

// Vertically align the summary panel with a widget in the main area
pub(crate) fn aligned_summary_area(summary_area: Rect, main_area: Rect, anchor: Rect) -> Rect {
    let offset = anchor.y.saturating_sub(main_area.y);
    Rect {
        x: summary_area.x,
        y: summary_area.y.saturating_add(offset),
        width: summary_area.width,
        height: summary_area.height.saturating_sub(offset),
    }
}

// Renders the summary widget in a given area
pub(crate) fn draw_install_summary(area: Rect, f: &mut Frame<'_>, summary: &InstallSummary) {
    let lines = summary_lines(summary);
    let summary_height = (lines.len() as u16).saturating_add(3); // 2 for borders + 1 for top padding
    let summary_layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(summary_height),
            Constraint::Length(keybinds_height()),
            Constraint::Min(0),
        ])
        .split(area);
    let block = Paragraph::new(lines)
        .block(titled_block(" Summary ").padding(Padding::new(1, 0, 1, 0)))
        .wrap(Wrap { trim: false });
    f.render_widget(block, summary_layout[0]);
    draw_keybinds(summary_layout[1], f);
}

// Bordered block with a "[ Title ]" header
pub(crate) fn titled_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Black))
        .title(Line::from(vec![
            Span::styled("[", Style::default().fg(Color::Black)),
            Span::styled(
                title,
                Style::default().fg(PURE_WHITE).add_modifier(Modifier::BOLD),
            ),
            Span::styled("]", Style::default().fg(Color::Black)),
        ]))
}

pub(crate) fn draw_art(area: Rect, f: &mut Frame<'_>) {
    let art_lines: Vec<Line> = LCS_ART
        .iter()
        .map(|line| {
            Line::from(Span::styled(
                *line,
                Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::BOLD),
            ))
        })
        .collect();
    f.render_widget(Paragraph::new(art_lines).block(Block::default()), area);
}

// "/- Title -/" page header
pub(crate) fn draw_page_title(area: Rect, f: &mut Frame<'_>, title: &str) {
    let title = Line::from(vec![
        Span::raw("/- "),
        Span::styled(
            title.to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" -/"),
    ]);
    f.render_widget(Paragraph::new(title).block(Block::default()), area);
}

// Each row is a list of (key, description) pairs
pub(crate) fn controls_lines(rows: &[&[(&str, &str)]]) -> Vec<Line<'static>> {
    rows.iter()
        .map(|row| {
            let mut spans = Vec::new();
            for (idx, (key, text)) in row.iter().enumerate() {
                if idx > 0 {
                    spans.push(Span::raw(", "));
                }
                spans.push(Span::styled(
                    key.to_string(),
                    Style::default().fg(Color::Cyan),
                ));
                spans.push(Span::raw(format!(" {text}")));
            }
            Line::from(spans)
        })
        .collect()
}

pub(crate) fn draw_controls(area: Rect, f: &mut Frame<'_>, lines: Vec<Line<'_>>) {
    let help = Paragraph::new(lines)
        .block(titled_block(" Controls ").padding(Padding::new(1, 0, 1, 0)))
        .wrap(Wrap { trim: false });
    f.render_widget(help, area);
}

// One line status at the bottom of a page
pub(crate) fn message_line(message: Option<&PageMessage>, fallback: &str) -> Line<'static> {
    match message {
        Some(PageMessage::Error(text)) => Line::from(Span::styled(
            text.clone(),
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Some(PageMessage::Notice(text)) => Line::from(Span::styled(
            text.clone(),
            Style::default().fg(Color::LightGreen),
        )),
        None => Line::from(Span::styled(
            fallback.to_string(),
            Style::default().fg(Color::White),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_marks_sections_before_current_as_done() {
        let summary = InstallSummary {
            current_index: 1,
            entries: vec![
                ("Paths", Some("/LoudnessCorrection".to_string())),
                ("Email", None),
                ("Samba", None),
            ],
        };
        let lines = summary_lines(&summary);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].spans[0].content, "[OK]");
        assert_eq!(lines[0].spans[3].content, " /LoudnessCorrection");
        assert_eq!(lines[1].spans[0].content, "[..]");
        assert_eq!(lines[1].spans[0].style.fg, Some(Color::Yellow));
        assert_eq!(lines[2].spans[0].style.fg, Some(Color::White));
    }
}
