/////////
/// Progress screen for runs on the worker thread
////////
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};
use ratatui::Frame;

use crate::model::{App, Step, StepStatus};
use crate::ui::colors::PURE_WHITE;

use super::common::{draw_art, draw_page_title};
use super::{LCS_ART, SPINNER};

// Run progress UI
pub fn draw_ui(area: Rect, f: &mut Frame<'_>, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(LCS_ART.len() as u16),        // ASCII art
            Constraint::Length(1),                           // Title
            Constraint::Length(1),                           // Spacer
            Constraint::Length(4),                           // Progress bar
            Constraint::Length(app.steps.len() as u16 + 2), // Steps
            Constraint::Min(6),                              // Logs
            Constraint::Length(1),                           // Final status
        ])
        .split(area);

    draw_art(layout[0], f);
    draw_page_title(layout[1], f, &app.title);

    // Overall progress bar
    let progress = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Black))
                .title(Span::styled(
                    "Progress",
                    Style::default().fg(PURE_WHITE).add_modifier(Modifier::BOLD),
                )),
        )
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(app.progress);
    f.render_widget(progress, layout[3]);

    // List of installation steps
    let step_lines: Vec<Line> = app
        .steps
        .iter()
        .map(|step| render_step(step, app.spinner_idx))
        .collect();
    let steps = Paragraph::new(step_lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Black))
                .title(Span::styled(
                    "Steps",
                    Style::default().fg(PURE_WHITE).add_modifier(Modifier::BOLD),
                )),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(steps, layout[4]);

    // Log output panel
    let log_lines: Vec<Line> = app
        .logs
        .iter()
        .map(|line| Line::from(Span::raw(line.clone())))
        .collect();
    let log_height = layout[5].height.saturating_sub(2) as usize;
    let scroll_offset = log_lines.len().saturating_sub(log_height);
    let scroll_offset = scroll_offset.min(u16::MAX as usize) as u16;
    let logs = Paragraph::new(log_lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Black))
                .title(Span::styled(
                    "Logs",
                    Style::default().fg(PURE_WHITE).add_modifier(Modifier::BOLD),
                )),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll_offset, 0));
    f.render_widget(logs, layout[5]);

    // Final status message once the run is over
    let status_line = if app.done {
        if app.password_rejected {
            Line::from(vec![
                Span::styled(
                    "The password was not accepted.",
                    Style::default().fg(Color::LightRed),
                ),
                Span::raw(" "),
                Span::styled(
                    "Press Enter to enter it again.",
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ),
            ])
        } else if app.err.is_some() {
            Line::from(vec![
                Span::styled(
                    format!("{} failed.", app.title),
                    Style::default().fg(Color::LightRed),
                ),
                Span::raw(" "),
                Span::styled(
                    "Press Enter to go back.",
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ),
            ])
        } else {
            Line::from(vec![
                Span::styled(
                    format!("{} finished.", app.title),
                    Style::default().fg(Color::LightGreen),
                ),
                Span::raw(" "),
                Span::styled(
                    "Press Enter to continue.",
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ),
            ])
        }
    } else {
        Line::from("")
    };
    let status_line = Paragraph::new(status_line);
    f.render_widget(status_line, layout[6]);
}

fn render_step(step: &Step, spinner_idx: usize) -> Line<'static> {
    let icon = match step.status {
        StepStatus::Pending => "[ ]",
        StepStatus::Running => "[..]",
        StepStatus::Done => "[OK]",
        StepStatus::Skipped => "[SKIP]",
        StepStatus::Failed => "[x]",
    };

    // Style the line based on the status
    let mut spans = vec![Span::styled(
        format!("{} {}", icon, step.name),
        style_for_status(step.status),
    )];

    // Add a spinner if the step is currently running
    if step.status == StepStatus::Running {
        spans.push(Span::raw(format!(" {}", SPINNER[spinner_idx])));
    }

    // Add an error message if the step failed
    if let Some(err) = &step.err {
        spans.push(Span::styled(
            format!(" ({})", err),
            Style::default().fg(Color::Red),
        ));
    }

    Line::from(spans)
}

// Returns a style (color) for a given step status
fn style_for_status(status: StepStatus) -> Style {
    match status {
        StepStatus::Pending => Style::default().fg(Color::White),
        StepStatus::Running => Style::default().fg(Color::Yellow),
        StepStatus::Done => Style::default().fg(Color::Green),
        StepStatus::Skipped => Style::default().fg(Color::Yellow),
        StepStatus::Failed => Style::default().fg(Color::Red),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_step_shows_spinner() {
        let step = Step {
            name: "Building sox".to_string(),
            status: StepStatus::Running,
            err: None,
        };
        let line = render_step(&step, 2);
        assert_eq!(line.spans[0].content, "[..] Building sox");
        assert_eq!(line.spans[1].content, " -");
    }

    #[test]
    fn failed_step_shows_error() {
        let step = Step {
            name: "Installing packages".to_string(),
            status: StepStatus::Failed,
            err: Some("apt-get failed".to_string()),
        };
        let line = render_step(&step, 0);
        assert_eq!(line.spans[1].content, " (apt-get failed)");
        assert_eq!(line.spans[0].style.fg, Some(Color::Red));
    }
}
