/////////
/// Dependency status page
////////
use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::context::{DependencyState, PageMessage};
use crate::probe::{DependencyStatus, Program};

use super::common::{
    aligned_summary_area, controls_lines, draw_art, draw_controls, draw_install_summary,
    draw_page_title, message_line, split_main_and_summary, titled_block,
};
use super::{DependencyAction, InstallSummary, LCS_ART};

pub fn run_dependencies(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &DependencyState,
    message: Option<&PageMessage>,
    summary: &InstallSummary,
) -> Result<DependencyAction> {
    loop {
        terminal.draw(|f| draw_dependencies(f.size(), f, state, message, summary))?;

        let timeout = Duration::from_millis(100);
        if event::poll(timeout).context("poll events")? {
            if let Event::Key(key) = event::read().context("read event")? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q')
                        if key.modifiers.contains(KeyModifiers::CONTROL) =>
                    {
                        return Ok(DependencyAction::Quit)
                    }
                    KeyCode::Enter if state.next_enabled() => return Ok(DependencyAction::Next),
                    KeyCode::Esc => return Ok(DependencyAction::Back),
                    KeyCode::Char('i') | KeyCode::Char('I') if state.install_enabled() => {
                        return Ok(DependencyAction::Install)
                    }
                    KeyCode::Char('f') | KeyCode::Char('F') => {
                        return Ok(DependencyAction::ToggleForce)
                    }
                    KeyCode::Char('v') | KeyCode::Char('V') => {
                        return Ok(DependencyAction::ViewCommands)
                    }
                    _ => {}
                }
            }
        }
    }
}

fn status_line(program: Program, status: &DependencyStatus) -> Line<'static> {
    let (icon, style) = match status {
        DependencyStatus::Present => ("[OK]", Style::default().fg(Color::Green)),
        DependencyStatus::WrongVersion(_) => ("[!!]", Style::default().fg(Color::Yellow)),
        DependencyStatus::Absent => ("[x]", Style::default().fg(Color::Red)),
    };
    Line::from(vec![
        Span::styled(format!("{icon:<5}"), style.add_modifier(Modifier::BOLD)),
        Span::raw(format!("{:<12}", program.label())),
        Span::styled(status.label(), style),
    ])
}

fn draw_dependencies(
    area: Rect,
    f: &mut Frame<'_>,
    state: &DependencyState,
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
            Constraint::Length(6),
            Constraint::Length(Program::ALL.len() as u16 + 3),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(main_area);

    draw_art(layout[0], f);
    draw_page_title(layout[1], f, "Dependencies");

    let mut first_row = vec![("V", "to view commands"), ("F", "to toggle forced reinstall")];
    if state.install_enabled() {
        first_row.insert(0, ("I", "to install"));
    }
    let mut second_row = vec![("Esc", "to go back")];
    if state.next_enabled() {
        second_row.insert(0, ("Enter", "to continue"));
    }
    draw_controls(
        layout[3],
        f,
        controls_lines(&[first_row.as_slice(), second_row.as_slice()]),
    );

    let lines: Vec<Line> = match &state.report {
        Some(report) => Program::ALL
            .iter()
            .map(|program| status_line(*program, report.status(*program)))
            .collect(),
        None => vec![Line::from("Not checked yet.")],
    };
    let programs = Paragraph::new(lines)
        .block(titled_block(" Programs ").padding(Padding::new(1, 0, 1, 0)));
    f.render_widget(programs, layout[4]);

    let mut plan_text = if state.plan.is_empty() {
        vec![Line::from(Span::styled(
            "Everything required is installed.",
            Style::default().fg(Color::LightGreen),
        ))]
    } else {
        let mut text = vec![Line::from(format!(
            "{} commands in {} stage(s) will run as root:",
            state.plan.command_count(),
            state.plan.stages.len()
        ))];
        text.extend(
            state
                .plan
                .stages
                .iter()
                .map(|stage| Line::from(format!("  - {}", stage.kind.label()))),
        );
        text
    };
    plan_text.push(Line::from(format!(
        "Forced reinstall: {}",
        if state.force_reinstall { "on" } else { "off" }
    )));
    let plan = Paragraph::new(plan_text)
        .block(titled_block(" Plan ").padding(Padding::new(1, 0, 1, 0)))
        .wrap(Wrap { trim: false });
    f.render_widget(plan, layout[5]);

    let fallback = if state.next_enabled() {
        "Press Enter to continue."
    } else {
        "Install the missing programs to continue."
    };
    f.render_widget(Paragraph::new(message_line(message, fallback)), layout[6]);

    let summary_area = aligned_summary_area(summary_area, main_area, layout[3]);
    draw_install_summary(summary_area, f, summary);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_version_shows_found_version() {
        let line = status_line(
            Program::Sox,
            &DependencyStatus::WrongVersion("14.3.2".to_string()),
        );
        assert_eq!(line.spans[0].content, "[!!] ");
        assert!(line.spans[2].content.contains("14.3.2"));
    }
}
