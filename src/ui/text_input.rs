use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::context::PageMessage;

use super::common::{
    aligned_summary_area, draw_art, draw_controls, draw_install_summary, draw_page_title,
    message_line, split_main_and_summary, titled_block,
};
use super::{InputAction, InstallSummary, LCS_ART};

// Horizontal jitter of the input box after a rejected password, one entry per frame
const SHAKE_OFFSETS: [i16; 8] = [3, -3, 2, -2, 1, -1, 1, 0];

// Text input screen
pub fn run_text_input(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    title: &str,
    controls: &[Line<'_>],
    info: &[Line<'_>],
    input_title: &str,
    mask: bool, // Whether to mask the input (for passwords)
    shake: bool,
    message: Option<&PageMessage>,
    summary: &InstallSummary,
) -> Result<InputAction> {
    let mut input = String::new();
    let mut cursor_visible = true;
    let mut last_toggle = Instant::now();
    let mut shake_frame = if shake { 0 } else { SHAKE_OFFSETS.len() };

    // Main loop for the text input screen
    loop {
        // Toggle cursor visibility to create a blinking effect
        if last_toggle.elapsed() > Duration::from_millis(500) {
            cursor_visible = !cursor_visible;
            last_toggle = Instant::now();
        }
        let offset = shake_offset(shake_frame);
        shake_frame = shake_frame.saturating_add(1);

        // Draw the UI
        terminal.draw(|f| {
            draw_text_input(
                f.size(),
                f,
                title,
                controls,
                info,
                input_title,
                &input,
                mask,
                cursor_visible,
                offset,
                message,
                summary,
            )
        })?;

        // User input
        let timeout = Duration::from_millis(if offset != 0 { 40 } else { 100 });
        if event::poll(timeout).context("poll events")? {
            if let Event::Key(key) = event::read().context("read event")? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Enter => return Ok(InputAction::Submit(input.clone())),
                    KeyCode::Esc => return Ok(InputAction::Back),
                    KeyCode::Char('q') | KeyCode::Char('Q')
                        if key.modifiers.contains(KeyModifiers::CONTROL) =>
                    {
                        return Ok(InputAction::Quit)
                    }
                    KeyCode::Backspace => {
                        input.pop();
                    }
                    KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        input.clear();
                    }
                    KeyCode::Char(ch) if ch.is_ascii() && !ch.is_ascii_control() => {
                        input.push(ch);
                    }
                    _ => {}
                }
            }
        }
    }
}

fn shake_offset(frame: usize) -> i16 {
    SHAKE_OFFSETS.get(frame).copied().unwrap_or(0)
}

// Moves a rect sideways, staying inside `bounds`
fn shifted(rect: Rect, offset: i16, bounds: Rect) -> Rect {
    let min_x = bounds.x as i32;
    let max_x = (bounds.x + bounds.width).saturating_sub(rect.width) as i32;
    let x = (rect.x as i32 + offset as i32).clamp(min_x, max_x.max(min_x));
    Rect { x: x as u16, ..rect }
}

// Text input UI
fn draw_text_input(
    area: Rect,
    f: &mut Frame<'_>,
    title: &str,
    controls: &[Line<'_>],
    info: &[Line<'_>],
    input_title: &str,
    input: &str,
    mask: bool,
    cursor_visible: bool,
    offset: i16,
    message: Option<&PageMessage>,
    summary: &InstallSummary,
) {
    let (main_area, summary_area) = split_main_and_summary(area);
    let has_info = !info.is_empty();
    let mut layout_constraints = vec![
        Constraint::Length(LCS_ART.len() as u16),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(5),
        Constraint::Length(3),
    ];
    if has_info {
        layout_constraints.push(Constraint::Min(4));
    }
    layout_constraints.push(Constraint::Length(1));
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(layout_constraints)
        .split(main_area);

    draw_art(layout[0], f);
    draw_page_title(layout[1], f, title);
    draw_controls(layout[3], f, controls.to_vec());

    // Show the input string, masked if necessary with a blinking cursor
    let mut shown = if mask {
        "*".repeat(input.len())
    } else {
        input.to_string()
    };
    if cursor_visible {
        shown.push('|');
    }
    let input_title = format!(" {} ", input_title);
    let input_block = Paragraph::new(Line::from(Span::styled(
        shown,
        Style::default().fg(Color::Yellow),
    )))
    .block(titled_block(&input_title));
    f.render_widget(input_block, shifted(layout[4], offset, main_area));

    // Optionally, draw an info box
    let status_idx = if has_info {
        let info_block = Paragraph::new(info.to_vec())
            .block(titled_block(" Info ").padding(Padding::new(1, 0, 1, 0)))
            .wrap(Wrap { trim: false });
        f.render_widget(info_block, layout[5]);
        6
    } else {
        5
    };

    let status = Paragraph::new(message_line(message, "Press Enter to submit."));
    f.render_widget(status, layout[status_idx]);

    let summary_area = aligned_summary_area(summary_area, main_area, layout[3]);
    draw_install_summary(summary_area, f, summary);
}

// Non-interactive version of the text input UI
pub fn render_text_input(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    title: &str,
    controls: &[Line<'_>],
    info: &[Line<'_>],
    input_title: &str,
    input: &str,
    mask: bool,
    message: Option<&PageMessage>,
    summary: &InstallSummary,
) -> Result<()> {
    terminal.draw(|f| {
        draw_text_input(
            f.size(),
            f,
            title,
            controls,
            info,
            input_title,
            input,
            mask,
            false, // Cursor is not visible in the non-interactive version
            0,
            message,
            summary,
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shake_settles_at_rest() {
        assert_eq!(shake_offset(0), 3);
        assert_eq!(shake_offset(SHAKE_OFFSETS.len()), 0);
        assert_eq!(shake_offset(usize::MAX), 0);
    }

    #[test]
    fn shifted_rect_stays_in_bounds() {
        let bounds = Rect::new(0, 0, 20, 10);
        let rect = Rect::new(0, 2, 18, 3);
        assert_eq!(shifted(rect, -3, bounds).x, 0);
        assert_eq!(shifted(rect, 3, bounds).x, 2);
        assert_eq!(shifted(Rect::new(1, 2, 10, 3), 2, bounds).x, 3);
    }
}
