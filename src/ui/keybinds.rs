use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Padding, Paragraph, Wrap};
use ratatui::Frame;

use super::common::titled_block;

const KEYBINDS: [&str; 2] = ["Ctrl + Q quits the installer", "Esc returns to the previous page"];
const KEYBINDS_KEYS: [&str; 3] = ["Ctrl", "Q", "Esc"];

fn styled_keybind_line(line: &str) -> Vec<Span<'static>> {
    let mut spans = Vec::new();

    for part in line.split_inclusive(' ') {
        let (token, trailing_space) = match part.strip_suffix(' ') {
            Some(token) => (token, " "),
            None => (part, ""),
        };
        if KEYBINDS_KEYS.iter().any(|key| key == &token) {
            spans.push(Span::styled(
                token.to_string(),
                Style::default().fg(Color::Cyan),
            ));
        } else {
            spans.push(Span::raw(token.to_string()));
        }

        if !trailing_space.is_empty() {
            spans.push(Span::raw(trailing_space));
        }
    }

    spans
}

pub(crate) fn keybinds_height() -> u16 {
    (KEYBINDS.len() as u16).saturating_add(3)
}

pub(crate) fn draw_keybinds(area: Rect, f: &mut Frame<'_>) {
    let lines: Vec<Line> = KEYBINDS
        .iter()
        .map(|line| Line::from(styled_keybind_line(line)))
        .collect();
    let keybinds_block = Paragraph::new(lines)
        .block(titled_block(" Keys ").padding(Padding::new(1, 0, 1, 0)))
        .wrap(Wrap { trim: false });
    f.render_widget(keybinds_block, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_are_split_out() {
        let spans = styled_keybind_line("Ctrl + Q quits");
        assert_eq!(spans[0].content, "Ctrl");
        assert_eq!(spans[0].style.fg, Some(Color::Cyan));
        assert_eq!(spans[2].content, "+");
        assert_eq!(spans[2].style.fg, None);
    }
}
