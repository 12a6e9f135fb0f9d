/////////
/// Settings forms: one page of labelled fields
////////
use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::context::PageMessage;

use super::common::{
    aligned_summary_area, controls_lines, draw_art, draw_controls, draw_install_summary,
    draw_page_title, message_line, split_main_and_summary, titled_block,
};
use super::{FormAction, InstallSummary, LCS_ART};

const LABEL_WIDTH: usize = 26;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Secret,
    Toggle,
    Choice(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct FormField {
    pub label: &'static str,
    pub kind: FieldKind,
    pub value: String,
    pub checked: bool,
    pub selected: usize,
}

impl FormField {
    fn new(label: &'static str, kind: FieldKind) -> Self {
        Self {
            label,
            kind,
            value: String::new(),
            checked: false,
            selected: 0,
        }
    }

    pub fn text(label: &'static str, value: &str) -> Self {
        Self {
            value: value.to_string(),
            ..Self::new(label, FieldKind::Text)
        }
    }

    pub fn number(label: &'static str, value: u64) -> Self {
        Self {
            value: value.to_string(),
            ..Self::new(label, FieldKind::Number)
        }
    }

    pub fn secret(label: &'static str, value: &str) -> Self {
        Self {
            value: value.to_string(),
            ..Self::new(label, FieldKind::Secret)
        }
    }

    pub fn toggle(label: &'static str, checked: bool) -> Self {
        Self {
            checked,
            ..Self::new(label, FieldKind::Toggle)
        }
    }

    pub fn choice(label: &'static str, options: Vec<String>, selected: usize) -> Self {
        let selected = selected.min(options.len().saturating_sub(1));
        Self {
            selected,
            ..Self::new(label, FieldKind::Choice(options))
        }
    }

    // Selected option of a choice field
    pub fn chosen(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Choice(options) => options.get(self.selected).map(String::as_str),
            _ => None,
        }
    }

    fn display_value(&self, focused: bool, cursor_visible: bool) -> String {
        let cursor = if focused && cursor_visible { "|" } else { "" };
        match &self.kind {
            FieldKind::Text | FieldKind::Number => format!("{}{}", self.value, cursor),
            FieldKind::Secret => format!("{}{}", "*".repeat(self.value.len()), cursor),
            FieldKind::Toggle => if self.checked { "[x]" } else { "[ ]" }.to_string(),
            FieldKind::Choice(options) => match options.get(self.selected) {
                Some(option) => format!("< {option} >"),
                None => "(none available)".to_string(),
            },
        }
    }

    fn cycle(&mut self, forward: bool) {
        if let FieldKind::Choice(options) = &self.kind {
            if options.is_empty() {
                return;
            }
            self.selected = if forward {
                (self.selected + 1) % options.len()
            } else {
                (self.selected + options.len() - 1) % options.len()
            };
        }
    }

    // Applies an editing key; returns false when the key means nothing to this field
    fn edit(&mut self, key: &KeyEvent) -> bool {
        match (&self.kind, key.code) {
            (FieldKind::Toggle, KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right) => {
                self.checked = !self.checked;
                true
            }
            (FieldKind::Choice(_), KeyCode::Left) => {
                self.cycle(false);
                true
            }
            (FieldKind::Choice(_), KeyCode::Right | KeyCode::Char(' ')) => {
                self.cycle(true);
                true
            }
            (FieldKind::Text | FieldKind::Secret | FieldKind::Number, KeyCode::Backspace) => {
                self.value.pop();
                true
            }
            (FieldKind::Text | FieldKind::Secret | FieldKind::Number, KeyCode::Char('u'))
                if key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                self.value.clear();
                true
            }
            (_, KeyCode::Char(_)) if key.modifiers.contains(KeyModifiers::CONTROL) => false,
            (FieldKind::Number, KeyCode::Char(ch)) if ch.is_ascii_digit() => {
                self.value.push(ch);
                true
            }
            (FieldKind::Text | FieldKind::Secret, KeyCode::Char(ch))
                if ch.is_ascii() && !ch.is_ascii_control() =>
            {
                self.value.push(ch);
                true
            }
            _ => false,
        }
    }
}

// Fields of one page plus the focused row
pub struct FormState {
    pub fields: Vec<FormField>,
    pub cursor: usize,
}

impl FormState {
    pub fn new(fields: Vec<FormField>) -> Self {
        Self { fields, cursor: 0 }
    }

    pub fn field(&self, label: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.label == label)
    }

    // Maps a key press to a page action, editing the focused field on the way
    pub fn handle_key(&mut self, key: KeyEvent, shortcuts: &[(char, &str)]) -> Option<FormAction> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char(ch) = key.code {
                let ch = ch.to_ascii_lowercase();
                if ch == 'q' {
                    return Some(FormAction::Quit);
                }
                if shortcuts.iter().any(|(short, _)| *short == ch) {
                    return Some(FormAction::Shortcut(ch));
                }
            }
        }
        match key.code {
            KeyCode::Enter => return Some(FormAction::Next),
            KeyCode::Esc => return Some(FormAction::Back),
            KeyCode::Up | KeyCode::BackTab => {
                self.cursor = self.cursor.saturating_sub(1);
                return None;
            }
            KeyCode::Down | KeyCode::Tab => {
                if self.cursor + 1 < self.fields.len() {
                    self.cursor += 1;
                }
                return None;
            }
            _ => {}
        }
        if let Some(field) = self.fields.get_mut(self.cursor) {
            field.edit(&key);
        }
        None
    }
}

// Runs a form until the user leaves it
pub fn run_form(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    title: &str,
    state: &mut FormState,
    info: &[Line<'_>],
    shortcuts: &[(char, &str)],
    message: Option<&PageMessage>,
    summary: &InstallSummary,
) -> Result<FormAction> {
    let mut cursor_visible = true;
    let mut last_toggle = Instant::now();

    loop {
        // Blinking cursor on text fields
        if last_toggle.elapsed() > Duration::from_millis(500) {
            cursor_visible = !cursor_visible;
            last_toggle = Instant::now();
        }

        terminal.draw(|f| {
            draw_form(
                f.size(),
                f,
                title,
                state,
                info,
                shortcuts,
                message,
                cursor_visible,
                summary,
            )
        })?;

        let timeout = Duration::from_millis(100);
        if event::poll(timeout).context("poll events")? {
            if let Event::Key(key) = event::read().context("read event")? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(action) = state.handle_key(key, shortcuts) {
                    return Ok(action);
                }
            }
        }
    }
}

// Non-interactive version of the form, shown while a slow action runs
pub fn render_form(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    title: &str,
    state: &FormState,
    info: &[Line<'_>],
    shortcuts: &[(char, &str)],
    message: Option<&PageMessage>,
    summary: &InstallSummary,
) -> Result<()> {
    terminal.draw(|f| {
        draw_form(
            f.size(),
            f,
            title,
            state,
            info,
            shortcuts,
            message,
            false,
            summary,
        )
    })?;
    Ok(())
}

// Form UI
fn draw_form(
    area: Rect,
    f: &mut Frame<'_>,
    title: &str,
    state: &FormState,
    info: &[Line<'_>],
    shortcuts: &[(char, &str)],
    message: Option<&PageMessage>,
    cursor_visible: bool,
    summary: &InstallSummary,
) {
    let (main_area, summary_area) = split_main_and_summary(area);
    let has_info = !info.is_empty();
    let mut constraints = vec![
        Constraint::Length(LCS_ART.len() as u16),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(6),
        Constraint::Length(state.fields.len() as u16 + 2),
    ];
    if has_info {
        constraints.push(Constraint::Min(3));
    } else {
        constraints.push(Constraint::Min(0));
    }
    constraints.push(Constraint::Length(1));
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(constraints)
        .split(main_area);

    draw_art(layout[0], f);
    draw_page_title(layout[1], f, title);

    let shortcut_keys: Vec<String> = shortcuts
        .iter()
        .map(|(ch, _)| format!("Ctrl+{}", ch.to_ascii_uppercase()))
        .collect();
    let mut extra_row: Vec<(&str, &str)> = shortcut_keys
        .iter()
        .zip(shortcuts.iter())
        .map(|(key, (_, text))| (key.as_str(), *text))
        .collect();
    extra_row.insert(0, ("Ctrl+U", "to clear a field"));
    let mut controls = controls_lines(&[
        &[("Up/Down", "to move"), ("Space/Left/Right", "to change")],
        &[("Enter", "to continue"), ("Esc", "to go back")],
    ]);
    controls.extend(controls_lines(&[extra_row.as_slice()]));
    draw_controls(layout[3], f, controls);

    let items: Vec<ListItem> = state
        .fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let focused = idx == state.cursor;
            let value_style = if focused {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Blue)
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{:<width$}", field.label, width = LABEL_WIDTH)),
                Span::styled(field.display_value(focused, cursor_visible), value_style),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(titled_block(" Settings ").padding(Padding::new(1, 0, 0, 0)))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));
    let mut list_state = ListState::default();
    list_state.select(Some(state.cursor.min(state.fields.len().saturating_sub(1))));
    f.render_stateful_widget(list, layout[4], &mut list_state);

    if has_info {
        let info_block = Paragraph::new(info.to_vec())
            .block(titled_block(" Info ").padding(Padding::new(1, 0, 1, 0)))
            .wrap(Wrap { trim: false });
        f.render_widget(info_block, layout[5]);
    }

    let status = Paragraph::new(message_line(message, "Press Enter to continue."));
    f.render_widget(status, layout[6]);

    let summary_area = aligned_summary_area(summary_area, main_area, layout[3]);
    draw_install_summary(summary_area, f, summary);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn state() -> FormState {
        FormState::new(vec![
            FormField::text("Server", "smtp"),
            FormField::number("Port", 587),
            FormField::toggle("Use TLS", true),
            FormField::choice("Mode", vec!["a".to_string(), "b".to_string()], 0),
        ])
    }

    #[test]
    fn typing_edits_the_focused_field() {
        let mut form = state();
        form.handle_key(press(KeyCode::Char('.')), &[]);
        form.handle_key(press(KeyCode::Char('x')), &[]);
        form.handle_key(press(KeyCode::Backspace), &[]);
        assert_eq!(form.fields[0].value, "smtp.");
    }

    #[test]
    fn number_fields_take_digits_only() {
        let mut form = state();
        form.handle_key(press(KeyCode::Down), &[]);
        form.handle_key(press(KeyCode::Char('a')), &[]);
        form.handle_key(press(KeyCode::Char('1')), &[]);
        assert_eq!(form.fields[1].value, "5871");
        form.handle_key(ctrl('u'), &[]);
        assert_eq!(form.fields[1].value, "");
    }

    #[test]
    fn space_toggles_and_cycles() {
        let mut form = state();
        form.cursor = 2;
        form.handle_key(press(KeyCode::Char(' ')), &[]);
        assert!(!form.fields[2].checked);
        form.cursor = 3;
        form.handle_key(press(KeyCode::Char(' ')), &[]);
        assert_eq!(form.fields[3].chosen(), Some("b"));
        form.handle_key(press(KeyCode::Right), &[]);
        assert_eq!(form.fields[3].chosen(), Some("a"));
        form.handle_key(press(KeyCode::Left), &[]);
        assert_eq!(form.fields[3].chosen(), Some("b"));
    }

    #[test]
    fn cursor_stays_in_range() {
        let mut form = state();
        form.handle_key(press(KeyCode::Up), &[]);
        assert_eq!(form.cursor, 0);
        for _ in 0..10 {
            form.handle_key(press(KeyCode::Down), &[]);
        }
        assert_eq!(form.cursor, 3);
    }

    #[test]
    fn navigation_keys_become_actions() {
        let mut form = state();
        assert!(matches!(
            form.handle_key(press(KeyCode::Enter), &[]),
            Some(FormAction::Next)
        ));
        assert!(matches!(
            form.handle_key(press(KeyCode::Esc), &[]),
            Some(FormAction::Back)
        ));
        assert!(matches!(form.handle_key(ctrl('q'), &[]), Some(FormAction::Quit)));
        assert!(matches!(
            form.handle_key(ctrl('t'), &[('t', "to send a test message")]),
            Some(FormAction::Shortcut('t'))
        ));
        assert!(form.handle_key(ctrl('t'), &[]).is_none());
    }

    #[test]
    fn shortcut_carries_the_pressed_key() {
        let mut form = state();
        let shortcuts = [('t', "to send a test message"), ('r', "to reset")];
        assert!(matches!(
            form.handle_key(ctrl('R'), &shortcuts),
            Some(FormAction::Shortcut('r'))
        ));
        assert!(matches!(
            form.handle_key(ctrl('T'), &shortcuts),
            Some(FormAction::Shortcut('t'))
        ));
    }

    #[test]
    fn secrets_are_masked() {
        let field = FormField::secret("Password", "abc");
        assert_eq!(field.display_value(false, true), "***");
    }

    #[test]
    fn empty_choice_is_shown_as_unavailable() {
        let field = FormField::choice("Device", Vec::new(), 3);
        assert_eq!(field.chosen(), None);
        assert_eq!(field.display_value(false, false), "(none available)");
    }
}
