pub const SPINNER_LEN: usize = 4;
pub(crate) const SPINNER: [&str; SPINNER_LEN] = ["|", "/", "-", "\\"];
pub(crate) const LCS_ART: [&str; 6] = [
    " _     ____ ____  ",
    "| |   / ___/ ___| ",
    "| |  | |   \\___ \\ ",
    "| |__| |___ ___) |",
    "|_____\\____|____/ ",
    "",
];

// Wizard sections shown in the summary panel, in page order
#[derive(Debug, Clone)]
pub struct InstallSummary {
    pub current_index: usize,
    pub entries: Vec<(&'static str, Option<String>)>,
}

// Actions for pages that only show text (license, notes, errors)
pub enum MessageAction {
    Next,
    Back,
    Quit,
}

// Actions for settings forms
pub enum FormAction {
    Next,
    Back,
    // A page specific Ctrl shortcut, e.g. Ctrl+T for a test message
    Shortcut(char),
    Quit,
}

// Actions for text input screens (root password)
pub enum InputAction {
    Submit(String),
    Back,
    Quit,
}

// Actions for confirmation screens (license)
pub enum ConfirmAction {
    Yes,
    No,
    Back,
    Quit,
}

// Actions for the dependency page
pub enum DependencyAction {
    Install,
    ToggleForce,
    ViewCommands,
    Next,
    Back,
    Quit,
}

// Actions for the scrollable viewer
pub enum ViewerAction {
    Back,
    Quit,
}

// UI submodules
mod colors;
mod common;
mod confirm;
mod deps;
mod form;
mod installer;
mod keybinds;
mod message;
mod text_input;
mod viewer;

pub use confirm::run_confirm_selector;
pub use deps::run_dependencies;
pub use form::{render_form, run_form, FormField, FormState};
pub use installer::draw_ui;
pub use message::run_message;
pub use text_input::{render_text_input, run_text_input};
pub use viewer::run_viewer;
