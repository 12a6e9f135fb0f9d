use std::collections::VecDeque;
use std::fs::File;

// Single step in a provisioning run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Pending, // Not yet started
    Running, // Currently in progress
    Done,    // Completed successfully
    Skipped, // Was skipped
    Failed,  // Failed with an error
}

impl StepStatus {
    pub fn log_label(self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Running => "RUNNING",
            StepStatus::Done => "OK",
            StepStatus::Skipped => "SKIP",
            StepStatus::Failed => "FAIL",
        }
    }
}

pub struct Step {
    pub name: String,
    pub status: StepStatus,
    pub err: Option<String>,
}

// Events sent from the worker thread to the progress screen
pub enum InstallerEvent {
    // A line of command output or narration
    Log(String),
    // Overall progress between 0.0 and 1.0
    Progress(f64),
    Step {
        index: usize,
        status: StepStatus,
        err: Option<String>,
    },
    // sudo refused the password; the run stops after this
    PasswordRejected,
    Done(Option<String>),
}

// State of the progress screen for one run
pub struct App {
    pub title: String,
    pub steps: Vec<Step>,
    pub progress: f64,
    pub logs: VecDeque<String>,
    pub spinner_idx: usize,
    pub done: bool,
    pub err: Option<String>,
    pub password_rejected: bool,
    pub log_file: Option<File>,
}

impl App {
    pub fn new(title: &str, step_names: &[String], log_file: Option<File>) -> Self {
        Self {
            title: title.to_string(),
            steps: step_names
                .iter()
                .map(|name| Step {
                    name: name.clone(),
                    status: StepStatus::Pending,
                    err: None,
                })
                .collect(),
            progress: 0.0,
            logs: VecDeque::new(),
            spinner_idx: 0,
            done: false,
            err: None,
            password_rejected: false,
            log_file,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.done && self.err.is_none()
    }
}
