use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::{App, InstallerEvent};

pub(crate) const LOG_CAPACITY: usize = 200;
pub(crate) const LOG_FILE_PATH: &str = "/tmp/lcs-installer.log";

static DEBUG: AtomicBool = AtomicBool::new(false);

pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

// Debug messages to the log file, only with --debug
pub fn log_debug(message: &str) {
    if !debug_enabled() {
        return;
    }
    let _ = OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE_PATH)
        .and_then(|mut file| writeln!(file, "DEBUG: {}", message));
}

// Appends a line to the log file without holding it open
pub fn log_line(message: &str) {
    let _ = OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE_PATH)
        .and_then(|mut file| writeln!(file, "{}", message));
}

pub fn open_log_file() -> Option<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE_PATH)
        .ok()
}

pub(crate) fn handle_event(app: &mut App, evt: InstallerEvent) {
    match evt {
        InstallerEvent::Log(line) => {
            push_log(&mut app.logs, line.clone());
            append_log_file(&mut app.log_file, &line);
        }
        InstallerEvent::Progress(value) => app.progress = value,
        InstallerEvent::Step { index, status, err } => {
            if let Some(step) = app.steps.get_mut(index) {
                step.status = status;
                step.err = err.clone();
                let line = format!("STEP {}: {}", step.name, status.log_label());
                append_log_file(&mut app.log_file, &line);
                if let Some(err) = err {
                    append_log_file(&mut app.log_file, &format!("ERROR: {}", err));
                }
            }
        }
        InstallerEvent::PasswordRejected => {
            app.password_rejected = true;
            append_log_file(&mut app.log_file, "ERROR: password rejected");
        }
        InstallerEvent::Done(err) => {
            app.done = true;
            app.err = err.clone();
            match err {
                Some(err) => append_log_file(&mut app.log_file, &format!("DONE: {}", err)),
                None => append_log_file(&mut app.log_file, "DONE: ok"),
            }
        }
    }
}

pub(crate) fn push_log(logs: &mut VecDeque<String>, line: String) {
    if logs.len() >= LOG_CAPACITY {
        logs.pop_front();
    }
    logs.push_back(line);
}

pub(crate) fn append_log_file(log_file: &mut Option<File>, line: &str) {
    if let Some(file) = log_file.as_mut() {
        let _ = writeln!(file, "{}", line);
        let _ = file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepStatus;

    #[test]
    fn log_ring_is_bounded() {
        let mut logs = VecDeque::new();
        for idx in 0..(LOG_CAPACITY + 5) {
            push_log(&mut logs, idx.to_string());
        }
        assert_eq!(logs.len(), LOG_CAPACITY);
        assert_eq!(logs.front().map(String::as_str), Some("5"));
    }

    #[test]
    fn events_update_app() {
        let mut app = App::new("Test", &["One".to_string(), "Two".to_string()], None);
        handle_event(
            &mut app,
            InstallerEvent::Step {
                index: 1,
                status: StepStatus::Failed,
                err: Some("boom".to_string()),
            },
        );
        handle_event(&mut app, InstallerEvent::PasswordRejected);
        handle_event(&mut app, InstallerEvent::Done(Some("boom".to_string())));
        assert_eq!(app.steps[1].status, StepStatus::Failed);
        assert!(app.password_rejected);
        assert!(app.done);
        assert!(!app.succeeded());
    }
}
