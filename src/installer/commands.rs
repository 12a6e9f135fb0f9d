use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;

use crate::model::InstallerEvent;

use super::send_event;

// Substrings in a command's error stream that mark it as failed
pub const FAILURE_KEYWORDS: [&str; 5] = ["error", "fail", "try again", "cannot", "fatal"];

#[derive(Debug, Error)]
pub enum PrivilegedError {
    #[error("the password was not accepted")]
    PasswordRejected,
    #[error("{command} failed: {detail}")]
    CommandFailed { command: String, detail: String },
    #[error("could not start {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

// Captured result of one finished command
#[derive(Clone, Debug, Default)]
pub struct CommandOutcome {
    pub command: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

// Decides whether a finished command failed
pub trait FailureDetector {
    fn detect(&self, outcome: &CommandOutcome) -> Option<PrivilegedError>;
}

// Case-insensitive keyword scan of the error stream, plus the exit status
pub struct KeywordScan;

// Exit status only, for tools that narrate progress on stderr
pub struct ExitStatusCheck;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    KeywordScan,
    ExitStatus,
}

impl FailurePolicy {
    pub fn detector(self) -> &'static dyn FailureDetector {
        match self {
            FailurePolicy::KeywordScan => &KeywordScan,
            FailurePolicy::ExitStatus => &ExitStatusCheck,
        }
    }
}

pub fn password_rejected(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("try again") || lower.contains("incorrect password")
}

pub fn failure_keyword(stderr: &str) -> Option<&'static str> {
    let lower = stderr.to_lowercase();
    FAILURE_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| lower.contains(keyword))
}

fn failure_detail(outcome: &CommandOutcome) -> String {
    let stderr = outcome.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    // Some tools report failures on stdout; its last line usually says why
    match outcome.stdout.lines().rev().map(str::trim).find(|line| !line.is_empty()) {
        Some(line) => format!("exited with a non-zero status: {line}"),
        None => "exited with a non-zero status".to_string(),
    }
}

impl FailureDetector for KeywordScan {
    fn detect(&self, outcome: &CommandOutcome) -> Option<PrivilegedError> {
        if password_rejected(&outcome.stderr) {
            return Some(PrivilegedError::PasswordRejected);
        }
        if failure_keyword(&outcome.stderr).is_some() || !outcome.success {
            return Some(PrivilegedError::CommandFailed {
                command: outcome.command.clone(),
                detail: failure_detail(outcome),
            });
        }
        None
    }
}

impl FailureDetector for ExitStatusCheck {
    fn detect(&self, outcome: &CommandOutcome) -> Option<PrivilegedError> {
        if password_rejected(&outcome.stderr) {
            return Some(PrivilegedError::PasswordRejected);
        }
        if !outcome.success {
            return Some(PrivilegedError::CommandFailed {
                command: outcome.command.clone(),
                detail: failure_detail(outcome),
            });
        }
        None
    }
}

// Runs argv through sudo with the password fed over stdin, blocking until it exits
pub fn run_as_root(
    tx: Option<&crossbeam_channel::Sender<InstallerEvent>>,
    argv: &[&str],
    workdir: Option<&Path>,
    password: &str,
    detector: &dyn FailureDetector,
) -> Result<CommandOutcome, PrivilegedError> {
    let cmdline = argv.join(" ");
    if let Some(tx) = tx {
        send_event(tx, InstallerEvent::Log(format!("# {}", cmdline)));
    }

    // Drop any cached sudo session so a wrong password cannot slip through
    Command::new("sudo")
        .arg("-k")
        .output()
        .map_err(|source| PrivilegedError::Spawn {
            command: "sudo -k".to_string(),
            source,
        })?;

    let mut cmd = Command::new("sudo");
    cmd.args(["-S", "-p", "", "--"])
        .args(argv)
        .env("LC_ALL", "C")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }
    let mut child = cmd.spawn().map_err(|source| PrivilegedError::Spawn {
        command: cmdline.clone(),
        source,
    })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(format!("{password}\n").as_bytes())
            .map_err(|source| PrivilegedError::Io {
                context: "write password".to_string(),
                source,
            })?;
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let tx_out = tx.cloned();
    let tx_err = tx.cloned();
    let out_handle =
        stdout.map(|out| thread::spawn(move || capture_command_output(out, tx_out.as_ref())));
    let err_handle =
        stderr.map(|err| thread::spawn(move || capture_command_output(err, tx_err.as_ref())));

    let status = child.wait().map_err(|source| PrivilegedError::Io {
        context: format!("wait for {}", cmdline),
        source,
    })?;
    let stdout = out_handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    let stderr = err_handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    let outcome = CommandOutcome {
        command: cmdline,
        success: status.success(),
        stdout,
        stderr,
    };
    match detector.detect(&outcome) {
        Some(err) => Err(err),
        None => Ok(outcome),
    }
}

// Confirms the password by running `true` as root
pub fn validate_password(password: &str) -> Result<(), PrivilegedError> {
    run_as_root(None, &["true"], None, password, &KeywordScan).map(|_| ())
}

// Writes contents to a temp file, syncs it, then moves it into place as root
pub fn install_file_as_root(
    tx: Option<&crossbeam_channel::Sender<InstallerEvent>>,
    contents: &str,
    destination: &str,
    mode: &str,
    password: &str,
) -> Result<(), PrivilegedError> {
    let io_err = |context: &str| {
        let context = context.to_string();
        move |source: std::io::Error| PrivilegedError::Io { context, source }
    };
    let mut file = tempfile::Builder::new()
        .prefix("lcs-installer-")
        .tempfile()
        .map_err(io_err("create temporary file"))?;
    file.write_all(contents.as_bytes())
        .map_err(io_err("write temporary file"))?;
    file.flush().map_err(io_err("flush temporary file"))?;
    file.as_file()
        .sync_all()
        .map_err(io_err("sync temporary file"))?;
    let temp_path: PathBuf = file
        .into_temp_path()
        .keep()
        .map_err(|err| PrivilegedError::Io {
            context: "keep temporary file".to_string(),
            source: err.error,
        })?;
    let temp = temp_path.to_string_lossy().to_string();

    let parent = Path::new(destination)
        .parent()
        .map(|dir| dir.to_string_lossy().to_string())
        .unwrap_or_else(|| "/".to_string());
    let result = run_as_root(tx, &["mkdir", "-p", &parent], None, password, &KeywordScan)
        .and_then(|_| run_as_root(tx, &["mv", &temp, destination], None, password, &KeywordScan))
        .and_then(|_| {
            run_as_root(
                tx,
                &["chown", "root:root", destination],
                None,
                password,
                &KeywordScan,
            )
        })
        .and_then(|_| run_as_root(tx, &["chmod", mode, destination], None, password, &KeywordScan));
    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result.map(|_| ())
}

// Collects a command's output while forwarding each cleaned line as a log event
fn capture_command_output<R: Read>(
    reader: R,
    tx: Option<&crossbeam_channel::Sender<InstallerEvent>>,
) -> String {
    let mut buffer = [0u8; 4096];
    let mut captured = Vec::new();
    let mut line = String::new();
    let mut reader = reader;
    let forward = |line: &str| {
        let trimmed = sanitize_log_line(line);
        if trimmed.is_empty() {
            return;
        }
        if let Some(tx) = tx {
            send_event(tx, InstallerEvent::Log(trimmed));
        }
    };
    loop {
        let count = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => count,
            Err(_) => break,
        };
        captured.extend_from_slice(&buffer[..count]);
        let chunk = String::from_utf8_lossy(&buffer[..count]);
        for ch in chunk.chars() {
            // Carriage returns redraw progress bars; keep only the final state
            if ch == '\r' {
                line.clear();
                continue;
            }
            if ch == '\n' {
                forward(&line);
                line.clear();
            } else {
                line.push(ch);
            }
        }
    }
    forward(&line);
    String::from_utf8_lossy(&captured).to_string()
}

// Removes ANSI escape codes and other control characters from log lines
pub(crate) fn sanitize_log_line(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0x1b => {
                i += 1;
                if i >= bytes.len() {
                    break;
                }
                if bytes[i] == b'[' {
                    i += 1;
                    while i < bytes.len() {
                        let b = bytes[i];
                        i += 1;
                        if (0x40..=0x7e).contains(&b) {
                            break;
                        }
                    }
                } else {
                    i += 1;
                }
            }
            b if b.is_ascii_control() => {
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(success: bool, stdout: &str, stderr: &str) -> CommandOutcome {
        CommandOutcome {
            command: "apt-get install sox".to_string(),
            success,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn keyword_scan_is_case_insensitive() {
        let result = KeywordScan.detect(&outcome(
            true,
            "Reading package lists... Done",
            "E: Unable to locate package: FATAL",
        ));
        assert!(matches!(result, Some(PrivilegedError::CommandFailed { .. })));
    }

    #[test]
    fn failure_detail_falls_back_to_stdout() {
        let stdout = "Reading lists\nE: Unable to locate package sox\n\n";
        let detail = failure_detail(&outcome(false, stdout, ""));
        assert_eq!(
            detail,
            "exited with a non-zero status: E: Unable to locate package sox"
        );
        assert_eq!(
            failure_detail(&outcome(false, "", "")),
            "exited with a non-zero status"
        );
        assert_eq!(failure_detail(&outcome(false, "ok", "boom\n")), "boom");
    }

    #[test]
    fn keyword_scan_ignores_stdout() {
        let result = KeywordScan.detect(&outcome(true, "no error here, nothing failed", ""));
        assert!(result.is_none());
    }

    #[test]
    fn keyword_scan_matches_anywhere_in_stderr() {
        for stderr in ["Error: x", "the build FAILED", "cannot stat", "something Fatal"] {
            assert!(
                KeywordScan.detect(&outcome(true, "", stderr)).is_some(),
                "{stderr} should be reported"
            );
        }
    }

    #[test]
    fn try_again_is_password_rejection() {
        let result = KeywordScan.detect(&outcome(false, "", "Sorry, try again."));
        assert!(matches!(result, Some(PrivilegedError::PasswordRejected)));
        let result = ExitStatusCheck.detect(&outcome(false, "", "sudo: 1 incorrect password attempt"));
        assert!(matches!(result, Some(PrivilegedError::PasswordRejected)));
    }

    #[test]
    fn exit_status_check_tolerates_stderr_progress() {
        let result = ExitStatusCheck.detect(&outcome(true, "", "Cloning into 'sox'...\nerror: none"));
        assert!(result.is_none());
        let result = ExitStatusCheck.detect(&outcome(false, "", ""));
        assert!(matches!(
            result,
            Some(PrivilegedError::CommandFailed { detail, .. }) if detail.contains("non-zero")
        ));
    }

    #[test]
    fn policy_maps_to_detector() {
        let benign_stderr = outcome(true, "", "warning: failover disabled");
        assert!(FailurePolicy::KeywordScan
            .detector()
            .detect(&benign_stderr)
            .is_some());
        assert!(FailurePolicy::ExitStatus
            .detector()
            .detect(&benign_stderr)
            .is_none());
    }

    #[test]
    fn sanitize_strips_escape_codes() {
        assert_eq!(sanitize_log_line("\x1b[32mdone\x1b[0m\t"), "done");
    }

    #[test]
    fn capture_keeps_raw_text() {
        let text = capture_command_output("50%\r100%\nnext\n".as_bytes(), None);
        assert_eq!(text, "50%\r100%\nnext\n");
    }
}
