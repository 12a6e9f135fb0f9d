mod cli;
mod config;
mod context;
mod forms;
mod installer;
mod logging;
mod mail;
mod model;
mod pages;
mod plan;
mod probe;
mod settings;
mod ui;

use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, ClearType};
use crossterm::{cursor, execute, terminal::Clear};
use ratatui::backend::CrosstermBackend;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::Terminal;

use crate::cli::Cli;
use crate::config::config;
use crate::context::{Environment, InstallerContext};
use crate::forms::{
    apply_email, apply_paths, apply_report, apply_samba, email_form, paths_form, report_form,
    samba_form,
};
use crate::installer::{
    plan_step_names, run_dependency_install, run_installer, validate_password, InstallConfig,
    PrivilegedError, STEP_NAMES,
};
use crate::logging::{
    append_log_file, handle_event, log_debug, log_line, open_log_file, push_log, set_debug,
    LOG_FILE_PATH,
};
use crate::mail::{send_test_message, validate_email_settings};
use crate::model::{App, InstallerEvent};
use crate::pages::{go_to_page, transition, validate_transitions, NavAction, Page};
use crate::probe::{
    find_companion_scripts, list_normal_users, list_ram_devices, probe_os_release, search_path,
    DEV_DIR, OS_RELEASE_PATH, PASSWD_PATH,
};
use crate::settings::{load_settings, SETTINGS_PATH};
use crate::ui::{
    draw_ui, render_form, render_text_input, run_confirm_selector, run_dependencies, run_form,
    run_message, run_text_input, run_viewer, ConfirmAction, DependencyAction, FormAction,
    FormState, InputAction, InstallSummary, MessageAction, ViewerAction, SPINNER_LEN,
};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

// What a page asks the wizard loop to do next
enum Flow {
    Nav(NavAction),
    // Walk back to an earlier page and show an error there
    Rewind { to: Page, error: String },
    // Show the same page again without re-running its entry side effects
    Stay,
    Quit,
}

// How a worker run ended, as seen by the progress screen
enum RunOutcome {
    Succeeded,
    Failed(String),
    PasswordRejected,
    Quit,
}

const LICENSE_TEXT: [&str; 6] = [
    "Loudness Correction is free software: you can redistribute it and/or modify it",
    "under the terms of the GNU General Public License as published by the Free",
    "Software Foundation, either version 3 of the License, or (at your option) any",
    "later version.",
    "",
    "It is distributed WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.",
];

// Ctrl shortcut on the email page
const TEST_MAIL_KEY: char = 't';

const FFMPEG_NOTE: [&str; 5] = [
    "The server decodes compressed formats (mp3, aac, ac3 and others) with ffmpeg.",
    "The installer does not install ffmpeg because distribution builds often lack codecs.",
    "Install a full ffmpeg build yourself if you need those formats.",
    "",
    "Press Enter to write the configuration, init script and server scripts.",
];

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    set_debug(cli.debug);

    // Commands that need root go through sudo; the wizard runs as a normal user
    let skip_root_check = std::env::var("LCS_DEV_SKIP_ROOT_CHECK").ok().as_deref() == Some("1");
    if unsafe { libc::geteuid() } == 0 && !skip_root_check {
        println!("lcs-installer should be run as a normal user.");
        println!("It asks for the administrator password when it needs it.");
        return Ok(());
    }

    if let Err(err) = validate_transitions() {
        anyhow::bail!("page table is inconsistent: {err}");
    }

    let settings = match load_settings(Path::new(SETTINGS_PATH)) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Could not read {SETTINGS_PATH}: {err}");
            std::process::exit(1);
        }
    };

    let (environment, fatal) = probe_environment(&cli);
    let mut ctx = InstallerContext::new(settings, environment);
    ctx.fatal = fatal;

    // Set up the terminal for TUI interaction
    enable_raw_mode().context("enable raw mode")?;
    clear_screen()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout())).context("init terminal")?;

    let first = if ctx.fatal.is_some() {
        transition(Page::License, NavAction::Fail).unwrap_or(Page::Fatal)
    } else {
        Page::License
    };
    let mut page = go_to_page(&mut ctx, first);
    let mut shake = false;

    // The wizard loop
    loop {
        let flow = run_page(&mut terminal, &mut ctx, page, &mut shake)?;
        match flow {
            Flow::Nav(action) => {
                if let Some(next) = transition(page, action) {
                    page = go_to_page(&mut ctx, next);
                }
            }
            Flow::Rewind { to, error } => {
                page = rewind(page, to);
                page = go_to_page(&mut ctx, page);
                ctx.set_error(error);
                shake = page == Page::RootPassword;
            }
            Flow::Stay => {}
            Flow::Quit => break,
        }
    }

    // Clean up the terminal before exiting
    disable_raw_mode().context("disable raw mode")?;
    let _ = clear_screen();
    Ok(())
}

// Distribution, companion scripts, ram disks and users; the message is set when the wizard cannot run
fn probe_environment(cli: &Cli) -> (Environment, Option<String>) {
    let cfg = config();
    let distribution = match cli.forced_distribution() {
        Some(forced) => {
            log_debug(&format!("Distribution forced to {}", forced.label()));
            Ok(forced)
        }
        None => probe_os_release(Path::new(OS_RELEASE_PATH), &cfg.distributions),
    };
    let script_dir = find_companion_scripts(&cfg.scripts.companion);
    let fatal = match (&distribution, &script_dir) {
        (Err(err), _) | (_, Err(err)) => Some(err.clone()),
        _ => None,
    };
    if let Some(err) = &fatal {
        log_line(&format!("ERROR: {err}"));
    }
    let environment = Environment {
        distribution: distribution.ok(),
        ram_devices: list_ram_devices(Path::new(DEV_DIR)),
        users: list_normal_users(Path::new(PASSWD_PATH)),
        search_path: search_path(),
        script_dir: script_dir.ok(),
    };
    (environment, fatal)
}

fn run_page(
    terminal: &mut Term,
    ctx: &mut InstallerContext,
    page: Page,
    shake: &mut bool,
) -> Result<Flow> {
    let summary = build_summary(ctx, page);
    let title = page.title();
    let flow = match page {
        Page::License => {
            let text = plain_lines(&LICENSE_TEXT);
            match run_confirm_selector(
                terminal,
                title,
                &text,
                ["I accept the license", "I do not accept"],
                &summary,
            )? {
                ConfirmAction::Yes => Flow::Nav(NavAction::Next),
                ConfirmAction::No | ConfirmAction::Quit => Flow::Quit,
                ConfirmAction::Back => Flow::Stay,
            }
        }
        Page::Intro => {
            let text = intro_lines(ctx);
            message_flow(run_message(
                terminal,
                title,
                &text,
                true,
                true,
                ctx.page_message.as_ref(),
                &summary,
            )?)
        }
        Page::Paths => {
            let mut form = paths_form(&ctx.settings);
            run_settings_form(terminal, ctx, page, &mut form, &summary, |ctx, form| {
                apply_paths(&mut ctx.settings, form)
            })?
        }
        Page::Email => run_email_page(terminal, ctx, &summary)?,
        Page::Report => {
            let mut form = report_form(&ctx.settings, &ctx.environment);
            run_settings_form(terminal, ctx, page, &mut form, &summary, |ctx, form| {
                apply_report(&mut ctx.settings, &ctx.environment, form)
            })?
        }
        Page::Samba => {
            let mut form = samba_form(&ctx.settings);
            run_settings_form(terminal, ctx, page, &mut form, &summary, |ctx, form| {
                apply_samba(&mut ctx.settings, form)
            })?
        }
        Page::RootPassword => run_password_page(terminal, ctx, &summary, shake)?,
        Page::Dependencies => run_dependency_page(terminal, ctx, &summary)?,
        Page::CommandViewer => {
            let lines = ctx.dependencies.plan.display_lines();
            match run_viewer(terminal, title, &lines)? {
                ViewerAction::Back => Flow::Nav(NavAction::Back),
                ViewerAction::Quit => Flow::Quit,
            }
        }
        Page::FfmpegNote => run_final_install_page(terminal, ctx, &summary)?,
        Page::Completion => {
            let text = completion_lines(ctx);
            match run_message(terminal, title, &text, true, false, None, &summary)? {
                MessageAction::Next | MessageAction::Quit | MessageAction::Back => Flow::Quit,
            }
        }
        Page::Fatal => {
            let reason = ctx
                .fatal
                .clone()
                .unwrap_or_else(|| "The installer cannot continue.".to_string());
            let text = vec![
                Line::from(Span::styled(reason, Style::default().fg(Color::LightRed))),
                Line::from(""),
                Line::from(format!("Details are in {LOG_FILE_PATH}.")),
            ];
            run_message(terminal, title, &text, false, false, None, &summary)?;
            Flow::Quit
        }
    };
    Ok(flow)
}

fn message_flow(action: MessageAction) -> Flow {
    match action {
        MessageAction::Next => Flow::Nav(NavAction::Next),
        MessageAction::Back => Flow::Nav(NavAction::Back),
        MessageAction::Quit => Flow::Quit,
    }
}

// Shared loop of the settings pages: Next only when the form applies cleanly
fn run_settings_form<F>(
    terminal: &mut Term,
    ctx: &mut InstallerContext,
    page: Page,
    form: &mut FormState,
    summary: &InstallSummary,
    apply: F,
) -> Result<Flow>
where
    F: Fn(&mut InstallerContext, &FormState) -> Result<(), String>,
{
    loop {
        let info = form_info(ctx, page);
        let action = run_form(
            terminal,
            page.title(),
            form,
            &info,
            &[],
            ctx.page_message.as_ref(),
            summary,
        )?;
        match action {
            FormAction::Next => match apply(ctx, form) {
                Ok(()) => return Ok(Flow::Nav(NavAction::Next)),
                Err(err) => ctx.set_error(err),
            },
            FormAction::Back => {
                // Keep what the user typed when it is valid
                let _ = apply(ctx, form);
                return Ok(Flow::Nav(NavAction::Back));
            }
            FormAction::Shortcut(_) => {}
            FormAction::Quit => return Ok(Flow::Quit),
        }
    }
}

fn run_email_page(
    terminal: &mut Term,
    ctx: &mut InstallerContext,
    summary: &InstallSummary,
) -> Result<Flow> {
    let shortcuts = [(TEST_MAIL_KEY, "to send a test message")];
    let mut form = email_form(&ctx.settings);
    loop {
        let info = form_info(ctx, Page::Email);
        let action = run_form(
            terminal,
            Page::Email.title(),
            &mut form,
            &info,
            &shortcuts,
            ctx.page_message.as_ref(),
            summary,
        )?;
        match action {
            FormAction::Next => {
                if let Err(err) = apply_email(&mut ctx.settings, &form) {
                    ctx.set_error(err);
                    continue;
                }
                ctx.email_problems = if ctx.settings.email.enabled {
                    validate_email_settings(&ctx.settings.email)
                } else {
                    Vec::new()
                };
                match ctx.email_problems.first() {
                    Some(problem) => ctx.set_error(problem.clone()),
                    None => return Ok(Flow::Nav(NavAction::Next)),
                }
            }
            FormAction::Back => {
                let _ = apply_email(&mut ctx.settings, &form);
                return Ok(Flow::Nav(NavAction::Back));
            }
            FormAction::Shortcut(key) if key == TEST_MAIL_KEY => {
                if let Err(err) = apply_email(&mut ctx.settings, &form) {
                    ctx.set_error(err);
                    continue;
                }
                ctx.set_notice("Sending test message...");
                let info = form_info(ctx, Page::Email);
                render_form(
                    terminal,
                    Page::Email.title(),
                    &form,
                    &info,
                    &shortcuts,
                    ctx.page_message.as_ref(),
                    summary,
                )?;
                match send_test_message(&ctx.settings.email) {
                    Ok(()) => ctx.set_notice("Test message sent"),
                    Err(err) => ctx.set_error(err),
                }
            }
            FormAction::Shortcut(_) => {}
            FormAction::Quit => return Ok(Flow::Quit),
        }
    }
}

fn run_password_page(
    terminal: &mut Term,
    ctx: &mut InstallerContext,
    summary: &InstallSummary,
    shake: &mut bool,
) -> Result<Flow> {
    let controls = password_controls();
    let info = plain_lines(&[
        "Installing needs administrator rights. Commands run through sudo,",
        "so enter the password of your own account.",
    ]);
    let action = run_text_input(
        terminal,
        Page::RootPassword.title(),
        &controls,
        &info,
        "Password",
        true,
        *shake,
        ctx.page_message.as_ref(),
        summary,
    )?;
    *shake = false;
    let password = match action {
        InputAction::Submit(password) => password,
        InputAction::Back => return Ok(Flow::Nav(NavAction::Back)),
        InputAction::Quit => return Ok(Flow::Quit),
    };
    if password.is_empty() {
        ctx.set_error("Enter the password");
        return Ok(Flow::Stay);
    }

    ctx.set_notice("Checking password...");
    render_text_input(
        terminal,
        Page::RootPassword.title(),
        &controls,
        &info,
        "Password",
        &password,
        true,
        ctx.page_message.as_ref(),
        summary,
    )?;
    match validate_password(&password) {
        Ok(()) => {
            ctx.credentials.password = password;
            ctx.credentials.failed_attempts = 0;
            Ok(Flow::Nav(NavAction::Next))
        }
        Err(PrivilegedError::PasswordRejected) => {
            let wording = ctx.credentials.record_rejection();
            ctx.set_error(wording);
            *shake = true;
            Ok(Flow::Stay)
        }
        Err(err) => {
            ctx.set_error(err.to_string());
            Ok(Flow::Stay)
        }
    }
}

fn run_dependency_page(
    terminal: &mut Term,
    ctx: &mut InstallerContext,
    summary: &InstallSummary,
) -> Result<Flow> {
    let action = run_dependencies(
        terminal,
        &ctx.dependencies,
        ctx.page_message.as_ref(),
        summary,
    )?;
    match action {
        DependencyAction::Install => {
            let plan = ctx.dependencies.plan.clone();
            let password = ctx.credentials.password.clone();
            let step_names = plan_step_names(&plan);
            let outcome = run_progress(terminal, "Installing dependencies", step_names, move |tx| {
                run_dependency_install(tx, &plan, &password)
            })?;
            let flow = after_run(ctx, outcome);
            if matches!(flow, Flow::Stay) {
                // Re-probe so the page shows what the run changed
                let message = ctx.page_message.take();
                go_to_page(ctx, Page::Dependencies);
                ctx.page_message = message;
            }
            Ok(flow)
        }
        DependencyAction::ToggleForce => {
            let jobs = ctx.jobs();
            ctx.dependencies.toggle_force(&ctx.environment, jobs);
            Ok(Flow::Stay)
        }
        DependencyAction::ViewCommands => Ok(Flow::Nav(NavAction::ViewCommands)),
        DependencyAction::Next => Ok(Flow::Nav(NavAction::Next)),
        DependencyAction::Back => Ok(Flow::Nav(NavAction::Back)),
        DependencyAction::Quit => Ok(Flow::Quit),
    }
}

fn run_final_install_page(
    terminal: &mut Term,
    ctx: &mut InstallerContext,
    summary: &InstallSummary,
) -> Result<Flow> {
    let text = plain_lines(&FFMPEG_NOTE);
    let action = run_message(
        terminal,
        Page::FfmpegNote.title(),
        &text,
        true,
        true,
        ctx.page_message.as_ref(),
        summary,
    )?;
    match action {
        MessageAction::Next => {}
        other => return Ok(message_flow(other)),
    }
    let (Some(distribution), Some(script_dir)) = (
        ctx.environment.distribution.clone(),
        ctx.environment.script_dir.clone(),
    ) else {
        ctx.fatal = Some("Environment detection did not finish".to_string());
        return Ok(Flow::Nav(NavAction::Fail));
    };
    let config = InstallConfig {
        settings: ctx.settings.clone(),
        distribution,
        password: ctx.credentials.password.clone(),
        script_dir,
    };
    let step_names: Vec<String> = STEP_NAMES.iter().map(|name| (*name).to_string()).collect();
    let outcome = run_progress(terminal, "Installing", step_names, move |tx| {
        run_installer(tx, &config)
    })?;
    match outcome {
        RunOutcome::Succeeded => Ok(Flow::Nav(NavAction::Next)),
        other => Ok(after_run(ctx, other)),
    }
}

// Maps a finished run onto page state; a rejected password leads back to the password page
fn after_run(ctx: &mut InstallerContext, outcome: RunOutcome) -> Flow {
    match outcome {
        RunOutcome::Succeeded => {
            ctx.set_notice("Finished");
            Flow::Stay
        }
        RunOutcome::Failed(err) => {
            ctx.set_error(format!("{err} (see {LOG_FILE_PATH})"));
            Flow::Stay
        }
        RunOutcome::PasswordRejected => Flow::Rewind {
            to: Page::RootPassword,
            error: ctx.credentials.record_rejection().to_string(),
        },
        RunOutcome::Quit => Flow::Quit,
    }
}

// Follows Back transitions from `from` until `to` is reached
fn rewind(from: Page, to: Page) -> Page {
    let mut page = from;
    for _ in 0..Page::ALL.len() {
        if page == to {
            break;
        }
        match transition(page, NavAction::Back) {
            Some(prev) => page = prev,
            None => break,
        }
    }
    page
}

// Runs a job on a worker thread and shows its progress until the user acknowledges the result
fn run_progress<F>(
    terminal: &mut Term,
    title: &str,
    step_names: Vec<String>,
    job: F,
) -> Result<RunOutcome>
where
    F: FnOnce(crossbeam_channel::Sender<InstallerEvent>) -> Result<()> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let worker_tx = tx.clone();
    thread::spawn(move || {
        if let Err(err) = job(worker_tx) {
            let _ = tx.send(InstallerEvent::Done(Some(err.to_string())));
        }
    });

    let mut app = App::new(title, &step_names, open_log_file());
    push_log(&mut app.logs, format!("{title}..."));
    if app.log_file.is_some() {
        let line = format!("Logging to {}", LOG_FILE_PATH);
        push_log(&mut app.logs, line.clone());
        append_log_file(&mut app.log_file, &line);
    }

    terminal.clear().context("clear terminal")?;
    let mut last_tick = Instant::now();
    let mut warned = false;
    loop {
        terminal.draw(|f| draw_ui(f.size(), f, &app))?;

        let timeout = Duration::from_millis(100);
        if event::poll(timeout).context("poll events")? {
            if let Event::Key(key) = event::read().context("read event")? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q')
                            if key.modifiers.contains(KeyModifiers::CONTROL) =>
                        {
                            if app.done {
                                return Ok(RunOutcome::Quit);
                            }
                            // Running commands cannot be cancelled
                            if !warned {
                                push_log(
                                    &mut app.logs,
                                    "Commands are still running, wait for them to finish."
                                        .to_string(),
                                );
                                warned = true;
                            }
                        }
                        KeyCode::Enter if app.done => break,
                        _ => {}
                    }
                }
            }
        }

        while let Ok(evt) = rx.try_recv() {
            handle_event(&mut app, evt);
        }

        // Update the spinner animation
        if last_tick.elapsed() >= Duration::from_millis(120) {
            app.spinner_idx = (app.spinner_idx + 1) % SPINNER_LEN;
            last_tick = Instant::now();
        }
    }

    terminal.clear().context("clear terminal")?;
    Ok(if app.password_rejected {
        RunOutcome::PasswordRejected
    } else if app.succeeded() {
        RunOutcome::Succeeded
    } else {
        RunOutcome::Failed(app.err.clone().unwrap_or_default())
    })
}

fn plain_lines(text: &[&str]) -> Vec<Line<'static>> {
    text.iter().map(|line| Line::from(line.to_string())).collect()
}

fn password_controls() -> Vec<Line<'static>> {
    vec![
        Line::from(vec![
            Span::styled("Enter", Style::default().fg(Color::Cyan)),
            Span::raw(" to check the password, "),
            Span::styled("Ctrl+U", Style::default().fg(Color::Cyan)),
            Span::raw(" to clear"),
        ]),
        Line::from(vec![
            Span::styled("Esc", Style::default().fg(Color::Cyan)),
            Span::raw(" to go back"),
        ]),
    ]
}

fn intro_lines(ctx: &InstallerContext) -> Vec<Line<'static>> {
    let distribution = ctx
        .environment
        .distribution
        .as_ref()
        .map(|d| d.label())
        .unwrap_or_else(|| "unknown".to_string());
    let mut lines = plain_lines(&[
        "This installer sets up the Loudness Correction server.",
        "",
        "It asks for the hotfolder location, processing options, email alerts,",
        "reporting and sharing, then installs the programs the server needs",
        "and writes its configuration, init script and scripts.",
        "",
    ]);
    lines.push(Line::from(vec![
        Span::raw("Detected system: "),
        Span::styled(distribution, Style::default().fg(Color::Blue)),
    ]));
    lines.push(Line::from(vec![
        Span::raw("Settings file: "),
        Span::styled(SETTINGS_PATH, Style::default().fg(Color::Blue)),
    ]));
    lines
}

// Info box for the settings pages
fn form_info(ctx: &InstallerContext, page: Page) -> Vec<Line<'static>> {
    match page {
        Page::Paths => {
            let mut lines = plain_lines(&["The server will create these directories:"]);
            lines.extend(
                ctx.directory_preview
                    .iter()
                    .map(|line| Line::from(format!("  {line}"))),
            );
            lines
        }
        Page::Email => {
            let mut lines = plain_lines(&[
                "The server mails the recipients when it detects a problem.",
                "Recipients are separated by commas.",
            ]);
            lines.extend(ctx.email_problems.iter().map(|problem| {
                Line::from(Span::styled(
                    format!("! {problem}"),
                    Style::default().fg(Color::Yellow),
                ))
            }));
            lines
        }
        Page::Report => {
            let mut lines = plain_lines(&[
                "The HTML report shows the processing queue in a web browser.",
                "The heartbeat lets a checker restart a stalled server.",
            ]);
            if let Err(err) = &ctx.environment.ram_devices {
                lines.push(Line::from(Span::styled(
                    format!("Ram disk unavailable: {err}"),
                    Style::default().fg(Color::Yellow),
                )));
            }
            lines
        }
        Page::Samba => plain_lines(&[
            "Samba makes the hotfolder visible to Windows and Mac machines.",
            "The existing samba configuration is replaced.",
        ]),
        _ => Vec::new(),
    }
}

fn completion_lines(ctx: &InstallerContext) -> Vec<Line<'static>> {
    let mut lines = plain_lines(&[
        "The Loudness Correction server is installed.",
        "",
        "It starts automatically at boot. Start it now with:",
        "  sudo service loudness-correction start",
        "",
    ]);
    lines.push(Line::from(format!(
        "Drop files into {} to process them.",
        ctx.settings.hotfolder().display()
    )));
    if ctx.settings.use_samba {
        lines.push(Line::from(format!(
            "The hotfolder is shared as \"{}\".",
            ctx.settings.samba_share_name
        )));
    }
    lines
}

// Maps the current page to the summary sidebar
fn build_summary(ctx: &InstallerContext, page: Page) -> InstallSummary {
    let current_index = match page {
        Page::License | Page::Intro | Page::Paths | Page::Fatal => 0,
        Page::Email => 1,
        Page::Report => 2,
        Page::Samba => 3,
        Page::RootPassword => 4,
        Page::Dependencies | Page::CommandViewer => 5,
        Page::FfmpegNote => 6,
        Page::Completion => 7,
    };
    let settings = &ctx.settings;
    let dependencies = match &ctx.dependencies.report {
        Some(report) if report.all_present() => "ok".to_string(),
        Some(report) => format!("{} missing", report.missing().len()),
        None => "not checked".to_string(),
    };
    InstallSummary {
        current_index,
        entries: vec![
            ("Paths", Some(settings.target_path.clone())),
            (
                "Email",
                Some(if settings.email.enabled { "on" } else { "off" }.to_string()),
            ),
            ("Server user", Some(settings.server_user.clone())),
            (
                "Samba",
                Some(if settings.use_samba {
                    settings.samba_share_name.clone()
                } else {
                    "off".to_string()
                }),
            ),
            (
                "Password",
                ctx.credentials.is_set().then(|| "accepted".to_string()),
            ),
            ("Dependencies", Some(dependencies)),
            ("Install", None),
        ],
    }
}

// Clear the terminal screen
fn clear_screen() -> Result<()> {
    execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0)).context("clear screen")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::InstallerSettings;

    fn context() -> InstallerContext {
        let environment = Environment {
            distribution: None,
            ram_devices: Err("no ram disks".to_string()),
            users: Ok(vec!["audio".to_string()]),
            search_path: Vec::new(),
            script_dir: None,
        };
        InstallerContext::new(InstallerSettings::default(), environment)
    }

    #[test]
    fn rewind_walks_back_to_password_page() {
        assert_eq!(rewind(Page::FfmpegNote, Page::RootPassword), Page::RootPassword);
        assert_eq!(rewind(Page::Dependencies, Page::RootPassword), Page::RootPassword);
        assert_eq!(rewind(Page::RootPassword, Page::RootPassword), Page::RootPassword);
    }

    #[test]
    fn rewind_stops_at_first_page() {
        assert_eq!(rewind(Page::Paths, Page::FfmpegNote), Page::License);
    }

    #[test]
    fn summary_tracks_current_page() {
        let ctx = context();
        assert_eq!(build_summary(&ctx, Page::Email).current_index, 1);
        assert_eq!(build_summary(&ctx, Page::CommandViewer).current_index, 5);
        let summary = build_summary(&ctx, Page::Completion);
        assert_eq!(summary.current_index, summary.entries.len());
    }

    #[test]
    fn summary_reports_unchecked_dependencies() {
        let ctx = context();
        let summary = build_summary(&ctx, Page::Paths);
        let (_, deps) = summary
            .entries
            .iter()
            .find(|(label, _)| *label == "Dependencies")
            .expect("dependencies entry");
        assert_eq!(deps.as_deref(), Some("not checked"));
        let (_, password) = &summary.entries[4];
        assert!(password.is_none());
    }

    #[test]
    fn rejected_run_rewinds_with_message() {
        let mut ctx = context();
        ctx.credentials.password = "secret".to_string();
        match after_run(&mut ctx, RunOutcome::PasswordRejected) {
            Flow::Rewind { to, error } => {
                assert_eq!(to, Page::RootPassword);
                assert!(!error.is_empty());
            }
            _ => panic!("expected a rewind"),
        }
        assert!(!ctx.credentials.is_set());
    }
}
