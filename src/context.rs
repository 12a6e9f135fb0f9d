/////////
/// Wizard state shared across pages
////////
use std::path::PathBuf;

use crate::config::config;
use crate::plan::{build_plan, CommandPlan};
use crate::probe::{probe_dependencies, DependencyReport, Distribution};
use crate::settings::InstallerSettings;

// Facts gathered about the machine at startup
pub struct Environment {
    pub distribution: Option<Distribution>,
    pub ram_devices: Result<Vec<String>, String>,
    pub users: Result<Vec<String>, String>,
    pub search_path: Vec<PathBuf>,
    pub script_dir: Option<PathBuf>,
}

#[derive(Default)]
pub struct DependencyState {
    pub report: Option<DependencyReport>,
    pub force_reinstall: bool,
    pub plan: CommandPlan,
}

impl DependencyState {
    // Re-probes every program and rebuilds the plan
    pub fn refresh(&mut self, environment: &Environment, jobs: u32) {
        self.report = Some(probe_dependencies(&environment.search_path));
        self.rebuild_plan(environment, jobs);
    }

    pub fn rebuild_plan(&mut self, environment: &Environment, jobs: u32) {
        self.plan = match (&self.report, &environment.distribution) {
            (Some(report), Some(distribution)) => {
                build_plan(report, distribution, config(), self.force_reinstall, jobs)
            }
            _ => CommandPlan::default(),
        };
    }

    pub fn toggle_force(&mut self, environment: &Environment, jobs: u32) {
        self.force_reinstall = !self.force_reinstall;
        self.rebuild_plan(environment, jobs);
    }

    pub fn install_enabled(&self) -> bool {
        !self.plan.is_empty()
    }

    pub fn next_enabled(&self) -> bool {
        self.report
            .as_ref()
            .map(DependencyReport::all_present)
            .unwrap_or(false)
    }
}

const REJECTION_MESSAGES: [&str; 2] = [
    "Password was not accepted, try again",
    "Password was still not accepted, please check it",
];

#[derive(Default)]
pub struct Credentials {
    pub password: String,
    pub failed_attempts: u32,
}

impl Credentials {
    // Forgets the password and returns the wording for this attempt
    pub fn record_rejection(&mut self) -> &'static str {
        self.password.clear();
        self.failed_attempts += 1;
        REJECTION_MESSAGES[(self.failed_attempts as usize + 1) % REJECTION_MESSAGES.len()]
    }

    pub fn is_set(&self) -> bool {
        !self.password.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageMessage {
    Error(String),
    Notice(String),
}

pub struct InstallerContext {
    pub settings: InstallerSettings,
    pub environment: Environment,
    pub dependencies: DependencyState,
    pub credentials: Credentials,
    pub page_message: Option<PageMessage>,
    pub email_problems: Vec<String>,
    pub directory_preview: Vec<String>,
    pub fatal: Option<String>,
}

impl InstallerContext {
    pub fn new(settings: InstallerSettings, environment: Environment) -> Self {
        let directory_preview = settings.directory_preview();
        Self {
            settings,
            environment,
            dependencies: DependencyState::default(),
            credentials: Credentials::default(),
            page_message: None,
            email_problems: Vec::new(),
            directory_preview,
            fatal: None,
        }
    }

    pub fn jobs(&self) -> u32 {
        self.settings.cpu_cores.max(1)
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.page_message = Some(PageMessage::Error(message.into()));
    }

    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.page_message = Some(PageMessage::Notice(message.into()));
    }
}
