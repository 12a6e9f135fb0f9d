/////////
/// Provisioning runs
////////
mod commands;
pub mod templates;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::model::{InstallerEvent, StepStatus};
use crate::plan::{CommandPlan, PlannedCommand};
use crate::probe::Distribution;
use crate::settings::{render_settings, InstallerSettings, SETTINGS_PATH};

pub use commands::{
    install_file_as_root, run_as_root, validate_password, FailurePolicy, PrivilegedError,
};
use templates::{
    render_init_script, render_samba_config, INIT_SCRIPT_NAME, INIT_SCRIPT_PATH,
    SAMBA_CONFIG_PATH, SCRIPT_INSTALL_DIR,
};

// Everything the final install needs, collected by the wizard pages
pub struct InstallConfig {
    pub settings: InstallerSettings,
    pub distribution: Distribution,
    pub password: String,
    pub script_dir: PathBuf,
}

// Final installation steps
pub const STEP_NAMES: [&str; 7] = [
    "Creating directories",
    "Copying server scripts",
    "Configuring ram disk",
    "Configuring samba",
    "Writing init script",
    "Registering init script",
    "Saving settings",
];

// Tracks step indices and overall progress for one run
struct StepRunner<'a> {
    tx: &'a crossbeam_channel::Sender<InstallerEvent>,
    total: usize,
}

impl StepRunner<'_> {
    fn run<F>(&self, index: usize, action: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        send_event(
            self.tx,
            InstallerEvent::Step {
                index,
                status: StepStatus::Running,
                err: None,
            },
        );

        if let Err(err) = action() {
            if matches!(
                err.downcast_ref::<PrivilegedError>(),
                Some(PrivilegedError::PasswordRejected)
            ) {
                send_event(self.tx, InstallerEvent::PasswordRejected);
            }
            send_event(
                self.tx,
                InstallerEvent::Step {
                    index,
                    status: StepStatus::Failed,
                    err: Some(err.to_string()),
                },
            );
            return Err(err);
        }

        send_event(
            self.tx,
            InstallerEvent::Step {
                index,
                status: StepStatus::Done,
                err: None,
            },
        );
        self.progress(index);
        Ok(())
    }

    fn skip(&self, index: usize) {
        send_event(
            self.tx,
            InstallerEvent::Step {
                index,
                status: StepStatus::Skipped,
                err: None,
            },
        );
        self.progress(index);
    }

    fn progress(&self, index: usize) {
        let progress = (index as f64 + 1.0) / self.total.max(1) as f64;
        send_event(self.tx, InstallerEvent::Progress(progress));
    }
}

// Step names for a dependency run, one per plan stage
pub fn plan_step_names(plan: &CommandPlan) -> Vec<String> {
    plan.stages
        .iter()
        .map(|stage| stage.kind.label().to_string())
        .collect()
}

// Privileged operations a provisioning run performs
pub trait RootExecutor {
    fn run(
        &self,
        argv: &[&str],
        workdir: Option<&Path>,
        policy: FailurePolicy,
    ) -> Result<(), PrivilegedError>;

    fn install_file(
        &self,
        contents: &str,
        destination: &str,
        mode: &str,
    ) -> Result<(), PrivilegedError>;
}

// Runs everything through sudo with the wizard's password
struct SudoExecutor<'a> {
    tx: &'a crossbeam_channel::Sender<InstallerEvent>,
    password: &'a str,
}

impl RootExecutor for SudoExecutor<'_> {
    fn run(
        &self,
        argv: &[&str],
        workdir: Option<&Path>,
        policy: FailurePolicy,
    ) -> Result<(), PrivilegedError> {
        run_as_root(Some(self.tx), argv, workdir, self.password, policy.detector()).map(|_| ())
    }

    fn install_file(
        &self,
        contents: &str,
        destination: &str,
        mode: &str,
    ) -> Result<(), PrivilegedError> {
        install_file_as_root(Some(self.tx), contents, destination, mode, self.password)
    }
}

fn execute_planned(
    tx: &crossbeam_channel::Sender<InstallerEvent>,
    executor: &dyn RootExecutor,
    command: &PlannedCommand,
) -> Result<(), PrivilegedError> {
    match command {
        PlannedCommand::Run {
            argv,
            workdir,
            policy,
        } => {
            let args: Vec<&str> = argv.iter().map(String::as_str).collect();
            executor.run(&args, workdir.as_deref().map(Path::new), *policy)
        }
        PlannedCommand::WriteFile { path, contents } => {
            send_event(tx, InstallerEvent::Log(format!("Writing {}", path)));
            executor.install_file(contents, path, "644")
        }
    }
}

// Runs each plan stage in order; a failed command stops the run
pub fn run_dependency_install(
    tx: crossbeam_channel::Sender<InstallerEvent>,
    plan: &CommandPlan,
    password: &str,
) -> Result<()> {
    let executor = SudoExecutor { tx: &tx, password };
    install_dependencies(&tx, plan, &executor)
}

fn install_dependencies(
    tx: &crossbeam_channel::Sender<InstallerEvent>,
    plan: &CommandPlan,
    executor: &dyn RootExecutor,
) -> Result<()> {
    let runner = StepRunner {
        tx,
        total: plan.stages.len(),
    };
    for (index, stage) in plan.stages.iter().enumerate() {
        runner.run(index, || {
            send_event(
                tx,
                InstallerEvent::Log(format!("{}...", stage.kind.label())),
            );
            for command in &stage.commands {
                execute_planned(tx, executor, command)?;
            }
            Ok(())
        })?;
    }
    send_event(tx, InstallerEvent::Done(None));
    Ok(())
}

// Writes the server's directories, scripts, system files and settings
pub fn run_installer(
    tx: crossbeam_channel::Sender<InstallerEvent>,
    config: &InstallConfig,
) -> Result<()> {
    let executor = SudoExecutor {
        tx: &tx,
        password: &config.password,
    };
    install_server(&tx, config, &executor)
}

fn install_server(
    tx: &crossbeam_channel::Sender<InstallerEvent>,
    config: &InstallConfig,
    executor: &dyn RootExecutor,
) -> Result<()> {
    let settings = &config.settings;
    let user = settings.server_user.as_str();
    let owner = format!("{user}:{user}");
    let runner = StepRunner {
        tx,
        total: STEP_NAMES.len(),
    };
    let root = |argv: &[&str], policy: FailurePolicy| -> Result<()> {
        executor.run(argv, None, policy)?;
        Ok(())
    };

    // Step 0: Directories under the target path
    runner.run(0, || {
        for dir in settings.server_directories() {
            let dir = dir.to_string_lossy().to_string();
            root(&["mkdir", "-p", &dir], FailurePolicy::KeywordScan)?;
        }
        let target = settings.target_path.as_str();
        root(&["chown", "-R", &owner, target], FailurePolicy::KeywordScan)?;
        root(&["chmod", "-R", "1777", target], FailurePolicy::KeywordScan)?;
        Ok(())
    })?;

    // Step 1: Server scripts
    runner.run(1, || {
        for name in &crate::config::config().scripts.companion {
            let source = config.script_dir.join(name);
            let source = source.to_string_lossy().to_string();
            let destination = format!("{SCRIPT_INSTALL_DIR}/{name}");
            root(
                &["install", "-D", "-m", "755", &source, &destination],
                FailurePolicy::KeywordScan,
            )?;
        }
        Ok(())
    })?;

    // Step 2: Ram disk device check, the init script mounts it
    if settings.use_ramdisk {
        runner.run(2, || {
            if !Path::new(&settings.ramdisk_device).exists() {
                anyhow::bail!("Ram disk device {} not found", settings.ramdisk_device);
            }
            send_event(
                tx,
                InstallerEvent::Log(format!(
                    "{} will be mounted on {} at boot",
                    settings.ramdisk_device,
                    settings.temp_dir().display()
                )),
            );
            Ok(())
        })?;
    } else {
        runner.skip(2);
    }

    // Step 3: Samba share
    if settings.use_samba {
        runner.run(3, || {
            let conf = render_samba_config(
                &settings.samba_share_name,
                &settings.target_path,
                user,
            );
            executor.install_file(&conf, SAMBA_CONFIG_PATH, "644")?;
            let service = if config.distribution.uses_update_rc() {
                "samba"
            } else {
                "smbd"
            };
            root(&["service", service, "restart"], FailurePolicy::ExitStatus)?;
            Ok(())
        })?;
    } else {
        runner.skip(3);
    }

    // Step 4: Init script
    runner.run(4, || {
        let script = render_init_script(settings);
        executor.install_file(&script, INIT_SCRIPT_PATH, "755")?;
        Ok(())
    })?;

    // Step 5: Start at boot, distribution specific
    runner.run(5, || {
        if config.distribution.uses_update_rc() {
            root(
                &["update-rc.d", INIT_SCRIPT_NAME, "defaults"],
                FailurePolicy::ExitStatus,
            )?;
        } else {
            for level in 2..=5 {
                let link = format!("/etc/rc{level}.d/S99{INIT_SCRIPT_NAME}");
                root(
                    &["ln", "-sf", INIT_SCRIPT_PATH, &link],
                    FailurePolicy::KeywordScan,
                )?;
            }
        }
        Ok(())
    })?;

    // Step 6: Settings file, readable by the server user only
    runner.run(6, || {
        let rendered = render_settings(settings).context("render settings")?;
        executor.install_file(&rendered, SETTINGS_PATH, "640")?;
        root(&["chgrp", user, SETTINGS_PATH], FailurePolicy::KeywordScan)?;
        Ok(())
    })?;

    send_event(tx, InstallerEvent::Done(None));
    Ok(())
}

fn send_event(tx: &crossbeam_channel::Sender<InstallerEvent>, evt: InstallerEvent) {
    let _ = tx.try_send(evt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanStage, StageKind};
    use std::cell::RefCell;

    #[test]
    fn step_runner_reports_progress_and_failure() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let runner = StepRunner { tx: &tx, total: 2 };
        runner.run(0, || Ok(())).unwrap();
        let err = runner
            .run(1, || Err(PrivilegedError::PasswordRejected.into()))
            .unwrap_err();
        assert!(err.to_string().contains("password"));

        let events: Vec<InstallerEvent> = rx.try_iter().collect();
        let progress: Vec<f64> = events
            .iter()
            .filter_map(|evt| match evt {
                InstallerEvent::Progress(value) => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0.5]);
        assert!(events
            .iter()
            .any(|evt| matches!(evt, InstallerEvent::PasswordRejected)));
        assert!(events.iter().any(|evt| matches!(
            evt,
            InstallerEvent::Step {
                index: 1,
                status: StepStatus::Failed,
                ..
            }
        )));
    }

    // Records every privileged call and fails the first command containing `fail_on`
    struct RecordingExecutor {
        calls: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingExecutor {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail_on,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl RootExecutor for RecordingExecutor {
        fn run(
            &self,
            argv: &[&str],
            _workdir: Option<&Path>,
            _policy: FailurePolicy,
        ) -> Result<(), PrivilegedError> {
            let command = argv.join(" ");
            self.calls.borrow_mut().push(command.clone());
            match self.fail_on {
                Some(needle) if command.contains(needle) => Err(PrivilegedError::CommandFailed {
                    command,
                    detail: "exit status 2".to_string(),
                }),
                _ => Ok(()),
            }
        }

        fn install_file(
            &self,
            _contents: &str,
            destination: &str,
            mode: &str,
        ) -> Result<(), PrivilegedError> {
            self.calls
                .borrow_mut()
                .push(format!("write {destination} {mode}"));
            Ok(())
        }
    }

    fn command(argv: &[&str]) -> PlannedCommand {
        PlannedCommand::Run {
            argv: argv.iter().map(|arg| (*arg).to_string()).collect(),
            workdir: None,
            policy: FailurePolicy::ExitStatus,
        }
    }

    fn step_statuses(events: &[InstallerEvent], index: usize) -> Vec<StepStatus> {
        events
            .iter()
            .filter_map(|evt| match evt {
                InstallerEvent::Step {
                    index: step, status, ..
                } if *step == index => Some(*status),
                _ => None,
            })
            .collect()
    }

    fn install_config(use_samba: bool) -> InstallConfig {
        let mut settings = InstallerSettings::default();
        settings.server_user = "audio".to_string();
        settings.use_samba = use_samba;
        settings.use_ramdisk = false;
        InstallConfig {
            settings,
            distribution: Distribution {
                name: "ubuntu".to_string(),
                version: "14.04".to_string(),
            },
            password: String::new(),
            script_dir: PathBuf::from("/opt/lcs"),
        }
    }

    #[test]
    fn failed_command_stops_stage_and_later_stages() {
        let plan = CommandPlan {
            stages: vec![
                PlanStage {
                    kind: StageKind::Packages,
                    commands: vec![
                        command(&["apt-get", "update"]),
                        command(&["apt-get", "-y", "install", "gnuplot"]),
                        command(&["ldconfig"]),
                    ],
                },
                PlanStage {
                    kind: StageKind::LoudnessBuild,
                    commands: vec![command(&["make", "install"])],
                },
            ],
        };
        let (tx, rx) = crossbeam_channel::unbounded();
        let executor = RecordingExecutor::new(Some("install gnuplot"));
        let err = install_dependencies(&tx, &plan, &executor).unwrap_err();
        assert!(err.to_string().contains("install gnuplot"));
        assert_eq!(
            executor.calls(),
            vec!["apt-get update", "apt-get -y install gnuplot"]
        );

        let events: Vec<InstallerEvent> = rx.try_iter().collect();
        assert_eq!(
            step_statuses(&events, 0),
            vec![StepStatus::Running, StepStatus::Failed]
        );
        assert!(step_statuses(&events, 1).is_empty());
        assert!(!events.iter().any(|evt| matches!(evt, InstallerEvent::Done(_))));
    }

    #[test]
    fn dependency_run_finishes_every_stage() {
        let plan = CommandPlan {
            stages: vec![PlanStage {
                kind: StageKind::SoxBuild,
                commands: vec![command(&["make"]), command(&["make", "install"])],
            }],
        };
        let (tx, rx) = crossbeam_channel::unbounded();
        let executor = RecordingExecutor::new(None);
        install_dependencies(&tx, &plan, &executor).unwrap();
        assert_eq!(executor.calls(), vec!["make", "make install"]);
        let events: Vec<InstallerEvent> = rx.try_iter().collect();
        assert!(matches!(events.last(), Some(InstallerEvent::Done(None))));
    }

    #[test]
    fn disabled_samba_and_ram_disk_are_skipped() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let executor = RecordingExecutor::new(None);
        install_server(&tx, &install_config(false), &executor).unwrap();

        let calls = executor.calls();
        assert!(!calls.iter().any(|call| call.contains(SAMBA_CONFIG_PATH)));
        assert!(!calls.iter().any(|call| call.starts_with("service")));
        assert!(calls.contains(&format!("write {INIT_SCRIPT_PATH} 755")));
        assert!(calls.contains(&format!("write {SETTINGS_PATH} 640")));
        assert!(calls.contains(&format!("chgrp audio {SETTINGS_PATH}")));

        let events: Vec<InstallerEvent> = rx.try_iter().collect();
        assert_eq!(step_statuses(&events, 2), vec![StepStatus::Skipped]);
        assert_eq!(step_statuses(&events, 3), vec![StepStatus::Skipped]);
        assert_eq!(
            step_statuses(&events, 6),
            vec![StepStatus::Running, StepStatus::Done]
        );
    }

    #[test]
    fn enabled_samba_writes_config_and_restarts() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let executor = RecordingExecutor::new(None);
        install_server(&tx, &install_config(true), &executor).unwrap();

        let calls = executor.calls();
        let write = calls
            .iter()
            .position(|call| *call == format!("write {SAMBA_CONFIG_PATH} 644"))
            .unwrap();
        assert_eq!(calls[write + 1], "service smbd restart");
        let events: Vec<InstallerEvent> = rx.try_iter().collect();
        assert_eq!(
            step_statuses(&events, 3),
            vec![StepStatus::Running, StepStatus::Done]
        );
    }

    #[test]
    fn failed_final_step_stops_the_run() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let executor = RecordingExecutor::new(Some("chmod -R 1777"));
        assert!(install_server(&tx, &install_config(true), &executor).is_err());
        assert!(!executor
            .calls()
            .iter()
            .any(|call| call.starts_with("install -D")));
        let events: Vec<InstallerEvent> = rx.try_iter().collect();
        assert!(step_statuses(&events, 1).is_empty());
    }

    #[test]
    fn skipped_step_still_advances_progress() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let runner = StepRunner { tx: &tx, total: 4 };
        runner.skip(1);
        let events: Vec<InstallerEvent> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|evt| matches!(evt, InstallerEvent::Progress(value) if *value == 0.5)));
    }
}
