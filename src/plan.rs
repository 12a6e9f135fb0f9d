/////////
/// Command plans for reaching a fully provisioned system
////////
use crate::config::Config;
use crate::installer::FailurePolicy;
use crate::probe::{DependencyReport, DependencyStatus, Distribution, Program};

pub const BUILD_ROOT: &str = "/usr/local/src/lcs-build";
pub const LOUDNESS_PATCH: &str = include_str!("../assets/libebur128.patch");

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlannedCommand {
    Run {
        argv: Vec<String>,
        workdir: Option<String>,
        policy: FailurePolicy,
    },
    WriteFile {
        path: String,
        contents: String,
    },
}

impl PlannedCommand {
    fn run(argv: &[&str], workdir: Option<&str>, policy: FailurePolicy) -> Self {
        PlannedCommand::Run {
            argv: argv.iter().map(|arg| (*arg).to_string()).collect(),
            workdir: workdir.map(str::to_string),
            policy,
        }
    }

    // Shell rendering shown in the command viewer
    pub fn display(&self) -> String {
        match self {
            PlannedCommand::Run { argv, workdir, .. } => {
                let cmdline = argv
                    .iter()
                    .map(|arg| shell_quote(arg))
                    .collect::<Vec<_>>()
                    .join(" ");
                match workdir {
                    Some(dir) => format!("cd {} && {}", shell_quote(dir), cmdline),
                    None => cmdline,
                }
            }
            PlannedCommand::WriteFile { path, contents } => {
                format!("write {} ({} bytes)", path, contents.len())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Packages,
    SoxBuild,
    LoudnessBuild,
}

impl StageKind {
    pub fn label(self) -> &'static str {
        match self {
            StageKind::Packages => "Installing packages",
            StageKind::SoxBuild => "Building sox",
            StageKind::LoudnessBuild => "Building libebur128",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanStage {
    pub kind: StageKind,
    pub commands: Vec<PlannedCommand>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandPlan {
    pub stages: Vec<PlanStage>,
}

impl CommandPlan {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn command_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.commands.len()).sum()
    }

    // Stage headers followed by their commands
    pub fn display_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for stage in &self.stages {
            lines.push(format!("# {}", stage.kind.label()));
            lines.extend(stage.commands.iter().map(PlannedCommand::display));
            lines.push(String::new());
        }
        lines
    }
}

// Builds the ordered stages needed to bring every dependency to a working state
pub fn build_plan(
    report: &DependencyReport,
    distribution: &Distribution,
    cfg: &Config,
    force_reinstall: bool,
    jobs: u32,
) -> CommandPlan {
    // apt cannot replace a sox of the wrong version that is already installed
    let sox_from_repository = cfg
        .sox
        .repository_ok_for(&distribution.name, &distribution.version)
        && !matches!(report.status(Program::Sox), DependencyStatus::WrongVersion(_));
    let needs = |program: Program| force_reinstall || !report.status(program).is_present();
    let build_sox = needs(Program::Sox) && !sox_from_repository;
    let build_loudness = needs(Program::Loudness);

    let mut packages: Vec<String> = Vec::new();
    if !report.status(Program::Gnuplot).is_present() {
        packages.push(cfg.packages.gnuplot.clone());
    }
    if !report.status(Program::Samba).is_present() {
        packages.push(cfg.packages.samba.clone());
    }
    if !report.status(Program::Mediainfo).is_present() {
        packages.push(cfg.packages.mediainfo.clone());
    }
    if needs(Program::Sox) && sox_from_repository {
        packages.push(cfg.packages.sox.clone());
    }
    if build_sox {
        packages.extend(cfg.sox.build_packages.iter().cloned());
    }
    if build_loudness {
        packages.extend(cfg.loudness.build_packages.iter().cloned());
    }
    let packages = dedup_packages(packages);

    let mut stages = Vec::new();
    if !packages.is_empty() {
        let mut install = vec!["apt-get".to_string(), "-y".to_string()];
        if force_reinstall {
            install.push("--reinstall".to_string());
        }
        install.push("install".to_string());
        install.extend(packages);
        stages.push(PlanStage {
            kind: StageKind::Packages,
            commands: vec![
                PlannedCommand::run(&["apt-get", "update"], None, FailurePolicy::KeywordScan),
                PlannedCommand::Run {
                    argv: install,
                    workdir: None,
                    policy: FailurePolicy::KeywordScan,
                },
            ],
        });
    }
    if build_sox {
        stages.push(PlanStage {
            kind: StageKind::SoxBuild,
            commands: sox_build_commands(cfg, jobs),
        });
    }
    if build_loudness {
        stages.push(PlanStage {
            kind: StageKind::LoudnessBuild,
            commands: loudness_build_commands(cfg, jobs),
        });
    }
    CommandPlan { stages }
}

fn checkout_commands(name: &str, repository: &str, commit: &str) -> Vec<PlannedCommand> {
    let source_dir = format!("{BUILD_ROOT}/{name}");
    vec![
        PlannedCommand::run(&["rm", "-rf", &source_dir], None, FailurePolicy::KeywordScan),
        PlannedCommand::run(&["mkdir", "-p", BUILD_ROOT], None, FailurePolicy::KeywordScan),
        PlannedCommand::run(
            &["git", "clone", repository, &source_dir],
            None,
            FailurePolicy::ExitStatus,
        ),
        PlannedCommand::run(
            &["git", "checkout", commit],
            Some(&source_dir),
            FailurePolicy::ExitStatus,
        ),
    ]
}

fn sox_build_commands(cfg: &Config, jobs: u32) -> Vec<PlannedCommand> {
    let source_dir = format!("{BUILD_ROOT}/sox");
    let jobs_arg = format!("-j{}", jobs.max(1));
    let dir = Some(source_dir.as_str());
    let mut commands = checkout_commands("sox", &cfg.sox.repository, &cfg.sox.commit);
    commands.extend([
        PlannedCommand::run(&["autoreconf", "-i"], dir, FailurePolicy::ExitStatus),
        PlannedCommand::run(&["./configure"], dir, FailurePolicy::ExitStatus),
        PlannedCommand::run(&["make", &jobs_arg], dir, FailurePolicy::ExitStatus),
        PlannedCommand::run(&["make", "install"], dir, FailurePolicy::ExitStatus),
        PlannedCommand::run(&["ldconfig"], None, FailurePolicy::KeywordScan),
    ]);
    commands
}

fn loudness_build_commands(cfg: &Config, jobs: u32) -> Vec<PlannedCommand> {
    let source_dir = format!("{BUILD_ROOT}/libebur128");
    let build_dir = format!("{source_dir}/build");
    let patch_path = format!("{BUILD_ROOT}/libebur128.patch");
    let jobs_arg = format!("-j{}", jobs.max(1));
    let mut commands =
        checkout_commands("libebur128", &cfg.loudness.repository, &cfg.loudness.commit);
    commands.extend([
        PlannedCommand::WriteFile {
            path: patch_path.clone(),
            contents: LOUDNESS_PATCH.to_string(),
        },
        PlannedCommand::run(
            &["patch", "-p1", "-i", &patch_path],
            Some(&source_dir),
            FailurePolicy::KeywordScan,
        ),
        PlannedCommand::run(&["mkdir", "-p", &build_dir], None, FailurePolicy::KeywordScan),
        PlannedCommand::run(
            &["cmake", "..", "-DCMAKE_BUILD_TYPE=Release"],
            Some(&build_dir),
            FailurePolicy::ExitStatus,
        ),
        PlannedCommand::run(&["make", &jobs_arg], Some(&build_dir), FailurePolicy::ExitStatus),
        PlannedCommand::run(&["make", "install"], Some(&build_dir), FailurePolicy::ExitStatus),
        PlannedCommand::run(&["ldconfig"], None, FailurePolicy::KeywordScan),
    ]);
    commands
}

// Removes duplicate package names, keeping the first occurrence
fn dedup_packages(packages: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    packages
        .into_iter()
        .filter(|pkg| seen.insert(pkg.clone()))
        .collect()
}

pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_./=:,+@%".contains(ch))
    {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}
