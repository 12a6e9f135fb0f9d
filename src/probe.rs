/////////
/// Read-only checks of the local environment
////////
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{config, supported_distributions_label};
use crate::logging::log_debug;

pub const OS_RELEASE_PATH: &str = "/etc/os-release";
pub const PASSWD_PATH: &str = "/etc/passwd";
pub const DEV_DIR: &str = "/dev";

// Distribution name and version, as found in os-release or forced on the command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Distribution {
    pub name: String,
    pub version: String,
}

impl Distribution {
    pub fn label(&self) -> String {
        format!("{} {}", self.name, self.version)
    }

    // Debian registers init scripts with update-rc.d, Ubuntu gets direct rc symlinks
    pub fn uses_update_rc(&self) -> bool {
        self.name == "debian"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Program {
    Sox,
    Gnuplot,
    Samba,
    Mediainfo,
    Loudness,
}

impl Program {
    pub const ALL: [Program; 5] = [
        Program::Sox,
        Program::Gnuplot,
        Program::Samba,
        Program::Mediainfo,
        Program::Loudness,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Program::Sox => "sox",
            Program::Gnuplot => "gnuplot",
            Program::Samba => "samba",
            Program::Mediainfo => "mediainfo",
            Program::Loudness => "libebur128 (loudness)",
        }
    }

    // Executable looked up on the search path
    pub fn executable(self) -> &'static str {
        match self {
            Program::Sox => "sox",
            Program::Gnuplot => "gnuplot",
            Program::Samba => "smbd",
            Program::Mediainfo => "mediainfo",
            Program::Loudness => "loudness",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DependencyStatus {
    Present,
    WrongVersion(String),
    Absent,
}

impl DependencyStatus {
    pub fn is_present(&self) -> bool {
        matches!(self, DependencyStatus::Present)
    }

    pub fn label(&self) -> String {
        match self {
            DependencyStatus::Present => "installed".to_string(),
            DependencyStatus::WrongVersion(found) => format!("wrong version ({found})"),
            DependencyStatus::Absent => "not installed".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyReport {
    pub statuses: BTreeMap<Program, DependencyStatus>,
}

impl DependencyReport {
    pub fn status(&self, program: Program) -> &DependencyStatus {
        self.statuses
            .get(&program)
            .unwrap_or(&DependencyStatus::Absent)
    }

    pub fn all_present(&self) -> bool {
        Program::ALL
            .iter()
            .all(|program| self.status(*program).is_present())
    }

    pub fn missing(&self) -> Vec<Program> {
        Program::ALL
            .iter()
            .copied()
            .filter(|program| !self.status(*program).is_present())
            .collect()
    }
}

// Splits $PATH into its directories
pub fn search_path() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|value: OsString| std::env::split_paths(&value).collect())
        .unwrap_or_default()
}

// First directory in search order holding an executable file of that name
pub fn find_executable(name: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
    for dir in search_path {
        let candidate = dir.join(name);
        let Ok(metadata) = fs::metadata(&candidate) else {
            continue;
        };
        if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
            return Some(candidate);
        }
    }
    None
}

// Extracts ID and VERSION_ID from an os-release document
pub fn parse_os_release(content: &str) -> Option<Distribution> {
    let mut name = None;
    let mut version = None;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
        match key.trim() {
            "ID" => name = Some(value),
            "VERSION_ID" => version = Some(value),
            _ => {}
        }
    }
    Some(Distribution {
        name: name?,
        version: version?,
    })
}

// Checks a distribution against the allow-list, returning a message on rejection
pub fn check_supported(
    distribution: &Distribution,
    supported: &BTreeMap<String, Vec<String>>,
) -> Result<(), String> {
    let allowed = supported
        .get(&distribution.name)
        .map(|versions| versions.iter().any(|v| *v == distribution.version))
        .unwrap_or(false);
    if allowed {
        Ok(())
    } else {
        Err(format!(
            "{} is not supported. Supported distributions: {}",
            distribution.label(),
            supported_distributions_label(supported)
        ))
    }
}

pub fn probe_os_release(
    path: &Path,
    supported: &BTreeMap<String, Vec<String>>,
) -> Result<Distribution, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("Could not read {}: {}", path.display(), err))?;
    let distribution = parse_os_release(&content).ok_or_else(|| {
        format!(
            "Could not find ID and VERSION_ID in {}. Supported distributions: {}",
            path.display(),
            supported_distributions_label(supported)
        )
    })?;
    check_supported(&distribution, supported)?;
    Ok(distribution)
}

// Parses the vMAJOR.MINOR.PATCH token printed by `sox --version`
pub fn parse_sox_version(output: &str) -> Option<String> {
    output.split_whitespace().find_map(|token| {
        let rest = token.strip_prefix('v')?;
        let parts: Vec<&str> = rest.split('.').collect();
        if parts.len() == 3
            && parts
                .iter()
                .all(|part| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit()))
        {
            Some(rest.to_string())
        } else {
            None
        }
    })
}

fn compare_versions(left: &str, right: &str) -> Ordering {
    let parse = |value: &str| -> Vec<u64> {
        value
            .split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let left = parse(left);
    let right = parse(right);
    let len = left.len().max(right.len());
    for idx in 0..len {
        let a = left.get(idx).copied().unwrap_or(0);
        let b = right.get(idx).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub fn version_at_least(version: &str, minimum: &str) -> bool {
    compare_versions(version, minimum) != Ordering::Less
}

// Combined stdout and stderr of a command, None when it cannot be started
fn command_output(program: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Some(text)
}

pub fn sox_status(output: Option<&str>, minimum: &str) -> DependencyStatus {
    let Some(output) = output else {
        return DependencyStatus::Absent;
    };
    match parse_sox_version(output) {
        Some(version) if version_at_least(&version, minimum) => DependencyStatus::Present,
        Some(version) => DependencyStatus::WrongVersion(version),
        None => DependencyStatus::WrongVersion("unknown".to_string()),
    }
}

pub fn loudness_status(output: Option<&str>, marker: &str) -> DependencyStatus {
    match output {
        None => DependencyStatus::Absent,
        Some(text) if text.contains(marker) => DependencyStatus::Present,
        Some(_) => DependencyStatus::WrongVersion("unpatched".to_string()),
    }
}

// Probes every required program, running version checks where needed
pub fn probe_dependencies(search_path: &[PathBuf]) -> DependencyReport {
    let cfg = config();
    let mut statuses = BTreeMap::new();
    for program in Program::ALL {
        let found = find_executable(program.executable(), search_path);
        let status = match (program, found) {
            (_, None) => DependencyStatus::Absent,
            (Program::Sox, Some(path)) => {
                let output = command_output(&path, &["--version"]);
                sox_status(output.as_deref(), &cfg.sox.minimum_version)
            }
            (Program::Loudness, Some(path)) => {
                let output = command_output(&path, &[]);
                loudness_status(output.as_deref(), &cfg.loudness.patch_marker)
            }
            (_, Some(_)) => DependencyStatus::Present,
        };
        log_debug(&format!("probe {}: {}", program.label(), status.label()));
        statuses.insert(program, status);
    }
    DependencyReport { statuses }
}

// /dev/ram1 .. /dev/ram9 that exist in the device directory
pub fn list_ram_devices(dev_dir: &Path) -> Result<Vec<String>, String> {
    let entries = fs::read_dir(dev_dir)
        .map_err(|err| format!("Could not list {}: {}", dev_dir.display(), err))?;
    let mut indices: Vec<u32> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let index = name.strip_prefix("ram")?.parse::<u32>().ok()?;
            (1..10).contains(&index).then_some(index)
        })
        .collect();
    indices.sort_unstable();
    if indices.is_empty() {
        return Err("No ram disk devices found in /dev".to_string());
    }
    Ok(indices
        .into_iter()
        .map(|index| format!("{}/ram{}", dev_dir.display(), index))
        .collect())
}

// Regular login accounts (UID >= 1000, not nobody) from a passwd document
pub fn parse_normal_users(passwd: &str) -> Vec<String> {
    passwd
        .lines()
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?.trim();
            let _password = fields.next()?;
            let uid = fields.next()?.trim().parse::<u32>().ok()?;
            if uid >= 1000 && name != "nobody" && !name.is_empty() {
                Some(name.to_string())
            } else {
                None
            }
        })
        .collect()
}

pub fn list_normal_users(passwd_path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(passwd_path)
        .map_err(|err| format!("Could not read {}: {}", passwd_path.display(), err))?;
    let users = parse_normal_users(&content);
    if users.is_empty() {
        return Err("No normal user accounts found. Create one before installing.".to_string());
    }
    Ok(users)
}

pub fn detect_cpu_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|count| count.get() as u32)
        .unwrap_or(1)
}

// Looks for the server scripts next to the executable, then in the working directory
pub fn find_companion_scripts(names: &[String]) -> Result<PathBuf, String> {
    let mut candidates = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir);
    }
    if let Ok(dir) = std::env::current_dir() {
        candidates.push(dir);
    }
    locate_scripts(names, &candidates)
}

pub fn locate_scripts(names: &[String], candidates: &[PathBuf]) -> Result<PathBuf, String> {
    for dir in candidates {
        if names.iter().all(|name| dir.join(name).is_file()) {
            return Ok(dir.clone());
        }
    }
    Err(format!(
        "The installer needs {} in the same directory as the installer.",
        names.join(" and ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn make_executable(path: &Path) {
        File::create(path).unwrap();
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    fn supported() -> BTreeMap<String, Vec<String>> {
        let mut map = BTreeMap::new();
        map.insert("ubuntu".to_string(), vec!["14.04".to_string()]);
        map.insert("debian".to_string(), vec!["8".to_string()]);
        map
    }

    #[test]
    fn os_release_ubuntu_is_accepted() {
        let content = "# comment\n\nNAME=\"Ubuntu\"\nID=\"ubuntu\"\nVERSION_ID=\"14.04\"\n";
        let distribution = parse_os_release(content).unwrap();
        assert_eq!(distribution.name, "ubuntu");
        assert_eq!(distribution.version, "14.04");
        assert!(check_supported(&distribution, &supported()).is_ok());
    }

    #[test]
    fn os_release_arch_is_rejected_with_supported_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os-release");
        fs::write(&path, "ID=\"arch\"\nVERSION_ID=\"rolling\"\n").unwrap();
        let err = probe_os_release(&path, &supported()).unwrap_err();
        assert!(!err.is_empty());
        assert!(err.contains("ubuntu 14.04"));
        assert!(err.contains("debian 8"));
    }

    #[test]
    fn os_release_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(probe_os_release(&dir.path().join("nope"), &supported()).is_err());
    }

    #[test]
    fn find_executable_returns_first_match() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        make_executable(&first.path().join("sox"));
        make_executable(&second.path().join("sox"));
        let path = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(find_executable("sox", &path), Some(first.path().join("sox")));
    }

    #[test]
    fn find_executable_skips_non_executable() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        File::create(first.path().join("gnuplot")).unwrap();
        make_executable(&second.path().join("gnuplot"));
        let path = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(
            find_executable("gnuplot", &path),
            Some(second.path().join("gnuplot"))
        );
        assert_eq!(find_executable("mediainfo", &path), None);
    }

    #[test]
    fn sox_version_token() {
        let output = "sox:      SoX v14.4.1\n";
        assert_eq!(parse_sox_version(output).as_deref(), Some("14.4.1"));
        assert_eq!(sox_status(Some(output), "14.4.1"), DependencyStatus::Present);
        assert_eq!(
            sox_status(Some("sox: SoX v14.3.2"), "14.4.1"),
            DependencyStatus::WrongVersion("14.3.2".to_string())
        );
        assert_eq!(sox_status(None, "14.4.1"), DependencyStatus::Absent);
    }

    #[test]
    fn loudness_marker() {
        let marker = "--peak=sample|true|dbtp|all";
        let patched = "Usage: loudness [OPTION...] --peak=sample|true|dbtp|all";
        assert_eq!(loudness_status(Some(patched), marker), DependencyStatus::Present);
        assert!(matches!(
            loudness_status(Some("Usage: loudness"), marker),
            DependencyStatus::WrongVersion(_)
        ));
    }

    #[test]
    fn versions_compare_numerically() {
        assert!(version_at_least("3.10", "3.2"));
        assert!(version_at_least("3.0", "3"));
        assert!(!version_at_least("2.9.9", "3.0"));
    }

    #[test]
    fn ram_devices_exclude_ram0_and_high_indices() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ram0", "ram1", "ram3", "ram12", "random"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let devices = list_ram_devices(dir.path()).unwrap();
        let expected: Vec<String> = ["ram1", "ram3"]
            .iter()
            .map(|name| format!("{}/{}", dir.path().display(), name))
            .collect();
        assert_eq!(devices, expected);
    }

    #[test]
    fn no_ram_devices_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("ram0")).unwrap();
        assert!(list_ram_devices(dir.path()).is_err());
    }

    #[test]
    fn normal_users_filter() {
        let passwd = "root:x:0:0:root:/root:/bin/bash\n\
                      nobody:x:65534:65534:nobody:/nonexistent:/usr/sbin/nologin\n\
                      audio:x:1000:1000::/home/audio:/bin/bash\n\
                      broken-line\n\
                      editor:x:1001:1001::/home/editor:/bin/bash\n";
        assert_eq!(parse_normal_users(passwd), vec!["audio", "editor"]);
    }

    #[test]
    fn companion_scripts_need_every_file() {
        let partial = tempfile::tempdir().unwrap();
        let complete = tempfile::tempdir().unwrap();
        let names = vec!["a.py".to_string(), "b.py".to_string()];
        File::create(partial.path().join("a.py")).unwrap();
        File::create(complete.path().join("a.py")).unwrap();
        File::create(complete.path().join("b.py")).unwrap();
        let found = locate_scripts(
            &names,
            &[partial.path().to_path_buf(), complete.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(found, complete.path());
        assert!(locate_scripts(&names, &[partial.path().to_path_buf()]).is_err());
    }
}
