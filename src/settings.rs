/////////
/// Persisted installer settings
////////
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::log_debug;
use crate::probe::version_at_least;

pub const SETTINGS_PATH: &str = "/etc/loudness-correction/settings.toml";
pub const SETTINGS_VERSION: &str = "3.3";
// Files written by older installers are not trusted
pub const MIN_COMPATIBLE_VERSION: &str = "3.0";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("settings file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    English,
    Finnish,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Finnish];

    pub fn label(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Finnish => "Finnish",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeakMeasurement {
    SamplePeak,
    TruePeak,
}

impl PeakMeasurement {
    pub const ALL: [PeakMeasurement; 2] = [PeakMeasurement::TruePeak, PeakMeasurement::SamplePeak];

    pub fn label(self) -> &'static str {
        match self {
            PeakMeasurement::SamplePeak => "Sample peak",
            PeakMeasurement::TruePeak => "True peak",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub enabled: bool,
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub use_authentication: bool,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub interval_hours: u32,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            server: String::new(),
            port: 587,
            use_tls: true,
            use_authentication: true,
            username: String::new(),
            password: String::new(),
            sender: String::new(),
            recipients: Vec::new(),
            subject: "Loudness Correction error message".to_string(),
            interval_hours: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    pub version: String,
    pub target_path: String,
    pub language: Language,
    pub cpu_cores: u32,
    pub file_expiry_time: u64,
    pub write_html_report: bool,
    pub html_report_interval: u64,
    pub heartbeat: bool,
    pub heartbeat_interval: u64,
    pub use_ramdisk: bool,
    pub ramdisk_device: String,
    pub server_user: String,
    pub peak_measurement: PeakMeasurement,
    pub use_samba: bool,
    pub samba_share_name: String,
    pub email: EmailSettings,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION.to_string(),
            target_path: "/LoudnessCorrection".to_string(),
            language: Language::English,
            cpu_cores: crate::probe::detect_cpu_cores(),
            file_expiry_time: 28800,
            write_html_report: true,
            html_report_interval: 5,
            heartbeat: true,
            heartbeat_interval: 30,
            use_ramdisk: false,
            ramdisk_device: "/dev/ram1".to_string(),
            server_user: String::new(),
            peak_measurement: PeakMeasurement::TruePeak,
            use_samba: true,
            samba_share_name: "LoudnessCorrection".to_string(),
            email: EmailSettings::default(),
        }
    }
}

impl InstallerSettings {
    pub fn hotfolder(&self) -> PathBuf {
        PathBuf::from(&self.target_path)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.hotfolder().join("00-Loudness_Calculation_Results")
    }

    pub fn corrected_dir(&self) -> PathBuf {
        self.hotfolder().join("00-Corrected_Files")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.hotfolder().join("00-Loudness_Calculation_Temporary_Files")
    }

    pub fn web_page_dir(&self) -> PathBuf {
        self.hotfolder().join("00-Calculation_Queue_Information")
    }

    pub fn heartbeat_dir(&self) -> PathBuf {
        self.hotfolder().join("00-HeartBeat")
    }

    // Every directory the server expects, hotfolder first
    pub fn server_directories(&self) -> Vec<PathBuf> {
        let mut dirs = vec![
            self.hotfolder(),
            self.results_dir(),
            self.corrected_dir(),
            self.temp_dir(),
        ];
        if self.write_html_report {
            dirs.push(self.web_page_dir());
        }
        if self.heartbeat {
            dirs.push(self.heartbeat_dir());
        }
        dirs
    }

    // Lines shown on the paths page
    pub fn directory_preview(&self) -> Vec<String> {
        vec![
            format!("Hotfolder: {}", self.hotfolder().display()),
            format!("Results: {}", self.results_dir().display()),
            format!("Corrected files: {}", self.corrected_dir().display()),
            format!("Temporary files: {}", self.temp_dir().display()),
        ]
    }
}

// Reads the settings file, falling back to defaults when it is absent or unreadable
pub fn load_settings(path: &Path) -> Result<InstallerSettings, SettingsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log_debug(&format!("No settings at {}, using defaults", path.display()));
            return Ok(InstallerSettings::default());
        }
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            log_debug(&format!(
                "Settings at {} are not readable, using defaults",
                path.display()
            ));
            return Ok(InstallerSettings::default());
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_settings(&raw)
}

// Overlays a stored settings document onto the defaults
pub fn parse_settings(raw: &str) -> Result<InstallerSettings, SettingsError> {
    let loaded: toml::Table = toml::from_str(raw)?;
    let defaults = InstallerSettings::default();

    let stored_version = loaded.get("version").and_then(|value| value.as_str());
    match stored_version {
        Some(version) if version_at_least(version, MIN_COMPATIBLE_VERSION) => {}
        other => {
            log_debug(&format!(
                "Ignoring stored settings (version {:?}, minimum {})",
                other, MIN_COMPATIBLE_VERSION
            ));
            return Ok(defaults);
        }
    }

    let toml::Value::Table(mut merged) = toml::Value::try_from(&defaults)? else {
        return Ok(defaults);
    };
    let keys: Vec<String> = merged.keys().cloned().collect();
    for key in keys {
        let Some(stored) = loaded.get(&key) else {
            continue;
        };
        match (merged.get(&key).cloned(), stored) {
            (Some(toml::Value::Table(default_table)), toml::Value::Table(stored_table)) => {
                for sub_key in default_table.keys() {
                    let Some(stored_value) = stored_table.get(sub_key) else {
                        continue;
                    };
                    let mut candidate = merged.clone();
                    if let Some(toml::Value::Table(table)) = candidate.get_mut(&key) {
                        table.insert(sub_key.clone(), stored_value.clone());
                    }
                    if deserializes(&candidate) {
                        merged = candidate;
                    } else {
                        log_debug(&format!("Skipping stored setting {key}.{sub_key}"));
                    }
                }
            }
            _ => {
                let mut candidate = merged.clone();
                candidate.insert(key.clone(), stored.clone());
                if deserializes(&candidate) {
                    merged = candidate;
                } else {
                    log_debug(&format!("Skipping stored setting {key}"));
                }
            }
        }
    }

    Ok(toml::Value::Table(merged).try_into()?)
}

fn deserializes(table: &toml::Table) -> bool {
    toml::Value::Table(table.clone())
        .try_into::<InstallerSettings>()
        .is_ok()
}

// Serializes settings stamped with the current producer version
pub fn render_settings(settings: &InstallerSettings) -> Result<String, SettingsError> {
    let mut stamped = settings.clone();
    stamped.version = SETTINGS_VERSION.to_string();
    Ok(toml::to_string_pretty(&stamped)?)
}
