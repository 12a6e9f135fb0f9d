use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub distributions: BTreeMap<String, Vec<String>>,
    pub sox: SoxConfig,
    pub loudness: LoudnessConfig,
    pub packages: PackagesConfig,
    pub scripts: ScriptsConfig,
}

#[derive(Debug, Deserialize)]
pub struct SoxConfig {
    pub minimum_version: String,
    // Entries are "distribution:version"
    #[serde(default)]
    pub repository_ok: Vec<String>,
    pub repository: String,
    pub commit: String,
    pub build_packages: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoudnessConfig {
    pub repository: String,
    pub commit: String,
    pub patch_marker: String,
    pub build_packages: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PackagesConfig {
    pub gnuplot: String,
    pub samba: String,
    pub mediainfo: String,
    pub sox: String,
}

#[derive(Debug, Deserialize)]
pub struct ScriptsConfig {
    pub companion: Vec<String>,
}

impl SoxConfig {
    // Whether the distribution repository ships a usable sox
    pub fn repository_ok_for(&self, name: &str, version: &str) -> bool {
        let key = format!("{name}:{version}");
        self.repository_ok.iter().any(|entry| *entry == key)
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        let raw = include_str!("../config.toml");
        let parsed: Config = toml::from_str(raw).expect("Invalid lcs-installer config.toml");
        validate_config(&parsed).expect("Invalid lcs-installer config.toml");
        parsed
    })
}

// Renders the allow-list as "ubuntu 12.04, 14.04; debian 7, 8"
pub fn supported_distributions_label(distributions: &BTreeMap<String, Vec<String>>) -> String {
    distributions
        .iter()
        .map(|(name, versions)| format!("{} {}", name, versions.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn validate_config(cfg: &Config) -> Result<(), String> {
    if cfg.distributions.is_empty() {
        return Err("distributions must not be empty".to_string());
    }
    for (name, versions) in &cfg.distributions {
        if versions.is_empty() {
            return Err(format!("distributions.{name} must list at least one version"));
        }
    }
    validate_commit("sox.commit", &cfg.sox.commit)?;
    validate_commit("loudness.commit", &cfg.loudness.commit)?;
    if cfg.loudness.patch_marker.trim().is_empty() {
        return Err("loudness.patch_marker must not be empty".to_string());
    }
    if cfg.sox.build_packages.is_empty() {
        return Err("sox.build_packages must not be empty".to_string());
    }
    if cfg.loudness.build_packages.is_empty() {
        return Err("loudness.build_packages must not be empty".to_string());
    }
    if cfg.scripts.companion.is_empty() {
        return Err("scripts.companion must not be empty".to_string());
    }
    for entry in &cfg.sox.repository_ok {
        if !entry.contains(':') {
            return Err(format!("sox.repository_ok entry \"{entry}\" must be name:version"));
        }
    }
    Ok(())
}

fn validate_commit(field: &str, value: &str) -> Result<(), String> {
    if value.len() != 40 || !value.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(format!("{field} must be a full 40 character commit hash"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_is_valid() {
        let cfg = config();
        assert!(cfg.distributions.contains_key("ubuntu"));
        assert!(cfg.distributions["ubuntu"].iter().any(|v| v == "14.04"));
    }

    #[test]
    fn repository_sox_lookup() {
        let sox = &config().sox;
        assert!(sox.repository_ok_for("ubuntu", "14.04"));
        assert!(!sox.repository_ok_for("ubuntu", "12.04"));
    }

    #[test]
    fn short_commit_is_rejected() {
        assert!(validate_commit("x", "abc123").is_err());
    }

    #[test]
    fn supported_label_lists_every_distribution() {
        let label = supported_distributions_label(&config().distributions);
        assert!(label.contains("ubuntu"));
        assert!(label.contains("debian"));
    }
}
