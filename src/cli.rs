use clap::Parser;

use crate::probe::Distribution;

#[derive(Parser, Debug)]
#[command(name = "lcs-installer")]
#[command(about = "Installer for the Loudness Correction server")]
#[command(version)]
pub struct Cli {
    /// Skip distribution detection and assume NAME VERSION (e.g. ubuntu 14.04)
    #[arg(long, num_args = 2, value_names = ["NAME", "VERSION"])]
    pub force_distribution: Option<Vec<String>>,

    /// Write probe and navigation details to the log file
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn forced_distribution(&self) -> Option<Distribution> {
        match self.force_distribution.as_deref() {
            Some([name, version]) => Some(Distribution {
                name: name.to_ascii_lowercase(),
                version: version.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments() {
        let cli = Cli::try_parse_from(["lcs-installer"]).unwrap();
        assert!(!cli.debug);
        assert_eq!(cli.forced_distribution(), None);
    }

    #[test]
    fn forced_distribution_takes_two_values() {
        let cli = Cli::try_parse_from([
            "lcs-installer",
            "--force-distribution",
            "Ubuntu",
            "16.04",
            "--debug",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(
            cli.forced_distribution(),
            Some(Distribution {
                name: "ubuntu".to_string(),
                version: "16.04".to_string(),
            })
        );
    }

    #[test]
    fn forced_distribution_needs_a_version() {
        assert!(Cli::try_parse_from(["lcs-installer", "--force-distribution", "debian"]).is_err());
    }
}
