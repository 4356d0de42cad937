//! Command-line interface definition for Seizmeia
//!
//! The server takes no subcommands; flags only override configuration.

use clap::Parser;

use crate::buildinfo::BuildInfo;

/// Seizmeia: A credit management tool for a beer tap
#[derive(Parser, Debug, Clone)]
#[command(name = "seizmeia")]
#[command(about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "SEIZMEIA_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Address to listen on, overriding `server.listen`
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Print version information and exit
    #[arg(short = 'V', long)]
    pub version: bool,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The `--version` banner: name, version, commit and build date.
    pub fn version_string(info: &BuildInfo) -> String {
        format!(
            "{} version {} ({}) built on {}",
            crate::buildinfo::FRIENDLY_NAME,
            info.version,
            info.commit_hash,
            info.build_date
        )
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: None,
            verbose: false,
            listen: None,
            version: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
        assert!(cli.listen.is_none());
        assert!(!cli.version);
    }

    #[test]
    fn test_cli_parse_without_arguments() {
        let cli = Cli::try_parse_from(["seizmeia"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.listen.is_none());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::try_parse_from(["seizmeia", "--config", "/etc/tap.yaml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/etc/tap.yaml"));
    }

    #[test]
    fn test_cli_parse_short_flags() {
        let cli = Cli::try_parse_from(["seizmeia", "-v", "-l", "127.0.0.1:9000"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.listen.as_deref(), Some("127.0.0.1:9000"));
    }

    #[test]
    fn test_cli_parse_version() {
        let cli = Cli::try_parse_from(["seizmeia", "--version"]).unwrap();
        assert!(cli.version);
    }

    #[test]
    fn test_cli_rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["seizmeia", "--provider", "x"]).is_err());
    }

    #[test]
    fn test_version_string() {
        let info = BuildInfo {
            version: "1.2.3".to_string(),
            commit_hash: "abc123".to_string(),
            build_date: "2024-01-01".to_string(),
            ..BuildInfo::current()
        };
        assert_eq!(
            Cli::version_string(&info),
            "Seizmeia: A credit management tool for a beer tap version 1.2.3 (abc123) built on 2024-01-01"
        );
    }
}
