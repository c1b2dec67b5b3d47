//! CLI interface for keiba-ingest
//!
//! Provides subcommands for:
//! - `run`: Poll the record source until interrupted
//! - `once`: Run a single cycle and print its report
//! - `decode`: Decode a replay file and print records as JSON lines
//! - `keys`: Print the realtime request keys for a date
//! - `config`: Show the effective configuration

mod decode;
mod keys;
mod once;
mod run;

pub use decode::DecodeArgs;
pub use keys::KeysArgs;
pub use once::OnceArgs;
pub use run::RunArgs;

use crate::config::{Config, StorageBackend};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "keiba-ingest")]
#[command(about = "Horse-racing odds ingestion with temporal features and deduplicated uploads")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the record source until Ctrl-C
    Run(RunArgs),
    /// Run a single cycle
    Once(OnceArgs),
    /// Decode a replay file
    Decode(DecodeArgs),
    /// Print realtime request keys
    Keys(KeysArgs),
    /// Show configuration
    Config,
}

/// Flags shared by the commands that run cycles
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SourceOverrides {
    /// Replay this file instead of the configured source
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Keep uploads in memory instead of writing them
    #[arg(long)]
    pub dry_run: bool,
}

impl SourceOverrides {
    pub fn apply(&self, config: &Config) -> Config {
        let mut config = config.clone();
        if let Some(replay) = &self.replay {
            config.source.replay_path = Some(replay.clone());
        }
        if self.dry_run {
            config.storage.backend = StorageBackend::Memory;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_once_with_overrides() {
        let cli = Cli::try_parse_from([
            "keiba-ingest",
            "--config",
            "custom.toml",
            "once",
            "--replay",
            "today.txt",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.config, "custom.toml");
        let Commands::Once(args) = cli.command else {
            panic!("expected once");
        };
        let config = args.overrides.apply(&Config::default());
        assert_eq!(config.source.replay_path, Some(PathBuf::from("today.txt")));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_parse_keys() {
        let cli = Cli::try_parse_from(["keiba-ingest", "keys", "--date", "2024-06-15"]).unwrap();
        assert!(matches!(cli.command, Commands::Keys(_)));
    }

    #[test]
    fn test_config_default_path() {
        let cli = Cli::try_parse_from(["keiba-ingest", "config"]).unwrap();
        assert_eq!(cli.config, "config.toml");
    }
}
