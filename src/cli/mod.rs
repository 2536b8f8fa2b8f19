//! Command-line interface for reelshelf.
//!
//! Every administrator action on a catalog installation is a subcommand of
//! the `reelshelf` binary. Each command lives in its own module with its own
//! argument struct and an `execute` method.
//!
//! # Available Commands
//!
//! - `init` - Initialize an installation (one-shot, guarded by `.install.lock`)
//! - `upgrade` - Check for, or install, a newer release
//! - `backup` - Create, list, delete and restore snapshots
//! - `migrate` - Apply a pending `update.sql`
//! - `settings` - Inspect or edit the settings table
//!
//! # Global Options
//!
//! - `--verbose` - Enable debug output
//! - `--quiet` - Suppress all output except errors
//! - `--no-progress` - Disable spinners
//! - `--config` - Path to `reelshelf.toml`
//!
//! # Example
//!
//! ```bash
//! reelshelf init --root /var/www/reelshelf --version 1.4.7
//! reelshelf --config /var/www/reelshelf/reelshelf.toml upgrade --check
//! reelshelf upgrade --from ~/Downloads/reelshelf-v1.4.8.zip --yes
//! ```

mod backup;
pub mod common;
mod init;
mod migrate;
mod settings;
mod upgrade;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::constants::{CONFIG_ENV_VAR, NO_PROGRESS_ENV_VAR};

/// Runtime configuration derived from the global flags.
///
/// Built once by [`Cli::build_config`] and applied before the command runs,
/// so commands read their environment instead of threading flags around.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter directive; `None` keeps only errors.
    pub log_level: Option<String>,

    /// Whether spinners are disabled.
    pub no_progress: bool,

    /// Explicit configuration file.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Export the flags as process environment variables.
    pub fn apply_to_env(&self) {
        // SAFETY: called once from the main task before any command spawns
        // work that reads the environment.
        if self.no_progress {
            unsafe { std::env::set_var(NO_PROGRESS_ENV_VAR, "1") };
        }

        if let Some(ref path) = self.config_path {
            unsafe { std::env::set_var(CONFIG_ENV_VAR, path) };
        }
    }

    /// Install the global tracing subscriber.
    ///
    /// `RUST_LOG` wins over the flags when set. Repeated calls are ignored.
    pub fn init_logging(&self) {
        let directive = self.log_level.as_deref().unwrap_or("error");
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("warn,reelshelf_cli={directive}")));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[derive(Parser)]
#[command(
    name = "reelshelf",
    about = "Maintenance tool for a reelshelf movie catalog installation",
    version,
    long_about = "reelshelf keeps a catalog installation up to date: it discovers releases on GitHub or from an uploaded file, snapshots the installation, extracts the release and applies its database migration."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to reelshelf.toml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable spinners
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new installation
    Init(init::InitCommand),

    /// Check for and install a newer release
    Upgrade(upgrade::UpgradeCommand),

    /// Manage backup snapshots
    Backup(backup::BackupCommand),

    /// Apply the pending migration script
    Migrate(migrate::MigrateCommand),

    /// Read or write the settings table
    Settings(settings::SettingsCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply_to_env();
        config.init_logging();

        match self.command {
            Commands::Init(cmd) => cmd.execute().await,
            Commands::Upgrade(cmd) => cmd.execute(config.config_path).await,
            Commands::Backup(cmd) => cmd.execute(config.config_path).await,
            Commands::Migrate(cmd) => cmd.execute(config.config_path).await,
            Commands::Settings(cmd) => cmd.execute(config.config_path).await,
        }
    }
}
