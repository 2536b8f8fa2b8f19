//! Helpers shared by the CLI commands.

use anyhow::{Result, bail};
use colored::Colorize;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::config::InstallConfig;
use crate::settings::SettingsStore;

/// Loaded configuration plus an open settings store.
///
/// Every command except `init` starts by building one of these.
#[derive(Debug)]
pub struct CommandContext {
    /// Parsed `reelshelf.toml`
    pub config: InstallConfig,
    /// Settings table of the installation's database
    pub settings: SettingsStore,
}

impl CommandContext {
    /// Locate the configuration and open the database it names.
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = InstallConfig::locate(config_path).await?;
        config.validate()?;
        let database = config.database_path();
        debug!("Opening settings database {}", database.display());
        let settings = SettingsStore::open(&database).await?;
        Ok(Self { config, settings })
    }

    /// Close the database pool, flushing WAL state.
    pub async fn close(self) {
        self.settings.close().await;
    }
}

/// Ask the operator a yes/no question; `assume_yes` answers it up front.
///
/// Outside a terminal the question cannot be asked, so the action is refused
/// unless `--yes` was given.
pub async fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }

    if !io::stdin().is_terminal() {
        bail!("{prompt} Refusing to continue without a terminal; pass --yes to confirm");
    }

    print!("{} {} ", prompt.yellow(), "[y/N]".dimmed());
    io::stdout().flush()?;

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut response = String::new();
    reader.read_line(&mut response).await?;

    Ok(matches!(response.trim().to_lowercase().as_str(), "y" | "yes"))
}
