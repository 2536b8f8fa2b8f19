//! `reelshelf settings`: read and write the settings table.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::common::CommandContext;
use crate::settings::SettingsStore;

#[derive(Args, Debug)]
pub struct SettingsCommand {
    #[command(subcommand)]
    command: SettingsSubcommand,
}

#[derive(Subcommand, Debug)]
enum SettingsSubcommand {
    /// Print a value
    Get {
        key: String,

        /// Printed when the key is absent
        #[arg(long, default_value = "")]
        default: String,
    },

    /// Insert or update a value
    Set { key: String, value: String },

    /// Print every key and value
    List,
}

impl SettingsCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let ctx = CommandContext::load(config_path).await?;
        let result = self.run(&ctx.settings).await;
        ctx.close().await;
        result
    }

    async fn run(self, settings: &SettingsStore) -> Result<()> {
        match self.command {
            SettingsSubcommand::Get { key, default } => {
                println!("{}", settings.get(&key, &default).await?);
            }
            SettingsSubcommand::Set { key, value } => {
                settings.set(&key, &value).await?;
            }
            SettingsSubcommand::List => {
                for (key, value) in settings.all().await? {
                    println!("{key} = {value}");
                }
            }
        }
        Ok(())
    }
}
