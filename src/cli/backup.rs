//! `reelshelf backup`: manage snapshots of the installation tree.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use super::common::{CommandContext, confirm};
use crate::upgrade::BackupManager;
use crate::utils::{format_size, spinner_with_message};

#[derive(Args, Debug)]
pub struct BackupCommand {
    #[command(subcommand)]
    command: BackupSubcommand,
}

#[derive(Subcommand, Debug)]
enum BackupSubcommand {
    /// Snapshot the installation now
    Create,

    /// List snapshots, newest first
    List,

    /// Print the full path of a snapshot
    Path {
        /// Snapshot file name
        name: String,
    },

    /// Delete a snapshot
    Delete {
        /// Snapshot file name
        name: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Extract a snapshot back over the installation
    Restore {
        /// Snapshot file name
        name: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

impl BackupCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let ctx = CommandContext::load(config_path).await?;
        let manager = BackupManager::from_config(&ctx.config);
        let result = self.run(&manager).await;
        ctx.close().await;
        result
    }

    async fn run(self, manager: &BackupManager) -> Result<()> {
        match self.command {
            BackupSubcommand::Create => {
                let spinner = spinner_with_message("Creating backup...");
                let artifact = manager.create_snapshot().await;
                spinner.finish_and_clear();
                let artifact = artifact?;
                println!(
                    "{} {} ({})",
                    "Created backup".green(),
                    artifact.name,
                    format_size(artifact.size)
                );
                if let Some(sha) = &artifact.sha256 {
                    println!("  {}", sha.dimmed());
                }
            }
            BackupSubcommand::List => {
                let backups = manager.list_backups().await?;
                if backups.is_empty() {
                    println!("No backups in {}", manager.backup_dir().display());
                    return Ok(());
                }
                for backup in backups {
                    println!(
                        "{}  {:>10}  {}",
                        backup.name,
                        format_size(backup.size),
                        backup.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
                    );
                }
            }
            BackupSubcommand::Path { name } => {
                println!("{}", manager.backup_path(&name)?.display());
            }
            BackupSubcommand::Delete { name, yes } => {
                manager.backup_path(&name)?;
                if !confirm(&format!("Delete backup {name}?"), yes).await? {
                    println!("{}", "Cancelled.".yellow());
                    return Ok(());
                }
                manager.delete_backup(&name).await?;
                println!("{} {}", "Deleted backup".green(), name);
            }
            BackupSubcommand::Restore { name, yes } => {
                manager.backup_path(&name)?;
                let prompt = format!("Overwrite the installation with the contents of {name}?");
                if !confirm(&prompt, yes).await? {
                    println!("{}", "Cancelled.".yellow());
                    return Ok(());
                }
                let spinner = spinner_with_message(format!("Restoring {name}..."));
                let report = manager.restore_backup(&name).await;
                spinner.finish_and_clear();
                let report = report?;
                println!(
                    "{} {} ({} files)",
                    "Restored".green(),
                    name,
                    report.files_written
                );
            }
        }
        Ok(())
    }
}
