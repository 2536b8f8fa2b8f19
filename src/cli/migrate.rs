//! `reelshelf migrate`: apply a pending `update.sql` outside an upgrade.
//!
//! Useful after fixing the database by hand when the migration step of an
//! upgrade failed and left its script in place.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::CommandContext;
use crate::upgrade::{MigrationApplier, MigrationOutcome};

#[derive(Args, Debug)]
pub struct MigrateCommand {}

impl MigrateCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let ctx = CommandContext::load(config_path).await?;
        let applier = MigrationApplier::new(ctx.config.migration_script_path());
        let result = applier.apply(&ctx.settings).await;
        ctx.close().await;

        match result? {
            MigrationOutcome::NothingPending => {
                println!("No pending migration at {}", applier.script_path().display());
            }
            MigrationOutcome::EmptyScriptRemoved => {
                println!("{}", "Removed empty migration script".green());
            }
            MigrationOutcome::Applied { rows_affected } => {
                println!(
                    "{}",
                    format!("Migration applied ({rows_affected} rows affected)").green()
                );
            }
        }
        Ok(())
    }
}
