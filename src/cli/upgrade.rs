//! `reelshelf upgrade`: discover and install releases.
//!
//! Without `--from`, the latest release is looked up on GitHub (served from
//! the settings cache while fresh). With `--from`, an uploaded `.zip` or
//! `.xml` file describes the release instead.
//!
//! ```bash
//! reelshelf upgrade --check
//! reelshelf upgrade --status
//! reelshelf upgrade --yes
//! reelshelf upgrade --from reelshelf-v1.4.8.zip --no-backup
//! ```

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use super::common::{CommandContext, confirm};
use crate::constants::API_CALLS_KEY;
use crate::upgrade::migration::{MigrationApplier, MigrationOutcome};
use crate::upgrade::pipeline::{UpdateCheckpoint, UpdateReport};
use crate::upgrade::version_check::format_version_info;
use crate::upgrade::{
    GitHubReleaseSource, LocalReleaseSource, ReleaseDescriptor, ReleaseSource, UpdateOptions,
    UpdateOutcome, UpdatePipeline,
};
use crate::utils::{format_size, spinner_with_message};

#[derive(Args, Debug)]
pub struct UpgradeCommand {
    /// Only report whether a newer release exists (queries GitHub now)
    #[arg(long, conflicts_with = "status")]
    check: bool,

    /// Show versions, upload limit and pending work
    #[arg(short, long)]
    status: bool,

    /// Install even when the release is not newer
    #[arg(short, long)]
    force: bool,

    /// Skip the pre-update backup
    #[arg(long)]
    no_backup: bool,

    /// Install from an uploaded release file (.zip or .xml)
    #[arg(long, value_name = "FILE")]
    from: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

impl UpgradeCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let ctx = CommandContext::load(config_path).await?;
        let result = self.run(&ctx).await;
        ctx.close().await;
        result
    }

    async fn run(&self, ctx: &CommandContext) -> Result<()> {
        if self.status {
            return show_status(ctx, self.from.as_ref()).await;
        }

        if self.check {
            return self.check_for_updates(ctx).await;
        }

        self.perform_upgrade(ctx).await
    }

    async fn lookup(
        &self,
        ctx: &CommandContext,
        bypass_cache: bool,
    ) -> Result<Option<ReleaseDescriptor>> {
        if let Some(path) = &self.from {
            let source = LocalReleaseSource::new(path, ctx.config.max_upload_size);
            return Ok(Some(source.describe().await?));
        }

        let source = GitHubReleaseSource::new(&ctx.config.upgrade, &ctx.settings)?;
        let spinner = spinner_with_message("Checking for releases...");
        let release = if bypass_cache {
            source.check_now().await
        } else {
            source.latest_release().await
        };
        spinner.finish_and_clear();
        release
    }

    async fn check_for_updates(&self, ctx: &CommandContext) -> Result<()> {
        let current = ctx.settings.version().await?;
        println!("{}", "Checking for updates...".cyan());

        match self.lookup(ctx, true).await? {
            Some(release) if release.is_newer_than(&current) => {
                println!("{}", format!("Update available: {} -> {}", current, release.tag).green());
                print_changelog(&release);
                println!("Run `reelshelf upgrade` to install it");
            }
            Some(_) => {
                println!("{}", format!("You are on the latest version ({current})").green());
            }
            None => {
                println!(
                    "{}",
                    "No release information available (release API unreachable or rate limited)"
                        .yellow()
                );
            }
        }
        Ok(())
    }

    async fn perform_upgrade(&self, ctx: &CommandContext) -> Result<()> {
        let current = ctx.settings.version().await?;
        let Some(release) = self.lookup(ctx, false).await? else {
            bail!(
                "No release information available; try again later or use `reelshelf upgrade --from <file>`"
            );
        };

        if !self.force && !release.is_newer_than(&current) {
            println!("{}", format!("Already on the latest version ({current})").green());
            return Ok(());
        }

        println!("Installed version: {}", current);
        println!("Release:           {}", release.tag.bold());
        print_changelog(&release);

        let prompt = format!("Install {} over the live installation?", release.tag);
        if !confirm(&prompt, self.yes).await? {
            println!("{}", "Upgrade cancelled.".yellow());
            return Ok(());
        }

        let options = UpdateOptions {
            force: self.force,
            backup: !self.no_backup,
        };
        let pipeline = UpdatePipeline::new(&ctx.config, &ctx.settings);
        let spinner = spinner_with_message(format!("Installing {}...", release.tag));
        let outcome = pipeline.run(&release, options).await;
        spinner.finish_and_clear();

        match outcome? {
            UpdateOutcome::UpToDate { current } => {
                println!("{}", format!("Already on the latest version ({current})").green());
            }
            UpdateOutcome::Updated(report) => print_report(&report),
        }
        Ok(())
    }
}

fn print_changelog(release: &ReleaseDescriptor) {
    let changelog = release.changelog.trim();
    if changelog.is_empty() {
        return;
    }
    println!();
    println!("{}", "Changes:".bold());
    for line in changelog.lines() {
        println!("  {line}");
    }
    println!();
}

fn print_report(report: &UpdateReport) {
    if report.resumed {
        println!("{}", "Resumed an interrupted update".yellow());
    }
    match &report.backup {
        Some(name) => println!("  Backup:    {name}"),
        None => println!("  Backup:    {}", "none".dimmed()),
    }
    if let Some(extraction) = &report.extraction {
        println!(
            "  Extracted: {} files ({} excluded paths left untouched)",
            extraction.files_written, extraction.skipped_excluded
        );
    }
    match &report.migration {
        Some(MigrationOutcome::Applied { rows_affected }) => {
            println!("  Migration: applied ({rows_affected} rows affected)");
        }
        Some(MigrationOutcome::EmptyScriptRemoved) => {
            println!("  Migration: empty script removed");
        }
        Some(MigrationOutcome::NothingPending) | None => {
            println!("  Migration: {}", "none".dimmed());
        }
    }
    println!(
        "{}",
        format!("Upgrade completed: {} -> {}", report.from, report.to).green()
    );
}

async fn show_status(ctx: &CommandContext, from: Option<&PathBuf>) -> Result<()> {
    for line in status_lines(ctx, from).await? {
        match line {
            StatusLine::Info(text) => println!("{text}"),
            StatusLine::Warning(text) => println!("{}", text.yellow()),
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StatusLine {
    Info(String),
    Warning(String),
}

async fn status_lines(ctx: &CommandContext, from: Option<&PathBuf>) -> Result<Vec<StatusLine>> {
    let current = ctx.settings.version().await?;

    let latest = match from {
        Some(path) => LocalReleaseSource::new(path, ctx.config.max_upload_size)
            .describe()
            .await
            .map(Some),
        None => match GitHubReleaseSource::new(&ctx.config.upgrade, &ctx.settings) {
            Ok(source) => source.latest_release().await,
            Err(e) => Err(e),
        },
    };
    let latest = latest.unwrap_or_else(|e| {
        debug!("Failed to look up the latest release: {}", e);
        None
    });

    let calls = ctx.settings.get(API_CALLS_KEY, "0").await?;
    let mut lines = vec![
        StatusLine::Info(format_version_info(&current, latest.as_ref().map(|r| r.tag.as_str()))),
        StatusLine::Info(format!("Max upload size: {}", format_size(ctx.config.max_upload_size))),
        StatusLine::Info(format!(
            "Release API calls: {}/{} per {}s window",
            calls, ctx.config.upgrade.rate_limit.max_calls, ctx.config.upgrade.rate_limit.window
        )),
    ];

    let applier = MigrationApplier::new(ctx.config.migration_script_path());
    if applier.pending() {
        lines.push(StatusLine::Warning(format!(
            "Pending migration: {}",
            applier.script_path().display()
        )));
    }

    if let Some(checkpoint) = UpdateCheckpoint::load(&ctx.settings).await? {
        lines.push(StatusLine::Warning(format!(
            "Interrupted update to {} (completed: {:?}); rerun `reelshelf upgrade` to resume",
            checkpoint.tag, checkpoint.completed
        )));
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestInstallation, ZipFixture};

    fn command(from: Option<PathBuf>) -> UpgradeCommand {
        UpgradeCommand {
            check: false,
            status: false,
            force: false,
            no_backup: true,
            from,
            yes: true,
        }
    }

    async fn context(install: &TestInstallation) -> CommandContext {
        CommandContext::load(Some(install.config_path())).await.unwrap()
    }

    #[tokio::test]
    async fn test_upgrade_from_uploaded_archive() {
        let install = TestInstallation::new("1.4.7").await.unwrap();
        let archive = ZipFixture::new()
            .file("v1.4.8/app/index.php", "<?php echo 'v1.4.8';")
            .write_to(&install.scratch("reelshelf-v1.4.8.zip"))
            .unwrap();

        let ctx = context(&install).await;
        command(Some(archive)).run(&ctx).await.unwrap();

        assert_eq!(ctx.settings.version().await.unwrap(), "1.4.8");
        assert!(!install.config.backup_dir_path().exists());
        ctx.close().await;
    }

    #[tokio::test]
    async fn test_upgrade_older_archive_is_noop() {
        let install = TestInstallation::new("1.4.8").await.unwrap();
        let archive = ZipFixture::new()
            .file("v1.4.7/app/index.php", "old")
            .write_to(&install.scratch("reelshelf-v1.4.7.zip"))
            .unwrap();

        let ctx = context(&install).await;
        command(Some(archive)).run(&ctx).await.unwrap();

        assert_eq!(ctx.settings.version().await.unwrap(), "1.4.8");
        assert_ne!(
            std::fs::read_to_string(install.root().join("app/index.php")).unwrap(),
            "old"
        );
        ctx.close().await;
    }

    #[tokio::test]
    async fn test_status_with_uploaded_file() {
        let install = TestInstallation::new("1.4.7").await.unwrap();
        let archive = ZipFixture::new()
            .file("v1.4.8/app/index.php", "new")
            .write_to(&install.scratch("reelshelf-v1.4.8.zip"))
            .unwrap();
        std::fs::write(install.config.migration_script_path(), "SELECT 1;").unwrap();

        let ctx = context(&install).await;
        let lines = status_lines(&ctx, Some(&archive)).await.unwrap();
        ctx.close().await;

        assert_eq!(
            lines[0],
            StatusLine::Info(
                "Current version: 1.4.7\nLatest version:  v1.4.8 (update available)".to_string()
            )
        );
        assert_eq!(lines[1], StatusLine::Info("Max upload size: 64.0 MiB".to_string()));
        assert!(matches!(&lines[2], StatusLine::Info(text) if text.starts_with("Release API calls: 0/30")));
        assert!(matches!(&lines[3], StatusLine::Warning(text) if text.starts_with("Pending migration:")));
        assert_eq!(lines.len(), 4);
    }

    #[tokio::test]
    async fn test_status_unreadable_upload_reports_no_release() {
        let install = TestInstallation::new("1.4.7").await.unwrap();
        let ctx = context(&install).await;
        let missing = install.scratch("missing.zip");

        let lines = status_lines(&ctx, Some(&missing)).await.unwrap();
        ctx.close().await;

        assert_eq!(lines[0], StatusLine::Info("Current version: 1.4.7 (up to date)".to_string()));
        assert_eq!(lines.len(), 3);
    }
}
