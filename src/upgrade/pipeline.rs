//! The update run: backup, extract, migrate, record version.
//!
//! Each step is recorded in a checkpoint stored under the
//! `update.checkpoint` setting as soon as it completes. A run interrupted
//! by a failed migration (or a crash) leaves the checkpoint behind, and the
//! next run for the same release skips what already succeeded. A
//! checkpoint left by a different release is discarded.
//!
//! The version marker is written by the last step only, which runs only
//! when both extraction and migration are recorded as done.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::backup::BackupManager;
use super::extractor::{ArchiveExtractor, ExtractionReport};
use super::github::GitHubReleaseSource;
use super::lock::UpdateLock;
use super::migration::{MigrationApplier, MigrationOutcome};
use super::release::ReleaseDescriptor;
use super::verification::ChecksumVerifier;
use super::version_check::strip_version_prefix;
use crate::config::InstallConfig;
use crate::constants::CHECKPOINT_KEY;
use crate::core::ReelshelfError;
use crate::settings::SettingsStore;

/// Steps of an update run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStep {
    Backup,
    Extract,
    Migrate,
    RecordVersion,
}

/// Progress of an update run, persisted between steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheckpoint {
    /// Release being installed
    pub tag: String,
    /// Steps finished so far
    pub completed: Vec<UpdateStep>,
    /// Snapshot taken by the backup step, if any
    pub backup: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UpdateCheckpoint {
    /// Fresh checkpoint for `tag`.
    pub fn new(tag: &str) -> Self {
        let now = Utc::now();
        Self {
            tag: tag.to_string(),
            completed: Vec::new(),
            backup: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Whether `step` already completed.
    pub fn is_done(&self, step: UpdateStep) -> bool {
        self.completed.contains(&step)
    }

    fn mark(&mut self, step: UpdateStep) {
        if !self.is_done(step) {
            self.completed.push(step);
        }
        self.updated_at = Utc::now();
    }

    /// The stored checkpoint, if any. An unreadable one is ignored.
    pub async fn load(settings: &SettingsStore) -> Result<Option<Self>> {
        let Some(raw) = settings.get_opt(CHECKPOINT_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                warn!("Ignoring unreadable update checkpoint: {}", e);
                Ok(None)
            }
        }
    }

    async fn save(&self, settings: &SettingsStore) -> Result<()> {
        let raw = serde_json::to_string(self).context("Failed to serialize update checkpoint")?;
        settings.set(CHECKPOINT_KEY, &raw).await
    }

    /// Remove the stored checkpoint.
    pub async fn clear(settings: &SettingsStore) -> Result<()> {
        settings.delete(CHECKPOINT_KEY).await?;
        Ok(())
    }
}

/// Knobs for [`UpdatePipeline::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Install even when the release is not newer
    pub force: bool,
    /// Take a snapshot first (also subject to `upgrade.auto_backup`)
    pub backup: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            force: false,
            backup: true,
        }
    }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub from: String,
    pub to: String,
    /// Snapshot name, when one was taken
    pub backup: Option<String>,
    /// `None` when extraction was already done by an earlier run
    pub extraction: Option<ExtractionReport>,
    /// `None` when the migration was already done by an earlier run
    pub migration: Option<MigrationOutcome>,
    /// Whether an earlier checkpoint was resumed
    pub resumed: bool,
}

/// Result of [`UpdatePipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The installed version is current; nothing was touched.
    UpToDate { current: String },
    Updated(UpdateReport),
}

/// Applies a release to an installation.
///
/// # Examples
///
/// ```rust,no_run
/// use reelshelf_cli::config::InstallConfig;
/// use reelshelf_cli::settings::SettingsStore;
/// use reelshelf_cli::upgrade::local::LocalReleaseSource;
/// use reelshelf_cli::upgrade::pipeline::{UpdateOptions, UpdatePipeline};
///
/// # async fn example(config: InstallConfig, settings: SettingsStore) -> anyhow::Result<()> {
/// let release = LocalReleaseSource::new("reelshelf-v1.4.8.zip", config.max_upload_size)
///     .describe()
///     .await?;
/// let pipeline = UpdatePipeline::new(&config, &settings);
/// pipeline.run(&release, UpdateOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
pub struct UpdatePipeline<'a> {
    config: &'a InstallConfig,
    settings: &'a SettingsStore,
}

impl<'a> UpdatePipeline<'a> {
    pub fn new(config: &'a InstallConfig, settings: &'a SettingsStore) -> Self {
        Self { config, settings }
    }

    /// Install `release`, resuming an interrupted run for the same tag.
    pub async fn run(
        &self,
        release: &ReleaseDescriptor,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome> {
        let current = self.settings.version().await?;
        if !options.force && !release.is_newer_than(&current) {
            info!("Installed version {} is up to date (latest {})", current, release.tag);
            return Ok(UpdateOutcome::UpToDate { current });
        }

        let root = self.config.root();
        let _lock = UpdateLock::acquire(&root).await?;

        let (mut checkpoint, resumed) = match UpdateCheckpoint::load(self.settings).await? {
            Some(cp) if cp.tag == release.tag => {
                info!("Resuming update to {} (done: {:?})", cp.tag, cp.completed);
                (cp, true)
            }
            Some(cp) => {
                warn!("Discarding checkpoint of unfinished update to {}", cp.tag);
                (UpdateCheckpoint::new(&release.tag), false)
            }
            None => (UpdateCheckpoint::new(&release.tag), false),
        };
        checkpoint.save(self.settings).await?;

        info!("Updating {} -> {}", current, release.tag);

        if !checkpoint.is_done(UpdateStep::Backup) {
            if options.backup && self.config.upgrade.auto_backup {
                let artifact = BackupManager::from_config(self.config).try_snapshot().await;
                checkpoint.backup = artifact.map(|a| a.name);
            } else {
                debug!("Backup disabled for this run");
            }
            checkpoint.mark(UpdateStep::Backup);
            checkpoint.save(self.settings).await?;
        }

        let mut extraction = None;
        if !checkpoint.is_done(UpdateStep::Extract) {
            extraction = Some(self.extract(release).await?);
            checkpoint.mark(UpdateStep::Extract);
            checkpoint.save(self.settings).await?;
        }

        let mut migration = None;
        if !checkpoint.is_done(UpdateStep::Migrate) {
            let applier = MigrationApplier::new(self.config.migration_script_path());
            migration = Some(applier.apply(self.settings).await?);
            checkpoint.mark(UpdateStep::Migrate);
            checkpoint.save(self.settings).await?;
        }

        let to = strip_version_prefix(&release.tag).to_string();
        if checkpoint.is_done(UpdateStep::Extract) && checkpoint.is_done(UpdateStep::Migrate) {
            self.settings.set_version(&to).await?;
            checkpoint.mark(UpdateStep::RecordVersion);
        }
        UpdateCheckpoint::clear(self.settings).await?;

        info!("Installation updated to {}", to);
        Ok(UpdateOutcome::Updated(UpdateReport {
            from: current,
            to,
            backup: checkpoint.backup,
            extraction,
            migration,
            resumed,
        }))
    }

    async fn extract(&self, release: &ReleaseDescriptor) -> Result<ExtractionReport> {
        // Keeps a downloaded archive alive until extraction is over.
        let mut download = None;
        let archive: PathBuf = match release.local_archive() {
            Some(path) => {
                if !path.is_file() {
                    return Err(ReelshelfError::ArchiveError {
                        path: path.display().to_string(),
                        reason: "archive file not found".to_string(),
                    }
                    .into());
                }
                path
            }
            None => {
                let source = GitHubReleaseSource::new(&self.config.upgrade, self.settings)?;
                let tmp = source.download_archive(&release.download_url).await?;
                let path = tmp.path().to_path_buf();
                download = Some(tmp);
                path
            }
        };

        if let Some(expected) = &release.sha256 {
            ChecksumVerifier::verify_checksum(&archive, expected).await?;
        }

        let extractor = ArchiveExtractor::new(self.config.root(), self.config.exclusion_list());
        let tag = release.tag.clone();
        let zipball = download.is_some();
        let report =
            tokio::task::spawn_blocking(move || extractor.extract_release(&archive, &tag, zipball))
            .await
            .context("Extraction task panicked")??;

        drop(download);
        Ok(report)
    }
}
