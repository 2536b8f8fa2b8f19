use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::exclusions::{ExclusionList, to_slash};
use super::extractor::{ArchiveExtractor, ExtractionReport};
use super::verification::ChecksumVerifier;
use crate::config::InstallConfig;
use crate::constants::BACKUP_PREFIX;
use crate::core::ReelshelfError;

/// A snapshot archive in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    /// File name (`backup_<YYYYMMDD>_<HHMMSS>_<millis>.zip`)
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Creation time (from the file's modification time when listed)
    pub created_at: DateTime<Utc>,
    /// `sha256:<hex>` checksum, computed for freshly created snapshots
    pub sha256: Option<String>,
}

/// Creates, lists and restores ZIP snapshots of an installation tree.
///
/// Snapshots use the same [`ExclusionList`] as the extractor: whatever a
/// release may not overwrite (config, uploads, the database) is also not
/// archived. The backup directory itself is always skipped when it lives
/// inside the tree.
///
/// Creating a snapshot is best-effort from the pipeline's point of view;
/// use [`try_snapshot`](Self::try_snapshot) there. Snapshots never expire;
/// the operator deletes them explicitly.
///
/// # Examples
///
/// ```rust,no_run
/// use reelshelf_cli::upgrade::backup::BackupManager;
/// use reelshelf_cli::upgrade::exclusions::ExclusionList;
///
/// # async fn example() -> anyhow::Result<()> {
/// let manager = BackupManager::new(
///     "/srv/reelshelf",
///     "/srv/reelshelf/backups",
///     ExclusionList::new(["config/config.php", "uploads/"]),
/// );
/// let artifact = manager.create_snapshot().await?;
/// println!("Backup written to {}", artifact.path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BackupManager {
    install_root: PathBuf,
    backup_dir: PathBuf,
    exclusions: ExclusionList,
}

impl BackupManager {
    /// Manager snapshotting `install_root` into `backup_dir`.
    pub fn new(
        install_root: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        exclusions: ExclusionList,
    ) -> Self {
        Self {
            install_root: install_root.into(),
            backup_dir: backup_dir.into(),
            exclusions,
        }
    }

    /// Manager for the installation described by `config`.
    pub fn from_config(config: &InstallConfig) -> Self {
        Self::new(config.root(), config.backup_dir_path(), config.exclusion_list())
    }

    /// Directory holding the snapshots.
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Write a new snapshot of the tree.
    ///
    /// The archive is assembled in a temporary file inside the backup
    /// directory and only renamed to its final name once complete, so a
    /// failed run never leaves a truncated `backup_*.zip` behind.
    pub async fn create_snapshot(&self) -> Result<BackupArtifact> {
        let manager = self.clone();
        let mut artifact = tokio::task::spawn_blocking(move || manager.snapshot_blocking())
            .await
            .context("Backup task panicked")?
            .map_err(|e| ReelshelfError::BackupFailed {
                reason: format!("{e:#}"),
            })?;

        artifact.sha256 = Some(ChecksumVerifier::compute_sha256(&artifact.path).await?);
        info!("Backup created at {}", artifact.path.display());
        Ok(artifact)
    }

    /// Best-effort snapshot: failures are logged and `None` returned.
    pub async fn try_snapshot(&self) -> Option<BackupArtifact> {
        match self.create_snapshot().await {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!("Skipping backup: {:#}", e);
                None
            }
        }
    }

    fn snapshot_blocking(&self) -> Result<BackupArtifact> {
        fs::create_dir_all(&self.backup_dir).with_context(|| {
            format!("Failed to create backup directory {}", self.backup_dir.display())
        })?;

        let now = Utc::now();
        let path = self.unique_path(&now);
        let name = file_name(&path);

        let mut exclusions = self.exclusions.clone();
        if let Ok(rel) = self.backup_dir.strip_prefix(&self.install_root) {
            exclusions.push(to_slash(rel));
        }

        let tmp = tempfile::Builder::new()
            .prefix(".backup-")
            .suffix(".partial")
            .tempfile_in(&self.backup_dir)
            .with_context(|| format!("Failed to open backup archive in {}", self.backup_dir.display()))?;

        let mut zip = ZipWriter::new(tmp);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut files = 0usize;

        let walker = WalkDir::new(&self.install_root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.install_root)
                    .map(|rel| !exclusions.is_excluded_path(rel))
                    .unwrap_or(false)
            });

        for entry in walker {
            let entry = entry.context("Failed to walk installation tree")?;
            let rel = to_slash(entry.path().strip_prefix(&self.install_root)?);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                zip.add_directory(format!("{rel}/"), options)?;
            } else if file_type.is_file() {
                zip.start_file(rel.as_str(), options)?;
                let mut reader = BufReader::new(
                    File::open(entry.path())
                        .with_context(|| format!("Failed to read {}", entry.path().display()))?,
                );
                io::copy(&mut reader, &mut zip)
                    .with_context(|| format!("Failed to archive {}", entry.path().display()))?;
                files += 1;
            } else {
                debug!("Not archiving special file {}", rel);
            }
        }

        let tmp = zip.finish().context("Failed to finalize backup archive")?;
        let file = tmp
            .persist_noclobber(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to store backup as {}", path.display()))?;
        let size = file.metadata()?.len();

        debug!("Archived {} files into {}", files, name);
        Ok(BackupArtifact {
            name,
            path,
            size,
            created_at: now,
            sha256: None,
        })
    }

    fn unique_path(&self, now: &DateTime<Utc>) -> PathBuf {
        let stem = format!("{BACKUP_PREFIX}{}", now.format("%Y%m%d_%H%M%S_%3f"));
        let mut candidate = self.backup_dir.join(format!("{stem}.zip"));
        let mut counter = 1;
        while candidate.exists() {
            candidate = self.backup_dir.join(format!("{stem}-{counter}.zip"));
            counter += 1;
        }
        candidate
    }

    /// Snapshots in the backup directory, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupArtifact>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.backup_dir)
            .await
            .with_context(|| format!("Failed to read {}", self.backup_dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_backup_name(&name) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let created_at = metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
            backups.push(BackupArtifact {
                name,
                path: entry.path(),
                size: metadata.len(),
                created_at,
                sha256: None,
            });
        }

        // Names embed the UTC timestamp, so name order is creation order.
        backups.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(backups)
    }

    /// Full path of an existing snapshot, for download.
    pub fn backup_path(&self, name: &str) -> Result<PathBuf> {
        if !is_backup_name(name) {
            return Err(ReelshelfError::ValidationError {
                message: format!("'{name}' is not a backup file name"),
            }
            .into());
        }
        let path = self.backup_dir.join(name);
        if !path.is_file() {
            return Err(ReelshelfError::BackupNotFound {
                name: name.to_string(),
            }
            .into());
        }
        Ok(path)
    }

    /// Delete a snapshot.
    pub async fn delete_backup(&self, name: &str) -> Result<()> {
        let path = self.backup_path(name)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete {}", path.display()))?;
        info!("Deleted backup {}", name);
        Ok(())
    }

    /// Extract a snapshot back over the tree.
    ///
    /// Excluded paths are left untouched, exactly as during an update; files
    /// added since the snapshot are not removed.
    pub async fn restore_backup(&self, name: &str) -> Result<ExtractionReport> {
        let path = self.backup_path(name)?;
        warn!("Restoring installation from {}", path.display());

        let extractor = ArchiveExtractor::new(&self.install_root, self.exclusions.clone());
        // Snapshots carry no wrapping directory: keep entry names as-is.
        let report = tokio::task::spawn_blocking(move || extractor.extract(&path, Some("")))
            .await
            .context("Restore task panicked")??;

        info!("Restored {} files from {}", report.files_written, name);
        Ok(report)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Whether `name` looks like a snapshot produced by [`BackupManager`].
pub fn is_backup_name(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX)
        && name.ends_with(".zip")
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}
