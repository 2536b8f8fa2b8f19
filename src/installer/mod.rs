//! First-run initialization of an installation.
//!
//! `reelshelf init` prepares a tree for the update pipeline: it writes
//! `reelshelf.toml`, creates the settings database and records the
//! installed version. The `.install.lock` marker written last makes the
//! operation one-shot; as long as it exists, `init` refuses to run again.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::InstallConfig;
use crate::constants::{CONFIG_FILE_NAME, DEFAULT_VERSION, INSTALL_LOCK_FILE};
use crate::core::ReelshelfError;
use crate::settings::SettingsStore;
use crate::upgrade::version_check::strip_version_prefix;
use crate::utils::fs::{atomic_write, ensure_dir};

/// Parameters of [`Installer::init`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Root of the installation tree
    pub root: PathBuf,
    /// Database location (relative to `root` unless absolute)
    pub database: Option<PathBuf>,
    /// Version the tree currently holds
    pub version: Option<String>,
}

impl InitOptions {
    /// Options for `root` with every other value defaulted.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            database: None,
            version: None,
        }
    }
}

/// What [`Installer::init`] created.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub config_path: PathBuf,
    pub database_path: PathBuf,
    pub version: String,
    pub installed_at: DateTime<Utc>,
}

/// One-shot installation setup.
pub struct Installer;

impl Installer {
    /// Whether `root` has already been initialized.
    pub fn is_installed(root: &Path) -> bool {
        root.join(INSTALL_LOCK_FILE).exists()
    }

    /// Initialize the installation at `options.root`.
    ///
    /// An existing `reelshelf.toml` is kept (with `--database` applied on
    /// top); otherwise a default one is written. Fails with
    /// [`ReelshelfError::InstallLocked`] when the marker already exists.
    pub async fn init(options: InitOptions) -> Result<InstallReport> {
        let root = options.root;
        ensure_dir(&root)?;

        let marker = root.join(INSTALL_LOCK_FILE);
        if marker.exists() {
            return Err(ReelshelfError::InstallLocked {
                path: marker.display().to_string(),
            }
            .into());
        }

        let config_path = root.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            InstallConfig::load_from(&config_path).await?
        } else {
            InstallConfig::for_root(&root)
        };
        if let Some(database) = options.database {
            config.database = database;
        }
        config.validate()?;
        config.save_to(&config_path).await?;

        let version = options
            .version
            .as_deref()
            .map(|v| strip_version_prefix(v).to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());

        let database_path = config.database_path();
        let settings = SettingsStore::open(&database_path).await?;
        settings.set_version(&version).await?;
        settings.close().await;

        let installed_at = Utc::now();
        let contents = format!("installed_at = \"{}\"\nversion = \"{}\"\n", installed_at.to_rfc3339(), version);
        atomic_write(&marker, contents.as_bytes())?;

        info!("Initialized installation at {} (version {})", root.display(), version);
        Ok(InstallReport {
            config_path,
            database_path,
            version,
            installed_at,
        })
    }
}
