use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::constants::{CONFIG_ENV_VAR, CONFIG_FILE_NAME, INSTALL_LOCK_FILE, UPDATE_LOCK_FILE};
use crate::core::ReelshelfError;
use crate::upgrade::config::UpgradeConfig;
use crate::upgrade::exclusions::{ExclusionList, to_slash};

const fn default_max_upload_size() -> u64 {
    64 * 1024 * 1024 // 64 MiB
}

fn default_install_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_database() -> PathBuf {
    PathBuf::from("data/reelshelf.db")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_migration_script() -> PathBuf {
    PathBuf::from("update.sql")
}

/// Paths that are never overwritten by a release nor included in a backup.
pub fn default_exclusions() -> Vec<String> {
    vec![
        CONFIG_FILE_NAME.to_string(),
        "config/config.php".to_string(),
        "data/".to_string(),
        "uploads/".to_string(),
        "backups/".to_string(),
        INSTALL_LOCK_FILE.to_string(),
        UPDATE_LOCK_FILE.to_string(),
    ]
}

/// Configuration of one catalog installation (`reelshelf.toml`).
///
/// Relative paths resolve against [`install_root`](Self::install_root),
/// which itself resolves against the directory holding the config file.
/// The file is written once by `reelshelf init` and excluded from every
/// later overwrite and backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Root of the live installation tree.
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,

    /// SQLite database holding the settings table.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Directory receiving backup snapshots.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Location of the pending migration script shipped inside releases.
    #[serde(default = "default_migration_script")]
    pub migration_script: PathBuf,

    /// Largest release file accepted from a manual upload, in bytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,

    /// Ordered exclusion list; see [`ExclusionList`] for matching rules.
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,

    /// Release discovery settings.
    #[serde(default)]
    pub upgrade: UpgradeConfig,

    /// Directory the config was loaded from.
    #[serde(skip)]
    base_dir: PathBuf,

    /// File the config was loaded from.
    #[serde(skip)]
    source_path: Option<PathBuf>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            database: default_database(),
            backup_dir: default_backup_dir(),
            migration_script: default_migration_script(),
            max_upload_size: default_max_upload_size(),
            exclusions: default_exclusions(),
            upgrade: UpgradeConfig::default(),
            base_dir: PathBuf::from("."),
            source_path: None,
        }
    }
}

impl InstallConfig {
    /// Configuration rooted at `root`, everything else defaulted.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            install_root: PathBuf::from("."),
            base_dir: root,
            ..Self::default()
        }
    }

    /// Locate and load the configuration.
    ///
    /// Lookup order: `explicit`, then `$REELSHELF_CONFIG`, then
    /// `./reelshelf.toml`. A missing file is an error here since every
    /// command except `init` needs an installation to act on.
    pub async fn locate(explicit: Option<PathBuf>) -> Result<Self> {
        let path = Self::resolve_path(explicit);
        if !path.exists() {
            return Err(ReelshelfError::ConfigNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        Self::load_from(&path).await
    }

    /// The path [`locate`](Self::locate) would read.
    pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Load the configuration from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.source_path = Some(path.to_path_buf());
        config.validate()?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write the configuration to `path`, creating parent directories.
    ///
    /// On Unix the file is made owner-readable only; it sits next to the
    /// database path and is excluded from releases.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// Reject configurations the pipeline cannot run safely with.
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_size == 0 {
            return Err(ReelshelfError::ConfigError {
                message: "max_upload_size must be greater than zero".to_string(),
            }
            .into());
        }

        for entry in &self.exclusions {
            let path = Path::new(entry.trim_end_matches('/'));
            let escapes = path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
            if entry.trim().is_empty() || escapes {
                return Err(ReelshelfError::ConfigError {
                    message: format!("exclusion '{entry}' must be a relative path inside the installation"),
                }
                .into());
            }
        }

        if self.upgrade.rate_limit.window == 0 {
            return Err(ReelshelfError::ConfigError {
                message: "upgrade.rate_limit.window must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Absolute (or base-relative) root of the installation tree.
    pub fn root(&self) -> PathBuf {
        if self.install_root.is_absolute() {
            self.install_root.clone()
        } else {
            self.base_dir.join(&self.install_root)
        }
    }

    /// Resolve a path against the installation root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }

    /// Location of the settings database.
    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database)
    }

    /// Location of the backup directory.
    pub fn backup_dir_path(&self) -> PathBuf {
        self.resolve(&self.backup_dir)
    }

    /// Location of the pending migration script.
    pub fn migration_script_path(&self) -> PathBuf {
        self.resolve(&self.migration_script)
    }

    /// The exclusion list as a matcher.
    ///
    /// Besides the configured entries, the list always covers the settings
    /// database with its `-wal`, `-shm` and `-journal` siblings, the backup
    /// directory, the config file itself and both lock files, wherever the
    /// configuration puts them inside the tree.
    pub fn exclusion_list(&self) -> ExclusionList {
        let mut list = ExclusionList::new(self.exclusions.iter().cloned());

        if let Some(database) = self.root_relative(&self.database_path()) {
            for suffix in ["", "-wal", "-shm", "-journal"] {
                list.push(format!("{database}{suffix}"));
            }
        }

        let managed = [Some(self.backup_dir_path()), self.source_path.clone()];
        for path in managed.into_iter().flatten() {
            if let Some(relative) = self.root_relative(&path) {
                list.push(relative);
            }
        }

        list.push(INSTALL_LOCK_FILE);
        list.push(UPDATE_LOCK_FILE);
        list
    }

    /// `path` relative to the installation root, `None` when it lies
    /// outside the tree or is the root itself.
    fn root_relative(&self, path: &Path) -> Option<String> {
        let root = lexical(&std::path::absolute(self.root()).ok()?);
        let path = lexical(&std::path::absolute(path).ok()?);

        let relative = path.strip_prefix(&root).ok()?;
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return None;
        }
        let relative = to_slash(relative);
        (!relative.is_empty()).then_some(relative)
    }
}

/// `path` without `.` components.
fn lexical(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}
