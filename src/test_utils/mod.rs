//! Test utilities for reelshelf
//!
//! Helpers shared by unit tests and the integration suite:
//!
//! - [`init_test_logging`] wires `tracing` output into the test harness.
//! - [`ZipFixture`] builds release archives entry by entry.
//! - [`TestInstallation`] lays out a throwaway installation tree with a
//!   config and an initialized settings database.
//!
//! # Example
//!
//! ```rust,no_run
//! use reelshelf_cli::test_utils::ZipFixture;
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! let archive = ZipFixture::new()
//!     .file("v1.4.8/app/index.php", "<?php echo 'hi';")
//!     .write_to(&dir.path().join("release.zip"))
//!     .unwrap();
//! ```

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::config::InstallConfig;
use crate::settings::SettingsStore;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Respects `RUST_LOG` when `level` is `None`; does nothing when neither is
/// provided. Safe to call from every test.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

enum FixtureEntry {
    File(String, Vec<u8>),
    Dir(String),
}

/// Builder for ZIP archives used as release fixtures.
#[derive(Default)]
pub struct ZipFixture {
    entries: Vec<FixtureEntry>,
}

impl ZipFixture {
    /// An empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file entry.
    pub fn file(mut self, name: &str, contents: impl AsRef<[u8]>) -> Self {
        self.entries.push(FixtureEntry::File(name.to_string(), contents.as_ref().to_vec()));
        self
    }

    /// Add a directory entry (the name should end in `/`).
    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push(FixtureEntry::Dir(name.to_string()));
        self
    }

    /// Write the archive to `path` and return the path.
    pub fn write_to(self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create fixture {}", path.display()))?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        for entry in self.entries {
            match entry {
                FixtureEntry::File(name, contents) => {
                    zip.start_file(name, options)?;
                    zip.write_all(&contents)?;
                }
                FixtureEntry::Dir(name) => {
                    zip.add_directory(name, options)?;
                }
            }
        }
        zip.finish()?;
        Ok(path.to_path_buf())
    }
}

/// A throwaway installation: tree, `reelshelf.toml`, settings database.
pub struct TestInstallation {
    /// Keeps the directory alive for the test's duration.
    pub temp: TempDir,
    /// Loaded configuration (paths resolve inside `temp`).
    pub config: InstallConfig,
    /// Open settings store.
    pub settings: SettingsStore,
}

impl TestInstallation {
    /// Create an installation at version `version` with a few catalog files.
    pub async fn new(version: &str) -> Result<Self> {
        let temp = TempDir::new()?;
        let root = temp.path().join("site");
        fs::create_dir_all(root.join("app"))?;
        fs::create_dir_all(root.join("config"))?;
        fs::create_dir_all(root.join("uploads/covers"))?;
        fs::write(root.join("app/index.php"), "<?php echo 'catalog';")?;
        fs::write(root.join("config/config.php"), "<?php $db = 'live';")?;
        fs::write(root.join("uploads/covers/1.jpg"), b"\xFF\xD8cover")?;

        let config_path = root.join(crate::constants::CONFIG_FILE_NAME);
        InstallConfig::default().save_to(&config_path).await?;
        let config = InstallConfig::load_from(&config_path).await?;

        let settings = SettingsStore::open(&config.database_path()).await?;
        settings.set_version(version).await?;

        Ok(Self {
            temp,
            config,
            settings,
        })
    }

    /// Root of the installation tree.
    pub fn root(&self) -> PathBuf {
        self.config.root()
    }

    /// Location of the installation's `reelshelf.toml`.
    pub fn config_path(&self) -> PathBuf {
        self.root().join(crate::constants::CONFIG_FILE_NAME)
    }

    /// A path inside the temp dir but outside the installation tree.
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }
}
