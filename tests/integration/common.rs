//! Shared helpers for the integration suite.

use assert_cmd::Command;
use reelshelf_cli::config::InstallConfig;
use reelshelf_cli::constants::{CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use reelshelf_cli::installer::{InitOptions, Installer};
use reelshelf_cli::settings::SettingsStore;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An initialized installation with a few catalog files.
pub struct CatalogSite {
    pub temp: TempDir,
}

impl CatalogSite {
    /// Initialize a site at `version` through the installer.
    pub async fn new(version: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("site");
        fs::create_dir_all(root.join("app")).unwrap();
        fs::create_dir_all(root.join("config")).unwrap();
        fs::create_dir_all(root.join("uploads/covers")).unwrap();
        fs::write(root.join("app/index.php"), "<?php echo 'catalog';").unwrap();
        fs::write(root.join("config/config.php"), "<?php $db = 'live';").unwrap();
        fs::write(root.join("uploads/covers/42.jpg"), b"\xFF\xD8cover").unwrap();

        let mut options = InitOptions::new(&root);
        options.version = Some(version.to_string());
        Installer::init(options).await.unwrap();

        Self { temp }
    }

    pub fn root(&self) -> PathBuf {
        self.temp.path().join("site")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join(CONFIG_FILE_NAME)
    }

    /// A path outside the installation tree, e.g. for uploaded files.
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    pub async fn config(&self) -> InstallConfig {
        InstallConfig::load_from(&self.config_path()).await.unwrap()
    }

    pub async fn settings(&self) -> SettingsStore {
        let config = self.config().await;
        SettingsStore::open(&config.database_path()).await.unwrap()
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel)).unwrap()
    }

    /// The binary, pointed at this site's configuration.
    pub fn reelshelf(&self) -> Command {
        reelshelf_in(&self.root(), Some(&self.config_path()))
    }
}

/// The binary running in `dir` with progress output disabled.
pub fn reelshelf_in(dir: &Path, config: Option<&Path>) -> Command {
    let mut cmd = Command::cargo_bin("reelshelf").unwrap();
    cmd.current_dir(dir).env_remove(CONFIG_ENV_VAR).env_remove("RUST_LOG").arg("--no-progress");
    if let Some(config) = config {
        cmd.arg("--config").arg(config);
    }
    cmd
}
