//! reelshelf - maintenance tool for a personal movie catalog installation
//!
//! A catalog installation is a web application tree plus a SQLite database.
//! This crate keeps such an installation up to date: it discovers new
//! releases (on GitHub or from a file uploaded by the operator), takes a
//! snapshot of the tree, extracts the release over it, applies the release's
//! pending SQL migration and records the new version.
//!
//! # Architecture Overview
//!
//! Every update follows the same path:
//!
//! ```text
//! Release Source -> (operator confirms) -> Backup -> Extraction -> Migration -> Version marker
//! ```
//!
//! Paths listed in the installation's exclusion list (its configuration,
//! the database, uploaded covers, backups) are never overwritten by a
//! release and never included in a backup.
//!
//! # Core Modules
//!
//! - [`cli`] - Command-line interface of the `reelshelf` binary
//! - [`config`] - `reelshelf.toml` loading and path resolution
//! - [`core`] - Error types and user-facing error rendering
//! - [`installer`] - One-shot initialization of an installation
//! - [`settings`] - Key/value settings table holding the version marker
//! - [`upgrade`] - Release sources, backups, extraction, migrations and the
//!   checkpointed update pipeline
//! - [`utils`] - Filesystem helpers and spinners
//!
//! # Example
//!
//! ```rust,no_run
//! use reelshelf_cli::config::InstallConfig;
//! use reelshelf_cli::settings::SettingsStore;
//! use reelshelf_cli::upgrade::{
//!     GitHubReleaseSource, ReleaseSource, UpdateOptions, UpdatePipeline,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = InstallConfig::locate(None).await?;
//! let settings = SettingsStore::open(&config.database_path()).await?;
//!
//! let source = GitHubReleaseSource::new(&config.upgrade, &settings)?;
//! if let Some(release) = source.latest_release().await? {
//!     UpdatePipeline::new(&config, &settings)
//!         .run(&release, UpdateOptions::default())
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod installer;
pub mod settings;
pub mod upgrade;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
