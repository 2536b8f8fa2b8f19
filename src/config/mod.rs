//! Configuration management for reelshelf.
//!
//! A catalog installation is described by a single `reelshelf.toml` created
//! by `reelshelf init`:
//!
//! ```toml
//! install_root = "."
//! database = "data/reelshelf.db"
//! backup_dir = "backups"
//! migration_script = "update.sql"
//! exclusions = ["reelshelf.toml", "config/config.php", "data/", "uploads/", "backups/"]
//!
//! [upgrade]
//! repo_owner = "reelshelf"
//! repo_name = "reelshelf"
//! ```
//!
//! The configuration is loaded once per command and passed explicitly to
//! the components that need it. Runtime state (installed version, release
//! cache, rate-limit counters) is not configuration; it lives in the
//! settings table, see [`crate::settings`].

mod install;

pub use install::{InstallConfig, default_exclusions};
