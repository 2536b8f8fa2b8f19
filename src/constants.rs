//! Global constants used throughout the reelshelf codebase.
//!
//! Settings keys, file names, and timeouts shared between the pipeline
//! components and the CLI live here so the persisted layout is defined in
//! one place.

use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "reelshelf.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV_VAR: &str = "REELSHELF_CONFIG";

/// Environment variable disabling spinners.
pub const NO_PROGRESS_ENV_VAR: &str = "REELSHELF_NO_PROGRESS";

/// Marker whose existence means the installation was initialized.
pub const INSTALL_LOCK_FILE: &str = ".install.lock";

/// Lock file held for the duration of an update run.
pub const UPDATE_LOCK_FILE: &str = ".update.lock";

/// Settings key holding the installed version.
pub const VERSION_KEY: &str = "version";

/// Settings key holding the raw cached release response.
pub const RELEASE_CACHE_KEY: &str = "github.release_cache";

/// Settings key holding the RFC 3339 timestamp of the cached response.
pub const RELEASE_CACHE_TIME_KEY: &str = "github.release_cache_time";

/// Settings key holding the start of the current rate-limit window.
pub const API_WINDOW_START_KEY: &str = "github.api_window_start";

/// Settings key holding the number of API calls in the current window.
pub const API_CALLS_KEY: &str = "github.api_calls";

/// Settings key holding the update saga checkpoint.
pub const CHECKPOINT_KEY: &str = "update.checkpoint";

/// Version recorded when neither the config nor the caller provides one.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Timeout for acquiring the update lock (30 seconds).
///
/// Updates are manual administrator actions; a lock held longer than this
/// almost certainly belongs to a concurrent run the operator should wait for.
pub const UPDATE_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum delay between lock attempts (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for lock attempt backoff (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Prefix of backup artifact file names.
pub const BACKUP_PREFIX: &str = "backup_";
