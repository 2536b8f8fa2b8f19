use serde::{Deserialize, Serialize};

/// Settings controlling how reelshelf discovers and applies releases.
///
/// Lives under the `[upgrade]` table of `reelshelf.toml`:
///
/// ```toml
/// [upgrade]
/// repo_owner = "reelshelf"
/// repo_name = "reelshelf"
/// api_base = "https://api.github.com"
/// user_agent = "reelshelf-updater"
/// cache_duration = 3600
/// request_timeout = 30
/// auto_backup = true
///
/// [upgrade.rate_limit]
/// max_calls = 30
/// window = 3600
/// ```
///
/// Every field has a default, so an empty table (or no table) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// Owner of the GitHub repository publishing releases.
    #[serde(default = "default_repo_owner")]
    pub repo_owner: String,

    /// Name of the GitHub repository publishing releases.
    #[serde(default = "default_repo_name")]
    pub repo_name: String,

    /// Base URL of the releases API. Overridden in tests to point at a
    /// local mock server.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Fixed `User-Agent` header sent with every API request. GitHub
    /// rejects requests without one.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// How long a fetched release response is served from cache, in seconds.
    ///
    /// # Default: `3600` (1 hour)
    #[serde(default = "default_cache_duration")]
    pub cache_duration: u64,

    /// Timeout for each HTTP request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Whether to snapshot the installation before extracting a release.
    ///
    /// Backups are best-effort: a failed snapshot is logged and the update
    /// continues.
    #[serde(default = "default_auto_backup")]
    pub auto_backup: bool,

    /// Local budget for release API calls.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Call-count-per-window limiter for the release API.
///
/// GitHub allows 60 unauthenticated requests per hour per IP address; the
/// defaults stay well below that so a shared host is not locked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum calls allowed in one window.
    #[serde(default = "default_max_calls")]
    pub max_calls: u32,

    /// Window length in seconds.
    #[serde(default = "default_window")]
    pub window: u64,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            repo_owner: default_repo_owner(),
            repo_name: default_repo_name(),
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            cache_duration: default_cache_duration(),
            request_timeout: default_request_timeout(),
            auto_backup: default_auto_backup(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            window: default_window(),
        }
    }
}

fn default_repo_owner() -> String {
    "reelshelf".to_string()
}

fn default_repo_name() -> String {
    "reelshelf".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    "reelshelf-updater".to_string()
}

fn default_cache_duration() -> u64 {
    3600
}

fn default_request_timeout() -> u64 {
    30
}

fn default_auto_backup() -> bool {
    true
}

fn default_max_calls() -> u32 {
    30
}

fn default_window() -> u64 {
    3600
}

impl UpgradeConfig {
    /// URL of the "latest release" endpoint for the configured repository.
    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repo_owner,
            self.repo_name
        )
    }
}
