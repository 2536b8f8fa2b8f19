//! GitHub releases as a [`ReleaseSource`].
//!
//! The latest-release response is cached in the settings table together
//! with its fetch time, and every API call is counted against a persisted
//! rate-limit window. Network trouble never fails a check: the source falls
//! back to whatever is cached, or reports no release at all.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::config::{RateLimitConfig, UpgradeConfig};
use super::release::{ReleaseDescriptor, ReleaseSource};
use crate::constants::{
    API_CALLS_KEY, API_WINDOW_START_KEY, RELEASE_CACHE_KEY, RELEASE_CACHE_TIME_KEY,
};
use crate::core::ReelshelfError;
use crate::settings::SettingsStore;

/// Subset of the `releases/latest` payload we use.
#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    body: Option<String>,
    zipball_url: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
}

impl From<GitHubRelease> for ReleaseDescriptor {
    fn from(release: GitHubRelease) -> Self {
        Self {
            tag: release.tag_name,
            changelog: release.body.unwrap_or_default(),
            download_url: release.zipball_url,
            published_at: release.published_at,
            sha256: None,
        }
    }
}

fn parse_release(body: &str) -> Result<ReleaseDescriptor> {
    let release: GitHubRelease =
        serde_json::from_str(body).context("Malformed release response")?;
    Ok(release.into())
}

fn seconds(secs: u64) -> ChronoDuration {
    i64::try_from(secs)
        .ok()
        .and_then(ChronoDuration::try_seconds)
        .unwrap_or(ChronoDuration::MAX)
}

/// Fixed-window counter of GitHub API calls, persisted in the settings table.
pub struct ApiRateLimiter<'a> {
    settings: &'a SettingsStore,
    limits: RateLimitConfig,
}

impl<'a> ApiRateLimiter<'a> {
    /// Limiter with the given budget.
    pub fn new(settings: &'a SettingsStore, limits: RateLimitConfig) -> Self {
        Self { settings, limits }
    }

    /// Record one call if the budget allows it.
    ///
    /// Returns `false` when the current window is exhausted; nothing is
    /// recorded in that case.
    pub async fn try_acquire(&self) -> Result<bool> {
        let now = Utc::now();
        let window_start = self
            .settings
            .get_opt(API_WINDOW_START_KEY)
            .await?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc));
        let mut calls: u32 = self
            .settings
            .get_opt(API_CALLS_KEY)
            .await?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let window = seconds(self.limits.window);
        let expired = match window_start {
            Some(start) => now.signed_duration_since(start) >= window || start > now,
            None => true,
        };
        if expired {
            self.settings.set(API_WINDOW_START_KEY, &now.to_rfc3339()).await?;
            calls = 0;
        }

        if calls >= self.limits.max_calls {
            debug!("API budget exhausted ({} calls in window)", calls);
            return Ok(false);
        }

        self.settings.set(API_CALLS_KEY, &(calls + 1).to_string()).await?;
        Ok(true)
    }
}

/// Latest-release lookups against the GitHub REST API.
///
/// # Examples
///
/// ```rust,no_run
/// use reelshelf_cli::settings::SettingsStore;
/// use reelshelf_cli::upgrade::config::UpgradeConfig;
/// use reelshelf_cli::upgrade::github::GitHubReleaseSource;
/// use reelshelf_cli::upgrade::release::ReleaseSource;
///
/// # async fn example(settings: &SettingsStore) -> anyhow::Result<()> {
/// let source = GitHubReleaseSource::new(&UpgradeConfig::default(), settings)?;
/// if let Some(release) = source.latest_release().await? {
///     println!("Latest release: {}", release.tag);
/// }
/// # Ok(())
/// # }
/// ```
pub struct GitHubReleaseSource<'a> {
    client: Client,
    config: UpgradeConfig,
    settings: &'a SettingsStore,
}

impl<'a> GitHubReleaseSource<'a> {
    /// Source for the repository named in `config`.
    ///
    /// `GITHUB_TOKEN`, when set, is sent as a bearer token to lift the
    /// anonymous API quota.
    pub fn new(config: &UpgradeConfig, settings: &'a SettingsStore) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        if let Ok(token) = std::env::var("GITHUB_TOKEN")
            && !token.trim().is_empty()
        {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .context("Invalid GITHUB_TOKEN")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            config: config.clone(),
            settings,
        })
    }

    /// Query GitHub now, ignoring cache freshness.
    ///
    /// The rate limiter still applies; when it refuses, the cached release
    /// (of any age) is returned instead.
    pub async fn check_now(&self) -> Result<Option<ReleaseDescriptor>> {
        debug!("Performing explicit release check");
        self.fetch_guarded().await
    }

    /// Forget the cached response.
    pub async fn clear_cache(&self) -> Result<()> {
        self.settings.delete(RELEASE_CACHE_KEY).await?;
        self.settings.delete(RELEASE_CACHE_TIME_KEY).await?;
        debug!("Cleared release cache");
        Ok(())
    }

    /// Download an archive into a temporary `.zip` file.
    ///
    /// The file is deleted when the returned handle is dropped.
    pub async fn download_archive(&self, url: &str) -> Result<NamedTempFile> {
        info!("Downloading {}", url);
        let network_error = |reason: String| ReelshelfError::NetworkError {
            operation: format!("download {url}"),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(network_error(format!("HTTP {}", response.status())).into());
        }

        let mut tmp = tempfile::Builder::new()
            .prefix("reelshelf-release-")
            .suffix(".zip")
            .tempfile()
            .context("Failed to create download file")?;

        let mut total = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| network_error(e.to_string()))? {
            tmp.as_file_mut().write_all(&chunk).context("Failed to write download")?;
            total += chunk.len() as u64;
        }
        tmp.as_file().sync_all()?;

        debug!("Downloaded {} bytes to {}", total, tmp.path().display());
        Ok(tmp)
    }

    async fn fetch_guarded(&self) -> Result<Option<ReleaseDescriptor>> {
        let limiter = ApiRateLimiter::new(self.settings, self.config.rate_limit.clone());
        if !limiter.try_acquire().await? {
            warn!(
                "{}",
                ReelshelfError::RateLimited {
                    calls: self.config.rate_limit.max_calls
                }
            );
            return Ok(self.load_cache().await?.map(|(release, _)| release));
        }

        let body = match self.fetch_remote().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Release check failed: {:#}", e);
                return self.cached_fallback().await;
            }
        };

        match parse_release(&body) {
            Ok(release) => {
                self.settings.set(RELEASE_CACHE_KEY, &body).await?;
                self.settings.set(RELEASE_CACHE_TIME_KEY, &Utc::now().to_rfc3339()).await?;
                info!("Latest release on GitHub: {}", release.tag);
                Ok(Some(release))
            }
            Err(e) => {
                warn!("Ignoring release response: {:#}", e);
                self.cached_fallback().await
            }
        }
    }

    async fn cached_fallback(&self) -> Result<Option<ReleaseDescriptor>> {
        let cached = self.load_cache().await?;
        if cached.is_some() {
            debug!("Using cached release information");
        }
        Ok(cached.map(|(release, _)| release))
    }

    async fn fetch_remote(&self) -> Result<String> {
        let url = self.config.latest_release_url();
        debug!("GET {}", url);
        let network_error = |reason: String| ReelshelfError::NetworkError {
            operation: "fetch latest release".to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| network_error(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            warn!("GitHub API rate limit hit (HTTP {})", status.as_u16());
            return Err(network_error(format!("rate limited by GitHub (HTTP {status})")).into());
        }
        if !status.is_success() {
            return Err(network_error(format!("HTTP {status}")).into());
        }

        Ok(response.text().await.map_err(|e| network_error(e.to_string()))?)
    }

    async fn load_cache(&self) -> Result<Option<(ReleaseDescriptor, DateTime<Utc>)>> {
        let Some(body) = self.settings.get_opt(RELEASE_CACHE_KEY).await? else {
            return Ok(None);
        };
        let fetched_at = self
            .settings
            .get_opt(RELEASE_CACHE_TIME_KEY)
            .await?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        match parse_release(&body) {
            Ok(release) => Ok(Some((release, fetched_at))),
            Err(e) => {
                debug!("Discarding unreadable release cache: {:#}", e);
                Ok(None)
            }
        }
    }

    fn is_fresh(&self, fetched_at: DateTime<Utc>) -> bool {
        let age = Utc::now().signed_duration_since(fetched_at);
        let max_age = seconds(self.config.cache_duration);
        age >= ChronoDuration::zero() && age < max_age
    }
}

impl ReleaseSource for GitHubReleaseSource<'_> {
    async fn latest_release(&self) -> Result<Option<ReleaseDescriptor>> {
        if let Some((release, fetched_at)) = self.load_cache().await?
            && self.is_fresh(fetched_at)
        {
            debug!("Release cache is fresh ({})", fetched_at);
            return Ok(Some(release));
        }
        self.fetch_guarded().await
    }
}
