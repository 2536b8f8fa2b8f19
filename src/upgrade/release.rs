//! Release descriptors and the sources that produce them.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::version_check::is_update_available;

/// Information about one published release.
///
/// `download_url` is an `http(s)://` URL for releases found on GitHub and a
/// filesystem path for uploaded archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Release tag, e.g. `v1.4.8`
    pub tag: String,
    /// Release notes (Markdown)
    pub changelog: String,
    /// Where the archive can be fetched from
    pub download_url: String,
    /// Publication time, when known
    pub published_at: Option<DateTime<Utc>>,
    /// Expected archive checksum, when the descriptor declares one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ReleaseDescriptor {
    /// Whether this release is newer than `current`.
    pub fn is_newer_than(&self, current: &str) -> bool {
        is_update_available(current, &self.tag)
    }

    /// Whether the archive must be downloaded first.
    pub fn is_remote(&self) -> bool {
        is_remote_url(&self.download_url)
    }

    /// Local archive path, for releases that are not remote.
    pub fn local_archive(&self) -> Option<PathBuf> {
        (!self.is_remote()).then(|| PathBuf::from(&self.download_url))
    }
}

/// Anything able to report the newest available release.
///
/// `Ok(None)` means "no release information available right now"; remote
/// sources use it instead of failing when the network or the API is down.
#[allow(async_fn_in_trait)]
pub trait ReleaseSource {
    /// The latest release this source knows about.
    async fn latest_release(&self) -> Result<Option<ReleaseDescriptor>>;
}

/// Whether `location` is an HTTP(S) URL rather than a filesystem path.
pub fn is_remote_url(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(tag: &str, url: &str) -> ReleaseDescriptor {
        ReleaseDescriptor {
            tag: tag.to_string(),
            changelog: String::new(),
            download_url: url.to_string(),
            published_at: None,
            sha256: None,
        }
    }

    #[test]
    fn test_remote_detection() {
        assert!(is_remote_url("https://api.github.com/repos/x/y/zipball/v1"));
        assert!(is_remote_url("HTTP://example.com/a.zip"));
        assert!(!is_remote_url("/tmp/reelshelf-v1.4.8.zip"));
        assert!(!is_remote_url("uploads/release.zip"));
    }

    #[test]
    fn test_local_archive() {
        let local = descriptor("v1.4.8", "/tmp/r.zip");
        assert_eq!(local.local_archive(), Some(PathBuf::from("/tmp/r.zip")));

        let remote = descriptor("v1.4.8", "https://example.com/r.zip");
        assert_eq!(remote.local_archive(), None);
    }

    #[test]
    fn test_is_newer_than() {
        let release = descriptor("v1.4.8", "x");
        assert!(release.is_newer_than("1.4.7"));
        assert!(!release.is_newer_than("1.4.8"));
    }
}
