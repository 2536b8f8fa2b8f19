//! Releases supplied by the operator as uploaded files.
//!
//! Two shapes are accepted:
//!
//! - a release archive (`reelshelf-v1.4.8.zip`), whose tag comes from the
//!   version token in the file name;
//! - an XML descriptor pointing at an archive:
//!
//! ```xml
//! <release>
//!   <tag>v1.4.8</tag>
//!   <changelog>Fixes the cover upload.</changelog>
//!   <archive>reelshelf-v1.4.8.zip</archive>
//!   <published>2026-09-01T12:00:00Z</published>
//!   <sha256>9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08</sha256>
//! </release>
//! ```
//!
//! A relative `archive` resolves against the descriptor's directory.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::release::{ReleaseDescriptor, ReleaseSource, is_remote_url};
use crate::core::ReelshelfError;

/// The version token embedded in an archive file name.
///
/// `reelshelf-v1.4.8.zip` yields `v1.4.8`, `reelshelf-1.5.0-beta.1.zip`
/// yields `1.5.0-beta.1`.
pub fn version_from_file_name(file_name: &str) -> Option<String> {
    let stem = file_name
        .strip_suffix(".zip")
        .or_else(|| file_name.strip_suffix(".ZIP"))
        .unwrap_or(file_name);
    let re =
        Regex::new(r"(?:[vV]\d+(?:\.\d+)*|\d+(?:\.\d+)+)(?:-[0-9A-Za-z][0-9A-Za-z.]*)?").ok()?;
    re.find(stem).map(|m| m.as_str().to_string())
}

#[derive(Debug, Deserialize)]
struct XmlRelease {
    tag: String,
    #[serde(default)]
    changelog: String,
    archive: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    sha256: Option<String>,
}

fn validation(message: impl Into<String>) -> anyhow::Error {
    ReelshelfError::ValidationError {
        message: message.into(),
    }
    .into()
}

fn parse_published(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| validation(format!("invalid <published> date '{value}'")))
}

/// A release read from an uploaded `.zip` or `.xml` file.
#[derive(Debug, Clone)]
pub struct LocalReleaseSource {
    path: PathBuf,
    max_upload_size: u64,
}

impl LocalReleaseSource {
    /// Source for the uploaded file at `path`.
    pub fn new(path: impl Into<PathBuf>, max_upload_size: u64) -> Self {
        Self {
            path: path.into(),
            max_upload_size,
        }
    }

    /// The uploaded file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate the upload and build its descriptor.
    pub async fn describe(&self) -> Result<ReleaseDescriptor> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|_| validation(format!("uploaded file {} does not exist", self.path.display())))?;
        if !metadata.is_file() {
            return Err(validation(format!("{} is not a file", self.path.display())));
        }
        self.check_size(&self.path, metadata.len())?;

        let extension = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "zip" => self.describe_zip(&metadata).await,
            "xml" => self.describe_xml().await,
            other => Err(validation(format!(
                "unsupported upload type '.{other}' (expected .zip or .xml)"
            ))),
        }
    }

    fn check_size(&self, path: &Path, size: u64) -> Result<()> {
        if size > self.max_upload_size {
            return Err(validation(format!(
                "{} is {} bytes, larger than the {} byte upload limit",
                path.display(),
                size,
                self.max_upload_size
            )));
        }
        Ok(())
    }

    async fn describe_zip(&self, metadata: &std::fs::Metadata) -> Result<ReleaseDescriptor> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tag = version_from_file_name(&file_name)
            .ok_or_else(|| validation(format!("no version number in file name '{file_name}'")))?;

        debug!("Uploaded archive {} carries version {}", file_name, tag);
        Ok(ReleaseDescriptor {
            tag,
            changelog: format!("Manual upload: {file_name}"),
            download_url: self.path.display().to_string(),
            published_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            sha256: None,
        })
    }

    async fn describe_xml(&self) -> Result<ReleaseDescriptor> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let release: XmlRelease = quick_xml::de::from_str(&content)
            .map_err(|e| validation(format!("invalid release descriptor: {e}")))?;

        let tag = release.tag.trim().to_string();
        if tag.is_empty() {
            return Err(validation("release descriptor has an empty <tag>"));
        }

        let archive = release.archive.trim();
        let download_url = if is_remote_url(archive) {
            archive.to_string()
        } else {
            let base = self.path.parent().unwrap_or_else(|| Path::new("."));
            let resolved = base.join(archive);
            let metadata = tokio::fs::metadata(&resolved).await.map_err(|_| {
                validation(format!("archive {} named by the descriptor does not exist", resolved.display()))
            })?;
            self.check_size(&resolved, metadata.len())?;
            resolved.display().to_string()
        };

        let published_at = match release.published.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(parse_published(value)?),
            _ => None,
        };
        let sha256 = release.sha256.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Ok(ReleaseDescriptor {
            tag,
            changelog: release.changelog.trim().to_string(),
            download_url,
            published_at,
            sha256,
        })
    }
}

impl ReleaseSource for LocalReleaseSource {
    async fn latest_release(&self) -> Result<Option<ReleaseDescriptor>> {
        self.describe().await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LIMIT: u64 = 1024 * 1024;

    fn expect_validation(err: anyhow::Error) {
        assert!(
            matches!(err.downcast_ref::<ReelshelfError>(), Some(ReelshelfError::ValidationError { .. })),
            "expected validation error, got {err:#}"
        );
    }

    #[test]
    fn test_version_from_file_name() {
        assert_eq!(version_from_file_name("reelshelf-v1.4.8.zip").as_deref(), Some("v1.4.8"));
        assert_eq!(version_from_file_name("reelshelf-1.5.0-beta.1.zip").as_deref(), Some("1.5.0-beta.1"));
        assert_eq!(version_from_file_name("v2.zip").as_deref(), Some("v2"));
        assert_eq!(version_from_file_name("latest.zip"), None);
    }

    #[tokio::test]
    async fn test_zip_upload_descriptor() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("reelshelf-v1.4.8.zip");
        fs::write(&path, b"PK").unwrap();

        let release = LocalReleaseSource::new(&path, LIMIT).latest_release().await.unwrap().unwrap();
        assert_eq!(release.tag, "v1.4.8");
        assert_eq!(release.changelog, "Manual upload: reelshelf-v1.4.8.zip");
        assert_eq!(release.download_url, path.display().to_string());
        assert!(release.published_at.is_some());
        assert!(!release.is_remote());
    }

    #[tokio::test]
    async fn test_xml_descriptor() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("reelshelf-v1.5.0.zip"), b"PK").unwrap();
        let xml = temp.path().join("release.xml");
        fs::write(
            &xml,
            r#"<?xml version="1.0"?>
<release>
  <tag>v1.5.0</tag>
  <changelog>New &amp; improved</changelog>
  <archive>reelshelf-v1.5.0.zip</archive>
  <published>2026-09-01</published>
  <sha256>ABCDEF</sha256>
</release>"#,
        )
        .unwrap();

        let release = LocalReleaseSource::new(&xml, LIMIT).describe().await.unwrap();
        assert_eq!(release.tag, "v1.5.0");
        assert_eq!(release.changelog, "New & improved");
        assert_eq!(
            PathBuf::from(&release.download_url),
            temp.path().join("reelshelf-v1.5.0.zip")
        );
        assert_eq!(release.published_at.unwrap().to_rfc3339(), "2026-09-01T00:00:00+00:00");
        assert_eq!(release.sha256.as_deref(), Some("ABCDEF"));
    }

    #[tokio::test]
    async fn test_xml_descriptor_with_remote_archive() {
        let temp = TempDir::new().unwrap();
        let xml = temp.path().join("release.xml");
        fs::write(
            &xml,
            "<release><tag>v2.0.0</tag><changelog/><archive>https://example.com/r.zip</archive></release>",
        )
        .unwrap();

        let release = LocalReleaseSource::new(&xml, LIMIT).describe().await.unwrap();
        assert!(release.is_remote());
        assert_eq!(release.changelog, "");
        assert_eq!(release.published_at, None);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = LocalReleaseSource::new(temp.path().join("nope.zip"), LIMIT)
            .describe()
            .await
            .unwrap_err();
        expect_validation(err);
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("reelshelf-v1.4.8.tar.gz");
        fs::write(&path, b"x").unwrap();
        expect_validation(LocalReleaseSource::new(&path, LIMIT).describe().await.unwrap_err());
    }

    #[tokio::test]
    async fn test_zip_without_version_token() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("release.zip");
        fs::write(&path, b"PK").unwrap();
        expect_validation(LocalReleaseSource::new(&path, LIMIT).describe().await.unwrap_err());
    }

    #[tokio::test]
    async fn test_upload_size_limit() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("reelshelf-v1.4.8.zip");
        fs::write(&path, vec![0u8; 64]).unwrap();
        expect_validation(LocalReleaseSource::new(&path, 16).describe().await.unwrap_err());
    }

    #[tokio::test]
    async fn test_malformed_xml() {
        let temp = TempDir::new().unwrap();
        let xml = temp.path().join("release.xml");
        fs::write(&xml, "<release><tag>v1</tag></release>").unwrap();
        expect_validation(LocalReleaseSource::new(&xml, LIMIT).describe().await.unwrap_err());
    }
}
