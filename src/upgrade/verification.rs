use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::core::ReelshelfError;

/// SHA-256 integrity checks for release archives and backups.
///
/// Checksums are rendered as `sha256:<lowercase hex>`. Expected values may be
/// given with or without the `sha256:` prefix and in either case, since
/// release descriptors copy them from `sha256sum` output.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compute the SHA-256 checksum of a file.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use reelshelf_cli::upgrade::verification::ChecksumVerifier;
    /// use std::path::Path;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let checksum = ChecksumVerifier::compute_sha256(Path::new("release.zip")).await?;
    /// println!("SHA256: {}", checksum);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn compute_sha256(file_path: &Path) -> Result<String> {
        debug!("Computing SHA256 checksum for: {:?}", file_path);

        let contents = fs::read(file_path)
            .await
            .with_context(|| format!("Failed to read file: {file_path:?}"))?;

        let digest = Sha256::digest(&contents);
        Ok(format!("sha256:{}", hex::encode(digest)))
    }

    /// Canonical `sha256:<lowercase hex>` form of a checksum string.
    pub fn normalize(checksum: &str) -> String {
        let trimmed = checksum.trim();
        let hex_part = trimmed
            .strip_prefix("sha256:")
            .or_else(|| trimmed.strip_prefix("SHA256:"))
            .unwrap_or(trimmed);
        format!("sha256:{}", hex_part.to_ascii_lowercase())
    }

    /// Verify a file against an expected checksum.
    ///
    /// Fails with [`ReelshelfError::ChecksumMismatch`] when the digests differ.
    pub async fn verify_checksum(file_path: &Path, expected_checksum: &str) -> Result<()> {
        info!("Verifying checksum for: {:?}", file_path);

        let actual = Self::compute_sha256(file_path).await?;
        let expected = Self::normalize(expected_checksum);

        if actual != expected {
            return Err(ReelshelfError::ChecksumMismatch {
                path: file_path.display().to_string(),
                expected,
                actual,
            }
            .into());
        }

        info!("Checksum verification successful");
        Ok(())
    }
}
