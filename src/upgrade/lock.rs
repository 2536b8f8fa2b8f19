//! Inter-process lock serializing update runs.
//!
//! Two administrators starting an update at once would interleave writes
//! to the tree and the settings table. [`UpdateLock`] holds an exclusive
//! OS file lock on `<install_root>/.update.lock` for the whole run.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

use crate::constants::{
    MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS, UPDATE_LOCK_FILE, UPDATE_LOCK_TIMEOUT,
};
use crate::core::ReelshelfError;

/// Exclusive lock held while an update runs. Released on drop.
#[derive(Debug)]
pub struct UpdateLock {
    _file: Arc<File>,
    path: PathBuf,
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(self._file.as_ref()) {
            debug!("Failed to unlock {}: {}", self.path.display(), e);
        }
        debug!("Update lock released");
    }
}

impl UpdateLock {
    /// Acquire the lock for `install_root` with the default timeout.
    pub async fn acquire(install_root: &Path) -> Result<Self> {
        Self::acquire_with_timeout(install_root, UPDATE_LOCK_TIMEOUT).await
    }

    /// Acquire the lock, giving up with
    /// [`ReelshelfError::UpdateInProgress`] after `timeout`.
    ///
    /// Attempts are non-blocking and retried with exponential backoff, so a
    /// timed-out caller leaves no thread parked on the lock.
    pub async fn acquire_with_timeout(install_root: &Path, timeout: Duration) -> Result<Self> {
        let path = install_root.join(UPDATE_LOCK_FILE);
        debug!("Waiting for update lock {}", path.display());

        let open_path = path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .context("spawn_blocking panicked")?
        .with_context(|| format!("Failed to open lock file: {}", path.display()))?;
        let file = Arc::new(file);

        let start = Instant::now();
        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let attempt = Arc::clone(&file);
            let locked = tokio::task::spawn_blocking(move || attempt.try_lock_exclusive())
                .await
                .context("spawn_blocking panicked")?;

            if attempt_acquired(locked, &path)? {
                debug!(wait_ms = start.elapsed().as_millis(), "Update lock acquired");
                return Ok(Self { _file: file, path });
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(ReelshelfError::UpdateInProgress {
            path: path.display().to_string(),
        }
        .into())
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Outcome of one non-blocking attempt: `false` when another process holds
/// the lock. Any other failure is not contention and ends the wait.
fn attempt_acquired(result: io::Result<bool>, path: &Path) -> Result<bool> {
    result.with_context(|| format!("Failed to lock {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let temp = TempDir::new().unwrap();
        let lock = UpdateLock::acquire(temp.path()).await.unwrap();
        assert!(temp.path().join(UPDATE_LOCK_FILE).exists());
        drop(lock);

        // Re-acquirable once released.
        let _again = UpdateLock::acquire_with_timeout(temp.path(), Duration::from_millis(200))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_second_holder_times_out() {
        let temp = TempDir::new().unwrap();
        let _held = UpdateLock::acquire(temp.path()).await.unwrap();

        let err = UpdateLock::acquire_with_timeout(temp.path(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReelshelfError>(),
            Some(ReelshelfError::UpdateInProgress { .. })
        ));
    }

    #[test]
    fn test_io_error_is_not_contention() {
        let path = Path::new("/srv/reelshelf/.update.lock");
        assert!(attempt_acquired(Ok(true), path).unwrap());
        assert!(!attempt_acquired(Ok(false), path).unwrap());

        let err = attempt_acquired(Err(io::Error::from_raw_os_error(37)), path).unwrap_err();
        assert!(err.downcast_ref::<ReelshelfError>().is_none());
        assert!(err.to_string().contains("Failed to lock"));
    }
}
