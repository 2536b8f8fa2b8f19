//! One-shot SQL migration shipped with a release.
//!
//! A release may carry an `update.sql` at the root of its archive. After
//! extraction the applier runs it against the settings database as a
//! single batch inside a transaction, then deletes it so it never runs
//! twice. When any statement fails the transaction rolls back and the
//! script stays in place for the operator to fix and re-run.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::ReelshelfError;
use crate::settings::SettingsStore;

/// Result of [`MigrationApplier::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No script was present.
    NothingPending,
    /// The script contained no SQL and was removed.
    EmptyScriptRemoved,
    /// The script ran and was removed.
    Applied {
        /// Rows changed by the batch
        rows_affected: u64,
    },
}

/// Applies the pending migration script, if any.
#[derive(Debug, Clone)]
pub struct MigrationApplier {
    script_path: PathBuf,
}

impl MigrationApplier {
    /// Applier for the script at `script_path`.
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
        }
    }

    /// Location of the script.
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// Whether a script is waiting to be applied.
    pub fn pending(&self) -> bool {
        self.script_path.is_file()
    }

    /// Run the pending script, if any.
    pub async fn apply(&self, settings: &SettingsStore) -> Result<MigrationOutcome> {
        if !self.pending() {
            debug!("No migration script at {}", self.script_path.display());
            return Ok(MigrationOutcome::NothingPending);
        }

        let script = self.script_path.display().to_string();
        let failed = |reason: String| ReelshelfError::MigrationFailed {
            script: script.clone(),
            reason,
        };

        let sql = tokio::fs::read_to_string(&self.script_path)
            .await
            .map_err(|e| failed(e.to_string()))?;

        if sql.trim().is_empty() {
            self.remove_script().await?;
            info!("Removed empty migration script {}", script);
            return Ok(MigrationOutcome::EmptyScriptRemoved);
        }

        info!("Applying migration {}", script);
        let mut tx = settings.pool().begin().await.map_err(|e| failed(e.to_string()))?;
        let rows_affected = match sqlx::raw_sql(&sql).execute(&mut *tx).await {
            Ok(result) => result.rows_affected(),
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback after failed migration also failed: {}", rollback);
                }
                return Err(failed(e.to_string()).into());
            }
        };
        tx.commit().await.map_err(|e| failed(e.to_string()))?;

        // Statements may have touched the settings table directly.
        settings.reload().await?;
        self.remove_script().await?;

        info!("Migration applied ({} rows affected)", rows_affected);
        Ok(MigrationOutcome::Applied { rows_affected })
    }

    async fn remove_script(&self) -> Result<()> {
        tokio::fs::remove_file(&self.script_path).await.map_err(|e| {
            ReelshelfError::MigrationFailed {
                script: self.script_path.display().to_string(),
                reason: format!("applied, but the script could not be removed: {e}"),
            }
            .into()
        })
    }
}
