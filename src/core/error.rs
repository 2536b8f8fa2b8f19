//! Error handling for reelshelf.
//!
//! The error system has two layers:
//!
//! - [`ReelshelfError`]: typed failures raised by the update pipeline and its
//!   components. Callers that need to react to a specific failure (the CLI
//!   deciding whether a backup error is fatal, tests asserting that a
//!   migration failure kept its script) downcast to this type.
//! - [`ErrorContext`]: a user-facing wrapper carrying optional details and a
//!   suggestion, rendered by `main` before exiting with status 1.
//!
//! Library code returns `anyhow::Result` and attaches `.context(...)` as it
//! propagates; [`user_friendly_error`] walks the chain back down to a typed
//! error when one is present.

use colored::Colorize;
use thiserror::Error;

/// Typed failures of the update/import pipeline.
#[derive(Error, Debug, Clone)]
pub enum ReelshelfError {
    /// The release API could not be reached or answered with garbage.
    #[error("Network error: {operation}")]
    NetworkError {
        /// What was being attempted
        operation: String,
        /// Underlying cause
        reason: String,
    },

    /// The local call budget for the release API is exhausted.
    #[error("Release API rate limit reached ({calls} calls in the current window)")]
    RateLimited {
        /// Calls made in the current window
        calls: u32,
    },

    /// A release archive could not be opened or read.
    #[error("Archive error in {path}: {reason}")]
    ArchiveError {
        /// Archive location
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// Writing an extracted entry onto the live tree failed.
    #[error("Failed to write extracted file {path}: {reason}")]
    ExtractionWriteFailed {
        /// Target path that could not be written
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// Creating a backup snapshot failed.
    #[error("Backup failed: {reason}")]
    BackupFailed {
        /// Underlying cause
        reason: String,
    },

    /// The requested backup artifact does not exist.
    #[error("Backup '{name}' not found")]
    BackupNotFound {
        /// Artifact name
        name: String,
    },

    /// The pending migration script failed against the database.
    #[error("Migration script {script} failed: {reason}")]
    MigrationFailed {
        /// Script path, retained for retry
        script: String,
        /// Database error message
        reason: String,
    },

    /// The downloaded archive does not match its published checksum.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Verified file
        path: String,
        /// Published checksum
        expected: String,
        /// Computed checksum
        actual: String,
    },

    /// Administrator input was rejected before anything started.
    #[error("Invalid input: {message}")]
    ValidationError {
        /// What was wrong
        message: String,
    },

    /// The install-lock marker exists; the installer refuses to run again.
    #[error("Installation already initialized at {path}")]
    InstallLocked {
        /// Marker path
        path: String,
    },

    /// Another update holds the update lock.
    #[error("Another update is already in progress ({path})")]
    UpdateInProgress {
        /// Lock file path
        path: String,
    },

    /// No configuration file where one was expected.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Expected location
        path: String,
    },

    /// The configuration file exists but is unusable.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What was wrong
        message: String,
    },

    /// Catch-all with a preformatted message.
    #[error("{message}")]
    Other {
        /// Message shown to the operator
        message: String,
    },
}

impl ReelshelfError {
    /// Whether the pipeline may continue after this error.
    ///
    /// Only backup failures are best-effort; everything else stops the run.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::BackupFailed { .. } | Self::RateLimited { .. })
    }
}

/// A user-facing error with optional details and a suggested next step.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: ReelshelfError,
    /// What the operator can do about it
    pub suggestion: Option<String>,
    /// Extra background
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error without suggestion or details.
    #[must_use]
    pub const fn new(error: ReelshelfError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colored labels.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert any error into an [`ErrorContext`] with operator guidance.
///
/// The whole `anyhow` chain is searched for a [`ReelshelfError`], so errors
/// wrapped in `.context(...)` still get their specific suggestion.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(typed) = error.chain().find_map(|e| e.downcast_ref::<ReelshelfError>()) {
        return create_error_context(typed.clone());
    }

    if let Some(io_error) = error.chain().find_map(|e| e.downcast_ref::<std::io::Error>()) {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(ReelshelfError::Other {
                    message: format_chain(&error),
                })
                .with_suggestion(
                    "Check that the installation directory is writable by the user running reelshelf",
                )
                .with_details("The web server user usually owns the installation tree");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(ReelshelfError::Other {
                    message: format_chain(&error),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.chain().find_map(|e| e.downcast_ref::<toml::de::Error>()) {
        return ErrorContext::new(ReelshelfError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax in reelshelf.toml");
    }

    ErrorContext::new(ReelshelfError::Other {
        message: format_chain(&error),
    })
}

fn format_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    message
}

fn create_error_context(error: ReelshelfError) -> ErrorContext {
    match &error {
        ReelshelfError::NetworkError { reason, .. } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_suggestion("Check your internet connection, or import the release file with 'reelshelf upgrade --from <file>'")
                .with_details(reason)
        }
        ReelshelfError::RateLimited { .. } => ErrorContext::new(error)
            .with_suggestion("Wait for the rate limit window to pass or set GITHUB_TOKEN"),
        ReelshelfError::ArchiveError { .. } => ErrorContext::new(error)
            .with_suggestion("Download the release again; the archive may be truncated or not a ZIP file"),
        ReelshelfError::ExtractionWriteFailed { .. } => ErrorContext::new(error)
            .with_suggestion("Fix permissions or free disk space, then rerun 'reelshelf upgrade' to resume")
            .with_details("Files written before the failure remain in place; the update checkpoint was kept"),
        ReelshelfError::BackupFailed { .. } => ErrorContext::new(error)
            .with_suggestion("Check that the backup directory exists and is writable"),
        ReelshelfError::BackupNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'reelshelf backup list' to see available backups"),
        ReelshelfError::MigrationFailed { script, .. } => {
            let suggestion = format!(
                "Fix the database issue and run 'reelshelf migrate' again; {script} was kept"
            );
            ErrorContext::new(error)
                .with_suggestion(suggestion)
                .with_details("The migration ran in a transaction and was rolled back")
        }
        ReelshelfError::ChecksumMismatch { .. } => ErrorContext::new(error)
            .with_suggestion("Download the release archive again")
            .with_details("The archive does not match the checksum published in its descriptor"),
        ReelshelfError::ValidationError { .. } => ErrorContext::new(error),
        ReelshelfError::InstallLocked { path } => {
            let details = format!("Remove {path} only if you really want to reinstall");
            ErrorContext::new(error)
                .with_suggestion("Use 'reelshelf upgrade' to update an existing installation")
                .with_details(details)
        }
        ReelshelfError::UpdateInProgress { .. } => ErrorContext::new(error)
            .with_suggestion("Wait for the running update to finish before starting another one"),
        ReelshelfError::ConfigNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'reelshelf init' or pass --config <path>"),
        ReelshelfError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Check reelshelf.toml against the documented keys"),
        ReelshelfError::Other { .. } => ErrorContext::new(error),
    }
}
