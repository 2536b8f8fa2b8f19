//! Update and import pipeline for a reelshelf installation.
//!
//! This module moves an installed catalog from one release to the next.
//! Releases come either from GitHub or from a file uploaded by the operator,
//! and every update follows the same path.
//!
//! # Architecture Overview
//!
//! ## Core Components
//!
//! - **[`release::ReleaseSource`]**: reports the latest release. Implemented by
//!   [`github::GitHubReleaseSource`] (cached, rate limited) and
//!   [`local::LocalReleaseSource`] (uploaded `.zip` or `.xml`)
//! - **[`backup::BackupManager`]**: ZIP snapshots of the installation tree
//! - **[`extractor::ArchiveExtractor`]**: writes a release archive over the tree
//! - **[`migration::MigrationApplier`]**: runs the release's `update.sql` once
//! - **[`pipeline::UpdatePipeline`]**: ties the steps together with a
//!   resumable checkpoint and an inter-process lock
//!
//! ## Update Process Flow
//!
//! ```text
//! 1. Release lookup
//!    ├── Serve the cached GitHub response while fresh
//!    └── Otherwise query the API (within the rate-limit budget)
//!
//! 2. Backup (unless --no-backup or auto_backup = false)
//!    └── Snapshot of the tree minus exclusions; failure only warns
//!
//! 3. Extraction
//!    ├── Download the zipball, or use the uploaded archive in place
//!    ├── Verify the declared checksum, if any
//!    └── Overwrite the tree, never touching excluded paths
//!
//! 4. Migration
//!    └── Run update.sql in a transaction, delete it on success
//!
//! 5. Record version
//!    └── Only once extraction and migration both succeeded
//! ```
//!
//! # Usage Patterns
//!
//! ```bash
//! reelshelf upgrade --check                    # Is a newer release out?
//! reelshelf upgrade --status                   # Versions, limits, pending migration
//! reelshelf upgrade                            # Update from GitHub
//! reelshelf upgrade --from reelshelf-v1.4.8.zip  # Update from an uploaded archive
//! reelshelf backup restore backup_20261018_101500_123.zip
//! ```
//!
//! Configuration lives in the `[upgrade]` table of `reelshelf.toml`; see
//! [`config::UpgradeConfig`].

/// Backup snapshots of the installation tree.
pub mod backup;
/// Configuration structures for release checks.
pub mod config;
/// Path exclusions shared by extraction and backup.
pub mod exclusions;
/// Release archive extraction.
pub mod extractor;
/// GitHub releases API client.
pub mod github;
/// Releases from uploaded files.
pub mod local;
/// Update lock.
pub mod lock;
/// Pending SQL migration.
pub mod migration;
/// The checkpointed update run.
pub mod pipeline;
/// Release descriptors and the source trait.
pub mod release;
/// Archive checksum verification.
pub mod verification;
/// Version comparison.
pub mod version_check;


pub use backup::{BackupArtifact, BackupManager};
pub use exclusions::ExclusionList;
pub use extractor::{ArchiveExtractor, ExtractionReport};
pub use github::GitHubReleaseSource;
pub use local::LocalReleaseSource;
pub use migration::{MigrationApplier, MigrationOutcome};
pub use pipeline::{UpdateOptions, UpdateOutcome, UpdatePipeline};
pub use release::{ReleaseDescriptor, ReleaseSource};
pub use verification::ChecksumVerifier;
pub use version_check::is_update_available;
