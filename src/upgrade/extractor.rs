//! Release archive extraction onto the live installation tree.
//!
//! Release archives wrap the installation in a single top-level directory:
//! `v1.4.8/` for hand-built archives, `owner-repo-<sha>/` for GitHub
//! zipballs. The extractor strips that directory, skips anything on the
//! exclusion list, and writes every other entry over the tree. An archive
//! whose only top-level directory is not named after the release (a hotfix
//! shipping just `app/`) is extracted as is.
//!
//! Each file is written to a temporary sibling, its length checked against
//! the size recorded in the archive, synced, then renamed over the target.
//! The first failed write aborts the whole extraction with
//! [`ReelshelfError::ExtractionWriteFailed`]; the temporary file is removed
//! on every exit path.

use anyhow::Result;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

use super::exclusions::ExclusionList;
use super::version_check::strip_version_prefix;
use crate::core::ReelshelfError;

/// Counters describing one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Files written onto the tree
    pub files_written: usize,
    /// Directory entries created (or already present)
    pub directories_created: usize,
    /// Entries left alone because they are excluded
    pub skipped_excluded: usize,
    /// Entries that did not live under the release prefix
    pub skipped_outside_prefix: usize,
}

/// Writes release archives onto an installation tree.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    target_root: PathBuf,
    exclusions: ExclusionList,
}

impl ArchiveExtractor {
    /// Extractor writing under `target_root`, never touching `exclusions`.
    pub fn new(target_root: impl Into<PathBuf>, exclusions: ExclusionList) -> Self {
        Self {
            target_root: target_root.into(),
            exclusions,
        }
    }

    /// Root the archive is extracted onto.
    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Extract `archive_path`, stripping `prefix/` from every entry.
    ///
    /// With `prefix == None` the archive's single top-level directory is
    /// detected and stripped; when entries do not share one, nothing is
    /// stripped. `Some("")` keeps entry names as they are. Blocking; call
    /// from `spawn_blocking` in async contexts.
    pub fn extract(&self, archive_path: &Path, prefix: Option<&str>) -> Result<ExtractionReport> {
        let mut archive = open_archive(archive_path)?;
        let prefix = match prefix {
            Some(p) => Some(p.trim_matches('/').to_string()).filter(|p| !p.is_empty()),
            None => detect_common_root(archive.file_names()),
        };
        self.extract_entries(archive_path, &mut archive, prefix)
    }

    /// Extract the archive of release `tag`.
    ///
    /// The wrapping directory is stripped only when it is named after the
    /// release (see [`release_prefix`]), or when `any_wrapper` is set, as
    /// for GitHub zipballs rooted at `owner-repo-<sha>/`. Otherwise entry
    /// names are kept as they are. Blocking.
    pub fn extract_release(
        &self,
        archive_path: &Path,
        tag: &str,
        any_wrapper: bool,
    ) -> Result<ExtractionReport> {
        let mut archive = open_archive(archive_path)?;
        let prefix = release_prefix(archive.file_names(), tag, any_wrapper);
        self.extract_entries(archive_path, &mut archive, prefix)
    }

    fn extract_entries(
        &self,
        archive_path: &Path,
        archive: &mut ZipArchive<BufReader<File>>,
        prefix: Option<String>,
    ) -> Result<ExtractionReport> {
        debug!(
            "Extracting {} ({} entries, prefix {:?}) onto {}",
            archive_path.display(),
            archive.len(),
            prefix,
            self.target_root.display()
        );

        let mut report = ExtractionReport::default();

        for index in 0..archive.len() {
            let mut entry =
                archive.by_index(index).map_err(|e| archive_error(archive_path, e.to_string()))?;
            let name = entry.name().replace('\\', "/");

            let Some(relative) = strip_prefix(&name, prefix.as_deref()) else {
                report.skipped_outside_prefix += 1;
                continue;
            };
            let relative = relative.trim_matches('/');
            if relative.is_empty() {
                continue;
            }

            let Some(safe_relative) = checked_relative(relative) else {
                // Nothing but `.` segments: the root itself.
                if relative.split('/').all(|part| part.is_empty() || part == ".") {
                    continue;
                }
                return Err(archive_error(
                    archive_path,
                    format!("entry '{name}' escapes the installation root"),
                )
                .into());
            };

            // Match on the path actually written, not the raw entry name.
            if self.exclusions.is_excluded_path(&safe_relative) {
                debug!("Skipping excluded entry {}", name);
                report.skipped_excluded += 1;
                continue;
            }

            let target = self.target_root.join(&safe_relative);
            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|e| write_error(&target, &e))?;
                report.directories_created += 1;
                continue;
            }

            let expected = entry.size();
            let mode = entry.unix_mode();
            write_verified(&mut entry, expected, mode, &target)?;
            report.files_written += 1;
        }

        info!(
            "Extracted {} files ({} excluded) onto {}",
            report.files_written,
            report.skipped_excluded,
            self.target_root.display()
        );
        Ok(report)
    }
}

fn archive_error(archive_path: &Path, reason: String) -> ReelshelfError {
    ReelshelfError::ArchiveError {
        path: archive_path.display().to_string(),
        reason,
    }
}

fn open_archive(archive_path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(archive_path).map_err(|e| archive_error(archive_path, e.to_string()))?;
    let archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| archive_error(archive_path, e.to_string()))?;
    Ok(archive)
}

fn write_error(target: &Path, e: &dyn std::fmt::Display) -> ReelshelfError {
    ReelshelfError::ExtractionWriteFailed {
        path: target.display().to_string(),
        reason: e.to_string(),
    }
}

/// Stream `reader` into `target` through a temporary sibling file.
fn write_verified<R: Read>(
    reader: &mut R,
    expected: u64,
    #[cfg_attr(not(unix), allow(unused_variables))] mode: Option<u32>,
    target: &Path,
) -> Result<(), ReelshelfError> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| write_error(target, &e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".reelshelf-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| write_error(target, &e))?;

    let written = io::copy(reader, tmp.as_file_mut()).map_err(|e| write_error(target, &e))?;
    if written != expected {
        return Err(write_error(
            target,
            &format!("wrote {written} of {expected} bytes"),
        ));
    }
    tmp.as_file().sync_all().map_err(|e| write_error(target, &e))?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        // Keep permission bits only; never carry setuid/setgid from an archive.
        let perms = fs::Permissions::from_mode(mode & 0o777);
        tmp.as_file().set_permissions(perms).map_err(|e| write_error(target, &e))?;
    }

    tmp.persist(target).map_err(|e| write_error(target, &e.error))?;
    Ok(())
}

/// `name` relative to `prefix/`, or `None` when it lies outside.
fn strip_prefix<'a>(name: &'a str, prefix: Option<&str>) -> Option<&'a str> {
    match prefix {
        None => Some(name),
        Some(p) => {
            if name == p {
                Some("")
            } else {
                name.strip_prefix(p)?.strip_prefix('/')
            }
        }
    }
}

/// The single top-level directory shared by every entry, if any.
pub fn detect_common_root<'a>(names: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut root: Option<String> = None;
    let mut saw_nested = false;

    for name in names {
        let name = name.replace('\\', "/");
        let name = name.trim_start_matches('/');
        if name.is_empty() {
            continue;
        }
        let (first, rest) = match name.split_once('/') {
            Some((first, rest)) => (first, rest),
            // A top-level file means there is no wrapping directory.
            None => return None,
        };
        if !rest.is_empty() {
            saw_nested = true;
        }
        match &root {
            None => root = Some(first.to_string()),
            Some(existing) if existing == first => {}
            Some(_) => return None,
        }
    }

    root.filter(|_| saw_nested)
}

/// Prefix to strip from the archive of release `tag`.
///
/// The shared top-level directory counts as the release wrapper when it
/// is the tag itself (`v1.4.8/`) or carries the tag's version
/// (`reelshelf-1.4.8/`, `reelshelf-v1.4.8/`). Any other shared directory
/// (`app/`) is part of the tree and kept, unless `any_wrapper` is set.
pub fn release_prefix<'a>(
    names: impl Iterator<Item = &'a str>,
    tag: &str,
    any_wrapper: bool,
) -> Option<String> {
    let root = detect_common_root(names)?;
    let tag = tag.trim().trim_matches('/');
    let version = strip_version_prefix(tag);

    let named_after_release = root == tag
        || (!version.is_empty() && strip_version_prefix(&root) == version);
    if named_after_release || any_wrapper {
        Some(root)
    } else {
        debug!("Top-level directory '{}' does not match release {}; keeping it", root, tag);
        None
    }
}

/// Convert a `/`-separated entry path into a relative path, rejecting
/// anything that could leave the target root.
fn checked_relative(relative: &str) -> Option<PathBuf> {
    let path = Path::new(relative);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() { None } else { Some(out) }
}
