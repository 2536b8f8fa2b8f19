//! Paths the update pipeline must never touch.
//!
//! The same list drives both directions: the extractor refuses to overwrite
//! an excluded path and the backup snapshotter refuses to archive one.
//! Entries are relative to the installation root and use `/` separators.
//!
//! - `config/config.php` matches that exact path, and everything beneath it
//!   should it be a directory.
//! - `uploads/` matches the `uploads` directory and everything beneath it.
//!
//! Matching is per path component: `uploads/` does not exclude
//! `uploads_old/poster.jpg`.

use std::path::{Component, Path};

/// Ordered set of excluded relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    entries: Vec<String>,
}

impl ExclusionList {
    /// Build a list from raw entries. Entries are normalized (backslashes to
    /// `/`, empty and `.` segments dropped) and empty entries discarded.
    /// Order is preserved.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|e| normalize(&e.into()))
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            entries,
        }
    }

    /// Whether `relative` (a `/`-separated path relative to the root) is
    /// excluded.
    pub fn is_excluded(&self, relative: &str) -> bool {
        let relative = normalize(relative);
        if relative.is_empty() {
            return false;
        }
        self.entries.iter().any(|entry| {
            relative == *entry
                || (relative.len() > entry.len()
                    && relative.starts_with(entry.as_str())
                    && relative.as_bytes()[entry.len()] == b'/')
        })
    }

    /// Same as [`is_excluded`](Self::is_excluded) for a filesystem path
    /// already relative to the root.
    pub fn is_excluded_path(&self, relative: &Path) -> bool {
        self.is_excluded(&to_slash(relative))
    }

    /// Add an entry at the end of the list.
    pub fn push(&mut self, entry: impl Into<String>) {
        let entry = normalize(&entry.into());
        if !entry.is_empty() && !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    /// The normalized entries, in order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// True when nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(path: &str) -> String {
    path.trim()
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Render a relative path with `/` separators, dropping `.` components.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
