//! Version comparison for update detection.
//!
//! Release tags arrive in several shapes (`v1.4.8`, `1.4.8`, `release-1.5`,
//! `1.5.0-beta.1`) and the installed marker may be a short dotted version
//! written by an older installer. Comparison therefore:
//!
//! 1. strips any leading non-numeric characters,
//! 2. uses semver ordering when both sides are full semver versions, so
//!    pre-releases sort before their release,
//! 3. otherwise compares dotted numeric components, treating missing
//!    components as zero (`1.4` == `1.4.0`).

use std::cmp::Ordering;

/// Remove any leading non-numeric prefix (`v`, `V`, `release-`).
pub fn strip_version_prefix(version: &str) -> &str {
    version.trim().trim_start_matches(|c: char| !c.is_ascii_digit())
}

/// Parse the numeric components of a dotted version.
///
/// Each component contributes its leading digits; parsing stops at the
/// first component without any (`1.4.8-rc1` yields `[1, 4, 8]`).
/// Returns `None` when not even the first component is numeric.
pub fn parse_dotted(version: &str) -> Option<Vec<u64>> {
    let stripped = strip_version_prefix(version);
    let mut parts = Vec::new();
    for component in stripped.split('.') {
        let digits: String = component.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            break;
        }
        parts.push(digits.parse().ok()?);
        if digits.len() != component.len() {
            break;
        }
    }
    if parts.is_empty() { None } else { Some(parts) }
}

/// Order two version strings; `None` when either is unparseable.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let (a, b) = (strip_version_prefix(a), strip_version_prefix(b));

    if let (Ok(sa), Ok(sb)) = (semver::Version::parse(a), semver::Version::parse(b)) {
        return Some(sa.cmp(&sb));
    }

    let (pa, pb) = (parse_dotted(a)?, parse_dotted(b)?);
    let len = pa.len().max(pb.len());
    for i in 0..len {
        let x = pa.get(i).copied().unwrap_or(0);
        let y = pb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => {}
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

/// Whether `latest` is strictly newer than `current`.
///
/// An unparseable `latest` never counts as an update. An unparseable
/// `current` (a broken marker) does, so the operator can repair it.
pub fn is_update_available(current: &str, latest: &str) -> bool {
    if parse_dotted(latest).is_none() {
        return false;
    }
    if parse_dotted(current).is_none() {
        return true;
    }
    compare_versions(current, latest) == Some(Ordering::Less)
}

/// Status line pair shown by `reelshelf upgrade --status`.
pub fn format_version_info(current: &str, latest: Option<&str>) -> String {
    match latest {
        Some(v) if is_update_available(current, v) => {
            format!("Current version: {current}\nLatest version:  {v} (update available)")
        }
        _ => format!("Current version: {current} (up to date)"),
    }
}
