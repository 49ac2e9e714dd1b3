use std::cmp::Reverse;

use semver::Version;

use crate::catalog::VersionRecord;

/// Parses a chart version the way chart repositories write them.
///
/// Accepts an optional leading `v` and missing minor or patch components
/// (`1.2` reads as `1.2.0`); pre-release and build suffixes follow SemVer 2.0.
pub fn parse_chart_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if let Ok(version) = Version::parse(body) {
        return Some(version);
    }

    let split = body.find(|c: char| c == '-' || c == '+').unwrap_or(body.len());
    let (core, suffix) = body.split_at(split);
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3
        || parts
            .iter()
            .any(|part| part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&format!("{}{suffix}", parts.join("."))).ok()
}

/// Sorts records newest first.
///
/// Records whose version does not parse are ordered after every parseable
/// one and keep their relative order.
// TODO: revisit whether unparseable versions should be rejected outright
// instead of being treated as the oldest entries.
pub fn sort_versions(records: &mut [VersionRecord]) {
    records.sort_by_cached_key(|record| Reverse(parse_chart_version(&record.version)));
}
