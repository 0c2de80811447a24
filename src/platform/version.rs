use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use semver::Prerelease;
use thiserror::Error;

static BREW_REVISION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\d+$").expect("valid revision regex"));

static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(\d+(?:\.\d+)*)(?:-([0-9A-Za-z.-]+))?(?:\+[0-9A-Za-z.-]+)?$")
        .expect("valid version regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("malformed version: {0:?}")]
    Malformed(String),

    #[error("invalid pre-release in {version:?}: {reason}")]
    Prerelease { version: String, reason: String },
}

/// Remove the Homebrew revision suffix (`2.52.0_1` -> `2.52.0`). Revisions
/// mark a rebuilt bottle of the same upstream version.
pub fn strip_brew_revision(version: &str) -> String {
    BREW_REVISION.replace(version, "").into_owned()
}

/// A leniently parsed package version.
///
/// Accepts any number of dot-separated numeric segments (leading zeros
/// allowed, as in `2026.01.12.00`), an optional leading `v`, an optional
/// `-prerelease` and an optional `+build` which is ignored. The first three
/// segments and the pre-release follow semver ordering; further segments
/// break ties numerically, and missing segments count as zero.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    segments: Vec<u64>,
    pre: Prerelease,
    original: String,
}

impl PackageVersion {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let caps = VERSION
            .captures(trimmed)
            .ok_or_else(|| VersionError::Malformed(input.to_string()))?;

        let segments = caps[1]
            .split('.')
            .map(|s| s.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError::Malformed(input.to_string()))?;

        let pre = match caps.get(2) {
            Some(m) => Prerelease::new(m.as_str()).map_err(|e| VersionError::Prerelease {
                version: input.to_string(),
                reason: e.to_string(),
            })?,
            None => Prerelease::EMPTY,
        };

        Ok(Self {
            segments,
            pre,
            original: trimmed.to_string(),
        })
    }

    /// The first three segments as a semver version.
    pub fn to_semver(&self) -> semver::Version {
        let mut version = semver::Version::new(self.segment(0), self.segment(1), self.segment(2));
        version.pre = self.pre.clone();
        version
    }

    fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }

    fn extra_segments_cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (3..len)
            .map(|i| self.segment(i).cmp(&other.segment(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl FromStr for PackageVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.to_semver(), other.to_semver());
        (a.major, a.minor, a.patch)
            .cmp(&(b.major, b.minor, b.patch))
            .then_with(|| self.extra_segments_cmp(other))
            .then_with(|| a.pre.cmp(&b.pre))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
