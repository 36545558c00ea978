//! Package version validation.
//!
//! Versions are kept as the strings the feed published; this module only
//! decides whether a string is a compatible version, i.e.
//! `major[.minor[.patch[.revision]]][-prerelease][+metadata]`.

use std::fmt;

use crate::error::CoreError;

/// A parsed, compatible package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    raw: String,
    release: Vec<u64>,
    prerelease: Option<String>,
    metadata: Option<String>,
}

impl PackageVersion {
    /// Numeric release components, e.g. `[1, 2, 3]` for `1.2.3-beta`.
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// The prerelease label without its leading hyphen.
    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }

    /// Build metadata without its leading plus.
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(f)
    }
}

/// Parse `raw` as a package version.
pub fn parse(raw: &str) -> Result<PackageVersion, CoreError> {
    let invalid = |reason| CoreError::InvalidVersion {
        version: raw.to_owned(),
        reason,
    };

    if raw.is_empty() {
        return Err(invalid("empty"));
    }

    let (rest, metadata) = match raw.split_once('+') {
        Some((rest, meta)) => {
            if !is_label(meta) {
                return Err(invalid("malformed build metadata"));
            }
            (rest, Some(meta.to_owned()))
        }
        None => (raw, None),
    };

    let (release_part, prerelease) = match rest.split_once('-') {
        Some((release, pre)) => {
            if !is_label(pre) {
                return Err(invalid("malformed prerelease label"));
            }
            (release, Some(pre.to_owned()))
        }
        None => (rest, None),
    };

    let mut release = Vec::new();
    for component in release_part.split('.') {
        if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("release components must be numeric"));
        }
        let value = component
            .parse::<u64>()
            .map_err(|_| invalid("release component out of range"))?;
        release.push(value);
    }
    if release.len() > 4 {
        return Err(invalid("more than four release components"));
    }

    Ok(PackageVersion {
        raw: raw.to_owned(),
        release,
        prerelease,
        metadata,
    })
}

/// `true` if `raw` is a compatible version string.
pub fn is_compatible(raw: &str) -> bool {
    parse(raw).is_ok()
}

fn is_label(label: &str) -> bool {
    !label.is_empty()
        && label.split('.').all(|part| !part.is_empty())
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}
