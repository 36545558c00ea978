//! Domain types for GoodGet.
//!
//! A [`Feed`] is a remote package source, a [`Package`] is one synchronized
//! unit and [`FeedPackages`] is the set of package ids declared against one
//! feed.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A validated package identity.
///
/// Ids double as file names in the got store and in the packages folder, so
/// anything that is not a single plain path component is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    /// Parse and validate a package id.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let reason = if raw.trim().is_empty() {
            Some("empty")
        } else if raw.chars().any(char::is_whitespace) {
            Some("contains whitespace")
        } else if raw.chars().any(char::is_control) {
            Some("contains control characters")
        } else if raw.contains(['/', '\\']) {
            Some("contains a path separator")
        } else if raw.starts_with('.') {
            Some("starts with a dot")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(CoreError::InvalidPackageId {
                id: raw.to_owned(),
                reason,
            }),
            None => Ok(Self(raw.to_owned())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for PackageId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// A remote package source, e.g. the official NuGet feed or a MyGet feed.
///
/// Identity is the `uri` alone: two feeds with the same `uri` are the same
/// feed whatever their other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    /// The source itself, as passed to the fetch tool (`-Source`).
    pub uri: String,
    /// Where package metadata lives, for OData/REST queries.
    pub packages_uri: String,
    /// Human-friendly name used in progress output.
    pub display_name: String,
}

impl Feed {
    pub const NUGET_OFFICIAL_URI: &'static str = "https://www.nuget.org/api/v2/";

    pub fn new(
        uri: impl Into<String>,
        packages_uri: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            packages_uri: packages_uri.into(),
            display_name: display_name.into(),
        }
    }

    /// A feed known only by its source uri. The metadata endpoint follows the
    /// NuGet v2 convention (`<uri>/Packages`) and the uri doubles as the name.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let packages_uri = format!("{}/Packages", uri.trim_end_matches('/'));
        Self {
            display_name: uri.clone(),
            packages_uri,
            uri,
        }
    }

    /// The official NuGet feed.
    pub fn nuget_official() -> Self {
        Self::new(
            Self::NUGET_OFFICIAL_URI,
            "https://www.nuget.org/api/v2/Packages",
            "Official NuGet feed",
        )
    }
}

impl PartialEq for Feed {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Feed {}

impl Hash for Feed {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.display_name.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Package
// ---------------------------------------------------------------------------

/// A package GoodGet got, or is about to get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    /// `None` means unknown: the package needs installing or re-checking.
    pub version: Option<String>,
    /// When the package was last installed or updated.
    pub installed_at: Option<DateTime<Utc>>,
}

impl Package {
    /// A package declared for installation, with nothing known about it.
    pub fn bare(id: PackageId) -> Self {
        Self {
            id,
            version: None,
            installed_at: None,
        }
    }

    /// A package installed in `version` at `installed_at`.
    pub fn installed(id: PackageId, version: impl Into<String>, installed_at: DateTime<Utc>) -> Self {
        Self {
            id,
            version: Some(version.into()),
            installed_at: Some(installed_at),
        }
    }
}

/// Current time at the resolution the got store persists (whole seconds).
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

// ---------------------------------------------------------------------------
// FeedPackages
// ---------------------------------------------------------------------------

/// The set of package ids declared against one [`Feed`], in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPackages {
    feed: Feed,
    packages: Vec<PackageId>,
}

impl FeedPackages {
    pub fn new(feed: Feed) -> Self {
        Self {
            feed,
            packages: Vec::new(),
        }
    }

    /// Declare `id` for this feed. Returns `false` if it already was.
    pub fn add(&mut self, id: PackageId) -> bool {
        if self.packages.contains(&id) {
            return false;
        }
        self.packages.push(id);
        true
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn packages(&self) -> &[PackageId] {
        &self.packages
    }

    pub fn contains(&self, id: &PackageId) -> bool {
        self.packages.contains(id)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
