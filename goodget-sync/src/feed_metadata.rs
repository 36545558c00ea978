//! Feed metadata facade over the NuGet v2 OData endpoint.
//!
//! Only what staleness checks need: "is this version still the latest?".

use std::sync::Arc;

use serde::Deserialize;

use goodget_core::{Feed, PackageId};

use crate::error::{RestError, SyncError};
use crate::rest::RestClient;

/// Package entry fields we read from the feed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PackageEntry {
    #[serde(default)]
    is_absolute_latest_version: Option<bool>,
    #[serde(default)]
    is_latest_version: Option<bool>,
}

/// Verbose OData wraps the entry in `{"d": ...}`; the light format does not.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntryCompat {
    Verbose { d: PackageEntry },
    Light(PackageEntry),
}

/// Queries package metadata from one feed.
#[derive(Clone)]
pub struct FeedMetadata {
    feed: Feed,
    client: Arc<dyn RestClient>,
}

impl FeedMetadata {
    pub fn new(feed: Feed, client: Arc<dyn RestClient>) -> Self {
        Self { feed, client }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    /// `<packages_uri>(Id='<id>',Version='<version>')`
    pub fn entry_uri(&self, id: &PackageId, version: &str) -> String {
        format!(
            "{}(Id='{}',Version='{}')",
            self.feed.packages_uri.trim_end_matches('/'),
            odata_literal(id.as_str()),
            odata_literal(version)
        )
    }

    /// Whether `version` is the newest version of `id` on the feed,
    /// prereleases included. A version the feed does not know is not latest.
    pub fn is_latest_version(&self, id: &PackageId, version: &str) -> Result<bool, SyncError> {
        let uri = self.entry_uri(id, version);
        let body = match self.client.get_json_string(&uri) {
            Ok(body) => body,
            Err(RestError::NotFound { .. }) => {
                tracing::debug!(package = %id, version, "version not on feed");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        let entry = match serde_json::from_str::<EntryCompat>(&body)
            .map_err(|source| SyncError::MetadataFormat { uri, source })?
        {
            EntryCompat::Verbose { d } => d,
            EntryCompat::Light(entry) => entry,
        };
        Ok(entry
            .is_absolute_latest_version
            .or(entry.is_latest_version)
            .unwrap_or(false))
    }
}

impl std::fmt::Debug for FeedMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedMetadata")
            .field("feed", &self.feed)
            .finish_non_exhaustive()
    }
}

/// Quote for an OData string literal: single quotes are doubled.
fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}
