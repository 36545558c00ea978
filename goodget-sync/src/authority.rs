//! Update authorities: which installed packages are stale.
//!
//! Every authority takes the batch of recorded packages, clears `version` to
//! `None` on the ones it considers stale and returns how many that was.
//! Packages are never removed from the batch.
//!
//! | Authority          | Stale when                                        |
//! |--------------------|---------------------------------------------------|
//! | [`UpdateAlways`]     | always                                            |
//! | [`UpdateOnInterval`] | never installed, or installed longer ago than the interval |
//! | [`UpdateUsingFeed`]  | the feed says the recorded version is not the latest |

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use goodget_core::{Feed, Package};

use crate::error::SyncError;
use crate::feed_metadata::FeedMetadata;

/// Decides which packages of a batch are stale.
pub trait UpdateAuthority: Send + Sync {
    /// The feed this authority consults.
    fn feed(&self) -> &Feed;

    /// Clear `version` on every stale package and return the number of stale
    /// packages. An empty batch returns 0.
    fn check_for_updates(&self, packages: &mut [Package]) -> Result<usize, SyncError>;
}

// ---------------------------------------------------------------------------
// UpdateAlways
// ---------------------------------------------------------------------------

/// Every package is stale on every check.
#[derive(Debug, Clone)]
pub struct UpdateAlways {
    feed: Feed,
}

impl UpdateAlways {
    pub fn new(feed: Feed) -> Self {
        Self { feed }
    }
}

impl UpdateAuthority for UpdateAlways {
    fn feed(&self) -> &Feed {
        &self.feed
    }

    fn check_for_updates(&self, packages: &mut [Package]) -> Result<usize, SyncError> {
        for package in packages.iter_mut() {
            package.version = None;
        }
        Ok(packages.len())
    }
}

// ---------------------------------------------------------------------------
// UpdateOnInterval
// ---------------------------------------------------------------------------

/// A package is stale once `interval` has elapsed since it was installed.
#[derive(Debug, Clone)]
pub struct UpdateOnInterval {
    feed: Feed,
    interval: TimeDelta,
}

impl UpdateOnInterval {
    pub fn new(feed: Feed, interval: Duration) -> Self {
        Self {
            feed,
            interval: TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// [`UpdateAuthority::check_for_updates`] against an explicit clock.
    ///
    /// Exactly `interval` old is still current.
    pub fn check_at(&self, packages: &mut [Package], now: DateTime<Utc>) -> usize {
        let mut stale = 0;
        for package in packages.iter_mut() {
            let expired = match package.installed_at {
                None => true,
                Some(installed_at) => now.signed_duration_since(installed_at) > self.interval,
            };
            if expired {
                package.version = None;
                stale += 1;
            }
        }
        stale
    }
}

impl UpdateAuthority for UpdateOnInterval {
    fn feed(&self) -> &Feed {
        &self.feed
    }

    fn check_for_updates(&self, packages: &mut [Package]) -> Result<usize, SyncError> {
        Ok(self.check_at(packages, Utc::now()))
    }
}

// ---------------------------------------------------------------------------
// UpdateUsingFeed
// ---------------------------------------------------------------------------

/// A package is stale when its recorded version is no longer the latest on
/// the feed. One metadata request per package.
#[derive(Debug, Clone)]
pub struct UpdateUsingFeed {
    metadata: FeedMetadata,
    recency_delay: Option<Duration>,
}

impl UpdateUsingFeed {
    pub fn new(metadata: FeedMetadata) -> Self {
        Self {
            metadata,
            recency_delay: None,
        }
    }

    /// Reserved: checks fail with [`SyncError::Unsupported`] while set.
    pub fn with_recency_delay(mut self, delay: Option<Duration>) -> Self {
        self.recency_delay = delay;
        self
    }
}

impl UpdateAuthority for UpdateUsingFeed {
    fn feed(&self) -> &Feed {
        self.metadata.feed()
    }

    fn check_for_updates(&self, packages: &mut [Package]) -> Result<usize, SyncError> {
        if self.recency_delay.is_some() {
            return Err(SyncError::Unsupported("recency delay"));
        }

        // Query everything first so a failure leaves the batch untouched.
        let mut stale = Vec::with_capacity(packages.len());
        for package in packages.iter() {
            let is_stale = match package.version.as_deref() {
                None => true,
                Some(version) => !self.metadata.is_latest_version(&package.id, version)?,
            };
            if is_stale {
                tracing::debug!(package = %package.id, version = ?package.version, "outdated");
            }
            stale.push(is_stale);
        }

        let mut count = 0;
        for (package, is_stale) in packages.iter_mut().zip(stale) {
            if is_stale {
                package.version = None;
                count += 1;
            }
        }
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Age formatting
// ---------------------------------------------------------------------------

/// Compact age of a timestamp, e.g. `"3d"`, for progress and listings.
pub fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    format_seconds(seconds)
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::TimeZone;
    use goodget_core::PackageId;

    use crate::error::RestError;
    use crate::rest::RestClient;

    fn id(s: &str) -> PackageId {
        PackageId::parse(s).unwrap()
    }

    fn recorded(name: &str, version: &str, at: DateTime<Utc>) -> Package {
        Package::installed(id(name), version, at)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    // -- always ------------------------------------------------------------

    #[test]
    fn always_clears_every_version() {
        let authority = UpdateAlways::new(Feed::nuget_official());
        let mut batch = vec![recorded("A", "1.0.0", now()), recorded("B", "2.0.0", now())];
        assert_eq!(authority.check_for_updates(&mut batch).unwrap(), 2);
        assert!(batch.iter().all(|p| p.version.is_none()));
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn empty_batch_is_zero_for_every_authority() {
        let feed = Feed::nuget_official();
        let mut empty: Vec<Package> = vec![];
        assert_eq!(UpdateAlways::new(feed.clone()).check_for_updates(&mut empty).unwrap(), 0);
        assert_eq!(
            UpdateOnInterval::new(feed.clone(), Duration::from_secs(60))
                .check_for_updates(&mut empty)
                .unwrap(),
            0
        );
        let client = Arc::new(ScriptedClient::default());
        let using_feed = UpdateUsingFeed::new(FeedMetadata::new(feed, client.clone()));
        assert_eq!(using_feed.check_for_updates(&mut empty).unwrap(), 0);
        assert!(client.requests.lock().unwrap().is_empty());
    }

    // -- interval ----------------------------------------------------------

    #[test]
    fn interval_boundary_is_not_stale() {
        let interval = Duration::from_secs(24 * 60 * 60);
        let authority = UpdateOnInterval::new(Feed::nuget_official(), interval);
        let exactly = now() - TimeDelta::from_std(interval).unwrap();
        let mut batch = vec![recorded("A", "1.0.0", exactly)];
        assert_eq!(authority.check_at(&mut batch, now()), 0);
        assert_eq!(batch[0].version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn interval_one_tick_past_boundary_is_stale() {
        let interval = Duration::from_secs(24 * 60 * 60);
        let authority = UpdateOnInterval::new(Feed::nuget_official(), interval);
        let past = now() - TimeDelta::from_std(interval).unwrap() - TimeDelta::nanoseconds(1);
        let mut batch = vec![recorded("A", "1.0.0", past)];
        assert_eq!(authority.check_at(&mut batch, now()), 1);
        assert!(batch[0].version.is_none());
    }

    #[test]
    fn interval_without_install_time_is_stale() {
        let authority = UpdateOnInterval::new(Feed::nuget_official(), Duration::from_secs(60));
        let mut package = recorded("A", "1.0.0", now());
        package.installed_at = None;
        let mut batch = vec![package, recorded("B", "1.0.0", now())];
        assert_eq!(authority.check_at(&mut batch, now()), 1);
        assert!(batch[0].version.is_none());
        assert_eq!(batch[1].version.as_deref(), Some("1.0.0"));
    }

    // -- feed --------------------------------------------------------------

    #[derive(Default)]
    struct ScriptedClient {
        latest: HashMap<String, bool>,
        fail_on: Option<String>,
        requests: Mutex<Vec<String>>,
    }

    impl RestClient for ScriptedClient {
        fn get_json_string(&self, uri: &str) -> Result<String, RestError> {
            self.requests.lock().unwrap().push(uri.to_string());
            if self.fail_on.as_deref().is_some_and(|f| uri.contains(f)) {
                return Err(RestError::Transport {
                    uri: uri.to_string(),
                    reason: "connection reset".into(),
                });
            }
            for (needle, latest) in &self.latest {
                if uri.contains(needle.as_str()) {
                    return Ok(format!(r#"{{"d":{{"IsAbsoluteLatestVersion":{latest}}}}}"#));
                }
            }
            Err(RestError::NotFound {
                uri: uri.to_string(),
            })
        }
    }

    fn using_feed(client: ScriptedClient) -> UpdateUsingFeed {
        UpdateUsingFeed::new(FeedMetadata::new(Feed::nuget_official(), Arc::new(client)))
    }

    #[test]
    fn feed_authority_clears_only_outdated_versions() {
        let client = ScriptedClient {
            latest: HashMap::from([
                ("Id='A'".to_string(), true),
                ("Id='B'".to_string(), false),
            ]),
            ..Default::default()
        };
        let authority = using_feed(client);
        let mut batch = vec![recorded("A", "1.0.0", now()), recorded("B", "1.0.0", now())];
        assert_eq!(authority.check_for_updates(&mut batch).unwrap(), 1);
        assert_eq!(batch[0].version.as_deref(), Some("1.0.0"));
        assert!(batch[1].version.is_none());
    }

    #[test]
    fn feed_authority_treats_unknown_version_as_stale() {
        let authority = using_feed(ScriptedClient::default());
        let mut batch = vec![recorded("Gone", "0.0.1", now())];
        assert_eq!(authority.check_for_updates(&mut batch).unwrap(), 1);
        assert!(batch[0].version.is_none());
    }

    #[test]
    fn feed_authority_network_failure_leaves_batch_untouched() {
        let client = ScriptedClient {
            latest: HashMap::from([("Id='A'".to_string(), false)]),
            fail_on: Some("Id='B'".to_string()),
            ..Default::default()
        };
        let authority = using_feed(client);
        let mut batch = vec![recorded("A", "1.0.0", now()), recorded("B", "1.0.0", now())];
        let before = batch.clone();
        let err = authority.check_for_updates(&mut batch).unwrap_err();
        assert!(matches!(err, SyncError::Rest(RestError::Transport { .. })));
        assert_eq!(batch, before);
    }

    #[test]
    fn recency_delay_is_rejected() {
        let authority = using_feed(ScriptedClient::default())
            .with_recency_delay(Some(Duration::from_secs(3600)));
        let mut batch = vec![recorded("A", "1.0.0", now())];
        let err = authority.check_for_updates(&mut batch).unwrap_err();
        assert!(matches!(err, SyncError::Unsupported(_)));
        assert_eq!(batch[0].version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn ages_are_compact() {
        assert_eq!(format_seconds(5), "5s");
        assert_eq!(format_seconds(65), "1m");
        assert_eq!(format_seconds(2 * 60 * 60 + 5), "2h");
        assert_eq!(format_seconds(3 * 24 * 60 * 60), "3d");
        assert_eq!(format_age(Utc::now()), "0s");
    }
}
