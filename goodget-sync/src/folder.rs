//! A packages folder: the declared packages per feed and the runs that keep
//! them installed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use goodget_core::{Feed, FeedPackages, GotStore, PackageId};

use crate::authority::UpdateAuthority;
use crate::config::{Config, ConfiguredFactory};
use crate::context::{FailedPackage, FeedSyncResult, InstallerContext};
use crate::error::{io_err, SyncError};
use crate::installer::Installer;
use crate::rest::UreqRestClient;

/// Builds the per-feed collaborators of a run.
pub trait InstallerFactory: Send + Sync {
    fn create_installer(&self, feed: &Feed) -> Box<dyn Installer>;
    fn create_update_authority(&self, feed: &Feed) -> Box<dyn UpdateAuthority>;
}

/// Outcome of [`PackagesFolder::synchronize`], one entry per feed with
/// declared packages.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub feeds: Vec<FeedSyncResult>,
}

impl SyncReport {
    /// Whether any package was installed or updated.
    pub fn changed(&self) -> bool {
        self.feeds.iter().any(FeedSyncResult::changed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailedPackage> {
        self.feeds.iter().flat_map(|feed| feed.failed.iter())
    }

    /// `Ok(changed)` when every package made it, `SyncError::InstallFailures`
    /// otherwise.
    pub fn into_result(self) -> Result<bool, SyncError> {
        let failed: Vec<String> = self.failures().map(|f| f.id.to_string()).collect();
        if failed.is_empty() {
            Ok(self.changed())
        } else {
            Err(SyncError::InstallFailures { failed })
        }
    }
}

/// The packages declared for one target folder, grouped by feed in
/// declaration order.
pub struct PackagesFolder {
    path: PathBuf,
    feeds: Vec<FeedPackages>,
    factory: Box<dyn InstallerFactory>,
    got: Box<dyn GotStore>,
}

impl PackagesFolder {
    /// A folder at `path` set up from `config`: its feeds are registered and
    /// its policies pick the installer, update authority and got store.
    pub fn new(path: impl AsRef<Path>, config: Config) -> Result<Self, SyncError> {
        let path = absolute(path.as_ref())?;
        let got = config.build_got(&path);
        let feeds = config.feeds.clone();
        let factory = ConfiguredFactory::new(config, Arc::new(UreqRestClient::new()));
        Ok(Self::with_parts(path, feeds, Box::new(factory), got))
    }

    /// A folder with explicit collaborators.
    pub fn with_parts(
        path: PathBuf,
        feeds: Vec<Feed>,
        factory: Box<dyn InstallerFactory>,
        got: Box<dyn GotStore>,
    ) -> Self {
        let mut folder = Self {
            path,
            feeds: Vec::new(),
            factory,
            got,
        };
        for feed in feeds {
            folder.add_feed(feed);
        }
        folder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn feeds(&self) -> &[FeedPackages] {
        &self.feeds
    }

    /// Register `feed`. Returns `false` if it already was.
    pub fn add_feed(&mut self, feed: Feed) -> bool {
        if self.feeds.iter().any(|fp| fp.feed() == &feed) {
            return false;
        }
        self.feeds.push(FeedPackages::new(feed));
        true
    }

    /// Declare package `id`, to be installed from `feed`, or from the only
    /// registered feed when `feed` is `None`. An unknown feed is registered.
    /// Declaring the same package twice for a feed is a no-op.
    pub fn add_package(&mut self, id: &str, feed: Option<&Feed>) -> Result<(), SyncError> {
        let id = PackageId::parse(id)?;
        let index = match feed {
            Some(feed) => match self.feeds.iter().position(|fp| fp.feed() == feed) {
                Some(index) => index,
                None => {
                    self.feeds.push(FeedPackages::new(feed.clone()));
                    self.feeds.len() - 1
                }
            },
            None => match self.feeds.len() {
                0 => {
                    return Err(SyncError::NoFeed {
                        package: id.to_string(),
                    })
                }
                1 => 0,
                count => {
                    return Err(SyncError::AmbiguousFeed {
                        package: id.to_string(),
                        count,
                    })
                }
            },
        };
        if !self.feeds[index].add(id.clone()) {
            tracing::debug!(package = %id, "package already declared");
        }
        Ok(())
    }

    /// Install or update every declared package, one feed after the other.
    pub fn synchronize(&self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        if self.feeds.iter().all(FeedPackages::is_empty) {
            return Ok(report);
        }
        std::fs::create_dir_all(&self.path).map_err(|e| io_err(&self.path, e))?;

        for packages in self.feeds.iter().filter(|fp| !fp.is_empty()) {
            let installer = self.factory.create_installer(packages.feed());
            let authority = self.factory.create_update_authority(packages.feed());
            let context = InstallerContext::new(
                &self.path,
                packages,
                installer.as_ref(),
                authority.as_ref(),
                self.got.as_ref(),
            );
            report.feeds.push(context.run()?);
        }
        Ok(report)
    }
}

/// Declare `ids` against the single feed of `config` in the folder at `path`
/// and synchronize.
pub fn install_packages<I, S>(path: impl AsRef<Path>, ids: I, config: Config) -> Result<SyncReport, SyncError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut folder = PackagesFolder::new(path, config)?;
    for id in ids {
        folder.add_package(id.as_ref(), None)?;
    }
    folder.synchronize()
}

fn absolute(path: &Path) -> Result<PathBuf, SyncError> {
    std::path::absolute(path).map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use goodget_core::{CoreError, GotNone};

    use crate::authority::UpdateAlways;
    use crate::installer::DiagnosticInstaller;

    struct Diagnostics;

    impl InstallerFactory for Diagnostics {
        fn create_installer(&self, feed: &Feed) -> Box<dyn Installer> {
            Box::new(DiagnosticInstaller::new(feed.clone()))
        }

        fn create_update_authority(&self, feed: &Feed) -> Box<dyn UpdateAuthority> {
            Box::new(UpdateAlways::new(feed.clone()))
        }
    }

    fn folder(feeds: Vec<Feed>) -> PackagesFolder {
        PackagesFolder::with_parts(
            PathBuf::from("/nonexistent/packages"),
            feeds,
            Box::new(Diagnostics),
            Box::new(GotNone),
        )
    }

    #[test]
    fn add_package_uses_the_only_feed() {
        let mut folder = folder(vec![Feed::nuget_official()]);
        folder.add_package("NUnit", None).unwrap();
        folder.add_package("NUnit", None).unwrap();
        assert_eq!(folder.feeds()[0].packages().len(), 1);
    }

    #[test]
    fn add_package_without_feeds_fails() {
        let mut folder = folder(vec![]);
        let err = folder.add_package("NUnit", None).unwrap_err();
        assert!(matches!(err, SyncError::NoFeed { ref package } if package == "NUnit"));
    }

    #[test]
    fn add_package_with_several_feeds_needs_a_feed() {
        let mut folder = folder(vec![
            Feed::nuget_official(),
            Feed::from_uri("https://example.org/nuget"),
        ]);
        let err = folder.add_package("NUnit", None).unwrap_err();
        assert!(matches!(err, SyncError::AmbiguousFeed { count: 2, .. }));
    }

    #[test]
    fn add_package_registers_unknown_feed() {
        let mut folder = folder(vec![Feed::nuget_official()]);
        let other = Feed::from_uri("https://example.org/nuget");
        folder.add_package("Tool", Some(&other)).unwrap();
        assert_eq!(folder.feeds().len(), 2);
        assert!(folder.feeds()[1].contains(&PackageId::parse("Tool").unwrap()));
        assert!(!folder.add_feed(other));
    }

    #[test]
    fn add_package_rejects_invalid_id() {
        let mut folder = folder(vec![Feed::nuget_official()]);
        let err = folder.add_package("../evil", None).unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::InvalidPackageId { .. })));
    }

    #[test]
    fn synchronize_without_packages_does_not_create_folder() {
        let report = folder(vec![Feed::nuget_official()]).synchronize().unwrap();
        assert!(report.feeds.is_empty());
        assert!(!report.changed());
        assert!(!Path::new("/nonexistent/packages").exists());
    }

    #[test]
    fn report_into_result_lists_failures() {
        let mut feed = FeedSyncResult {
            feed: Feed::nuget_official(),
            installed: vec![],
            updated: vec![],
            failed: vec![],
        };
        feed.failed.push(FailedPackage {
            id: PackageId::parse("A").unwrap(),
            error: crate::error::InstallError::ToolNotFound {
                tool: PathBuf::from("nuget"),
            },
        });
        let report = SyncReport { feeds: vec![feed] };
        assert_eq!(report.failures().count(), 1);
        match report.into_result().unwrap_err() {
            SyncError::InstallFailures { failed } => assert_eq!(failed, vec!["A".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
