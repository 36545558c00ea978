//! One synchronization run for the packages of one feed.
//!
//! Steps, in order:
//! 1. Ask the got store what is installed; unknown ids are fresh installs.
//! 2. Snapshot the recorded packages and let the update authority mark the
//!    stale ones.
//! 3. Install every fresh package, recording each success.
//! 4. Reinstall every package whose version the authority cleared.
//!
//! A failed install is logged and collected; the run carries on with the
//! next package. Store and authority failures abort the run.

use std::path::Path;

use goodget_core::{CoreError, Feed, FeedPackages, GotStore, Package, PackageId};

use crate::authority::UpdateAuthority;
use crate::error::{InstallError, SyncError};
use crate::installer::Installer;

/// A package that was reinstalled because it was stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedPackage {
    /// The record before the update.
    pub previous: Package,
    /// The record after the update.
    pub package: Package,
}

/// A package that could not be installed.
#[derive(Debug)]
pub struct FailedPackage {
    pub id: PackageId,
    pub error: InstallError,
}

/// Outcome of one feed's run.
#[derive(Debug)]
pub struct FeedSyncResult {
    pub feed: Feed,
    pub installed: Vec<Package>,
    pub updated: Vec<UpdatedPackage>,
    pub failed: Vec<FailedPackage>,
}

impl FeedSyncResult {
    fn new(feed: Feed) -> Self {
        Self {
            feed,
            installed: Vec::new(),
            updated: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Whether at least one package was installed or updated.
    pub fn changed(&self) -> bool {
        !self.installed.is_empty() || !self.updated.is_empty()
    }
}

/// Everything one run needs, borrowed from the caller.
pub struct InstallerContext<'a> {
    folder: &'a Path,
    packages: &'a FeedPackages,
    installer: &'a dyn Installer,
    authority: &'a dyn UpdateAuthority,
    got: &'a dyn GotStore,
}

impl<'a> InstallerContext<'a> {
    pub fn new(
        folder: &'a Path,
        packages: &'a FeedPackages,
        installer: &'a dyn Installer,
        authority: &'a dyn UpdateAuthority,
        got: &'a dyn GotStore,
    ) -> Self {
        Self {
            folder,
            packages,
            installer,
            authority,
            got,
        }
    }

    pub fn run(&self) -> Result<FeedSyncResult, SyncError> {
        let feed = self.packages.feed();
        let mut result = FeedSyncResult::new(feed.clone());
        if self.packages.is_empty() {
            return Ok(result);
        }
        tracing::debug!(feed = %feed, count = self.packages.len(), "synchronizing packages");

        // ---- 1. Partition ----
        let ids = self.packages.packages();
        let records = self.got.get(ids)?;
        let mut fresh = Vec::new();
        let mut updates = Vec::new();
        for (id, record) in ids.iter().zip(records) {
            match record {
                Some(package) => updates.push(package),
                None => fresh.push(Package::bare(id.clone())),
            }
        }

        // ---- 2. Stale check ----
        let currents = updates.clone();
        let outdated = if updates.is_empty() {
            0
        } else {
            self.authority.check_for_updates(&mut updates)?
        };
        tracing::debug!(
            feed = %feed,
            fresh = fresh.len(),
            recorded = currents.len(),
            outdated,
            "checked packages"
        );

        // ---- 3. Fresh installs ----
        for package in &fresh {
            tracing::info!(package = %package.id, feed = %feed, "installing");
            if let Some(installed) = self.install(package, &mut result)? {
                tracing::info!(
                    package = %installed.id,
                    version = installed.version.as_deref().unwrap_or_default(),
                    "installed"
                );
                result.installed.push(installed);
            }
        }

        // ---- 4. Updates ----
        if outdated > 0 {
            for (current, update) in currents.iter().zip(&updates) {
                if update.version.is_some() && update.version == current.version {
                    continue;
                }
                tracing::info!(
                    package = %current.id,
                    from = current.version.as_deref().unwrap_or_default(),
                    "updating"
                );
                if let Some(package) = self.install(update, &mut result)? {
                    tracing::info!(
                        package = %package.id,
                        version = package.version.as_deref().unwrap_or_default(),
                        "updated"
                    );
                    result.updated.push(UpdatedPackage {
                        previous: current.clone(),
                        package,
                    });
                }
            }
        }

        tracing::debug!(
            feed = %feed,
            installed = result.installed.len(),
            updated = result.updated.len(),
            failed = result.failed.len(),
            "synchronized packages"
        );
        Ok(result)
    }

    /// Install and record one package. Install failures land in `result`;
    /// store failures are returned.
    fn install(
        &self,
        package: &Package,
        result: &mut FeedSyncResult,
    ) -> Result<Option<Package>, SyncError> {
        let error = match self.installer.install(self.folder, package) {
            Ok(installed) => match self.got.save(&installed) {
                Ok(saved) => return Ok(Some(saved)),
                // The installer reported a version the store cannot record.
                Err(err @ (CoreError::InvalidVersion { .. } | CoreError::MissingVersion { .. })) => {
                    InstallError::Core(err)
                }
                Err(err) => return Err(err.into()),
            },
            Err(error) => error,
        };

        tracing::error!(package = %package.id, error = %error, "install failed");
        for line in error.output() {
            tracing::error!(package = %package.id, "{line}");
        }
        result.failed.push(FailedPackage {
            id: package.id.clone(),
            error,
        });
        Ok(None)
    }
}
