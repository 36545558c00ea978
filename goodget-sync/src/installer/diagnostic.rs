use std::path::Path;

use goodget_core::types::timestamp_now;
use goodget_core::{Feed, Package};

use super::Installer;
use crate::error::InstallError;

/// Installer that only reports what it would do and "installs" a fixed
/// version. Nothing on disk is touched.
#[derive(Debug, Clone)]
pub struct DiagnosticInstaller {
    feed: Feed,
    version: String,
}

impl DiagnosticInstaller {
    pub const DEFAULT_VERSION: &'static str = "1.2.3";

    pub fn new(feed: Feed) -> Self {
        Self::with_version(feed, Self::DEFAULT_VERSION)
    }

    pub fn with_version(feed: Feed, version: impl Into<String>) -> Self {
        Self {
            feed,
            version: version.into(),
        }
    }
}

impl Installer for DiagnosticInstaller {
    fn feed(&self) -> &Feed {
        &self.feed
    }

    fn install(&self, target: &Path, package: &Package) -> Result<Package, InstallError> {
        tracing::info!(
            package = %package.id,
            feed = %self.feed,
            target = %target.display(),
            version = %self.version,
            "would install"
        );
        Ok(Package::installed(
            package.id.clone(),
            self.version.clone(),
            timestamp_now(),
        ))
    }
}
