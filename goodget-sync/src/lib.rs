//! goodget-sync: keeps a packages folder in sync with its feeds.
//!
//! A [`PackagesFolder`] holds the declared packages per feed. Each
//! [`synchronize`](PackagesFolder::synchronize) runs one [`InstallerContext`]
//! per feed: fresh packages are installed, recorded ones are checked by an
//! [`UpdateAuthority`] and reinstalled when stale, and every success is
//! recorded in the got store.

pub mod authority;
pub mod config;
pub mod context;
pub mod error;
pub mod feed_metadata;
pub mod folder;
pub mod installer;
pub mod rest;

pub use authority::{UpdateAlways, UpdateAuthority, UpdateOnInterval, UpdateUsingFeed};
pub use config::{AuthorityPolicy, Config, ConfiguredFactory, InstallerKind, CONFIG_FILE_NAME};
pub use context::{FailedPackage, FeedSyncResult, InstallerContext, UpdatedPackage};
pub use error::{InstallError, RestError, SyncError};
pub use feed_metadata::FeedMetadata;
pub use folder::{install_packages, InstallerFactory, PackagesFolder, SyncReport};
pub use installer::{DiagnosticInstaller, Installer, NuGetCliInstaller, ToolDownload};
pub use rest::{RestClient, UreqRestClient};
