//! Run configuration: feeds, update policy and installer, loaded from YAML.
//!
//! ```yaml
//! feeds:
//!   - https://www.myget.org/F/tools/api/v2
//!   - uri: https://www.nuget.org/api/v2/
//!     packages_uri: https://www.nuget.org/api/v2/Packages
//!     display_name: Official NuGet feed
//! update:
//!   policy: interval
//!   seconds: 86400
//! installer:
//!   kind: nuget
//!   tool: /usr/local/bin/nuget
//! use_got: true
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use goodget_core::{CoreError, Feed, GotFolder, GotNone, GotStore};

use crate::authority::{UpdateAlways, UpdateAuthority, UpdateOnInterval, UpdateUsingFeed};
use crate::error::{io_err, SyncError};
use crate::feed_metadata::FeedMetadata;
use crate::folder::InstallerFactory;
use crate::installer::{DiagnosticInstaller, Installer, NuGetCliInstaller, ToolDownload};
use crate::rest::RestClient;

/// File looked up in a packages folder by [`Config::load_or_default_at`].
pub const CONFIG_FILE_NAME: &str = "goodget.yaml";

/// When recorded packages count as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AuthorityPolicy {
    /// Reinstall everything on every run.
    Always,
    /// Reinstall packages installed more than `seconds` ago.
    Interval { seconds: u64 },
    /// Ask the feed whether the recorded version is still the latest.
    Feed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recency_delay_seconds: Option<u64>,
    },
}

impl Default for AuthorityPolicy {
    fn default() -> Self {
        AuthorityPolicy::Feed {
            recency_delay_seconds: None,
        }
    }
}

/// How packages get fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallerKind {
    Nuget {
        #[serde(default = "default_tool")]
        tool: PathBuf,
        /// Fetch the tool from here when it cannot be found.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        download_url: Option<String>,
    },
    /// Log only; every package "installs" as `version`.
    Diagnostic {
        #[serde(default = "default_diagnostic_version")]
        version: String,
    },
}

impl Default for InstallerKind {
    fn default() -> Self {
        InstallerKind::Nuget {
            tool: default_tool(),
            download_url: None,
        }
    }
}

fn default_tool() -> PathBuf {
    PathBuf::from(NuGetCliInstaller::DEFAULT_TOOL)
}

fn default_diagnostic_version() -> String {
    DiagnosticInstaller::DEFAULT_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feeds registered up front. Packages declared without a feed need
    /// exactly one.
    #[serde(deserialize_with = "deserialize_feeds")]
    pub feeds: Vec<Feed>,
    pub update: AuthorityPolicy,
    pub installer: InstallerKind,
    /// Record installs in `.goodgot`. Without it every run installs everything.
    pub use_got: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: vec![Feed::nuget_official()],
            update: AuthorityPolicy::default(),
            installer: InstallerKind::default(),
            use_got: true,
        }
    }
}

/// A feed is either a bare source uri or a full mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeedCompat {
    Uri(String),
    Full(Feed),
}

fn deserialize_feeds<'de, D>(deserializer: D) -> Result<Vec<Feed>, D::Error>
where
    D: Deserializer<'de>,
{
    let feeds = Vec::<FeedCompat>::deserialize(deserializer)?;
    Ok(feeds
        .into_iter()
        .map(|feed| match feed {
            FeedCompat::Uri(uri) => Feed::from_uri(uri),
            FeedCompat::Full(feed) => feed,
        })
        .collect())
}

impl Config {
    /// Load the config file at `path`.
    ///
    /// Returns `SyncError::ConfigNotFound` if absent,
    /// `SyncError::ConfigParse` (with path) if malformed YAML,
    /// `SyncError::ConfigInvalid` if a value fails [`Config::validate`].
    pub fn load_at(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Err(SyncError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let config: Self =
            serde_yaml::from_str(&contents).map_err(|source| SyncError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate().map_err(|source| SyncError::ConfigInvalid {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    /// Reject values that would only fail later, package by package.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let InstallerKind::Diagnostic { version } = &self.installer {
            goodget_core::version::parse(version)?;
        }
        Ok(())
    }

    /// `<dir>/goodget.yaml` if present, the default config otherwise.
    pub fn load_or_default_at(dir: &Path) -> Result<Self, SyncError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading config");
            Self::load_at(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn build_installer(&self, feed: &Feed) -> Box<dyn Installer> {
        match &self.installer {
            InstallerKind::Nuget { tool, download_url } => {
                let download = download_url.as_ref().map(|url| {
                    let file_name = tool
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| NuGetCliInstaller::DEFAULT_TOOL.to_string());
                    ToolDownload::to_cache(url.clone(), &file_name)
                });
                Box::new(NuGetCliInstaller::new(feed.clone(), tool.clone()).with_download(download))
            }
            InstallerKind::Diagnostic { version } => {
                Box::new(DiagnosticInstaller::with_version(feed.clone(), version.clone()))
            }
        }
    }

    pub fn build_authority(
        &self,
        feed: &Feed,
        client: Arc<dyn RestClient>,
    ) -> Box<dyn UpdateAuthority> {
        match self.update {
            AuthorityPolicy::Always => Box::new(UpdateAlways::new(feed.clone())),
            AuthorityPolicy::Interval { seconds } => Box::new(UpdateOnInterval::new(
                feed.clone(),
                Duration::from_secs(seconds),
            )),
            AuthorityPolicy::Feed {
                recency_delay_seconds,
            } => Box::new(
                UpdateUsingFeed::new(FeedMetadata::new(feed.clone(), client))
                    .with_recency_delay(recency_delay_seconds.map(Duration::from_secs)),
            ),
        }
    }

    pub fn build_got(&self, folder: &Path) -> Box<dyn GotStore> {
        if self.use_got {
            Box::new(GotFolder::new(folder))
        } else {
            Box::new(GotNone)
        }
    }
}

/// [`InstallerFactory`] that builds collaborators from a [`Config`].
pub struct ConfiguredFactory {
    config: Config,
    client: Arc<dyn RestClient>,
}

impl ConfiguredFactory {
    pub fn new(config: Config, client: Arc<dyn RestClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl InstallerFactory for ConfiguredFactory {
    fn create_installer(&self, feed: &Feed) -> Box<dyn Installer> {
        self.config.build_installer(feed)
    }

    fn create_update_authority(&self, feed: &Feed) -> Box<dyn UpdateAuthority> {
        self.config.build_authority(feed, Arc::clone(&self.client))
    }
}
