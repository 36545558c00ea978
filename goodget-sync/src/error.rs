//! Error types for goodget-sync.

use std::path::PathBuf;

use thiserror::Error;

use goodget_core::CoreError;

/// All errors that can arise from synchronization runs and their setup.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the got store or core types.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A package was declared without a feed and no feed is registered.
    #[error("no feeds registered to add package '{package}' to; add at least one feed")]
    NoFeed { package: String },

    /// A package was declared without a feed and several feeds are registered.
    #[error("{count} feeds registered; specify the feed to add package '{package}' to")]
    AmbiguousFeed { package: String, count: usize },

    /// A request to a feed failed.
    #[error("feed request failed: {0}")]
    Rest(#[from] RestError),

    /// A feed answered with something that is not the metadata we expect.
    #[error("unexpected metadata from {uri}: {source}")]
    MetadataFormat {
        uri: String,
        #[source]
        source: serde_json::Error,
    },

    /// A configured option that has no implementation.
    #[error("{0} is not supported")]
    Unsupported(&'static str),

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// YAML parse error on config load, with file path.
    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config parsed but holds a value that cannot be used.
    #[error("invalid config at {path}: {source}")]
    ConfigInvalid {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    /// One or more packages failed to install; the rest of the run completed.
    #[error("{} package(s) failed to install: {}", failed.len(), failed.join(", "))]
    InstallFailures { failed: Vec<String> },
}

/// Failure to install one package.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The fetch tool could not be found (and could not be downloaded).
    #[error("{} not found", tool.display())]
    ToolNotFound { tool: PathBuf },

    /// The fetch tool could not be started.
    #[error("failed to run {}: {source}", tool.display())]
    Spawn {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fetch tool ran and reported failure.
    #[error("{} failed with {}", tool.display(), exit_label(*code))]
    ToolFailed {
        tool: PathBuf,
        code: Option<i32>,
        output: Vec<String>,
    },

    /// Downloading the fetch tool failed.
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// The tool succeeded but left no `<id>.<version>` directory behind.
    #[error("no installed directory for '{id}' found in {}", dir.display())]
    NotInstalled { id: String, dir: PathBuf },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    /// Output captured from the fetch tool, if any.
    pub fn output(&self) -> &[String] {
        match self {
            InstallError::ToolFailed { output, .. } => output,
            _ => &[],
        }
    }
}

/// Failure to fetch a document from a feed.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("{uri} not found")]
    NotFound { uri: String },

    #[error("{uri} answered HTTP {status}")]
    Status { uri: String, status: u16 },

    #[error("request to {uri} failed: {reason}")]
    Transport { uri: String, reason: String },

    #[error("failed to read response from {uri}: {source}")]
    Read {
        uri: String,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`InstallError::Io`].
pub(crate) fn install_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> InstallError {
    InstallError::Io {
        path: path.into(),
        source,
    }
}
