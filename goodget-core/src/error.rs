//! Error types for goodget-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from core types and the got store.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, with the path that was being accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A package id that cannot be used as an identity (and file name).
    #[error("invalid package id '{id}': {reason}")]
    InvalidPackageId { id: String, reason: &'static str },

    /// A version string that is not a compatible package version.
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion {
        version: String,
        reason: &'static str,
    },

    /// Only packages with a known version can be recorded.
    #[error("cannot record package '{id}' without a version")]
    MissingVersion { id: String },
}

/// Convenience constructor for [`CoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
