//! Got store: what version of each package was last fetched, and when.
//!
//! # Storage layout
//!
//! ```text
//! <packages folder>/
//!   .goodgot/
//!     <package id>     one line: "<version> <yyyyMMddHH:mm:ss>"
//! ```
//!
//! e.g. `1.2.3-alpha 2013121710:08:03`. Timestamps are UTC.
//!
//! Writes go to a `.<id>.tmp` sibling and are renamed into place, so saves
//! for different ids never touch the same file. A record that cannot be
//! parsed is reported as absent, never as an error.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{io_err, CoreError};
use crate::types::{timestamp_now, Package, PackageId};
use crate::version;

/// Name of the hidden directory holding got records.
pub const GOT_DIR: &str = ".goodgot";

/// chrono pattern for record timestamps (`yyyyMMddHH:mm:ss`).
pub const TIME_FORMAT: &str = "%Y%m%d%H:%M:%S";

const TIME_LEN: usize = 16;

/// Persistent record of the packages we got.
pub trait GotStore: Send + Sync {
    /// Look up `ids`. The result has the same length and order as `ids`;
    /// ids with no (readable) record map to `None`.
    fn get(&self, ids: &[PackageId]) -> Result<Vec<Option<Package>>, CoreError>;

    /// Record `package`, overwriting any previous record for its id.
    ///
    /// The package must have a version. A missing `installed_at` is filled
    /// with the current time. Returns the record as persisted.
    fn save(&self, package: &Package) -> Result<Package, CoreError>;
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<folder>/.goodgot/`: pure, no I/O.
pub fn got_dir_at(folder: &Path) -> PathBuf {
    folder.join(GOT_DIR)
}

/// `<folder>/.goodgot/<id>`: pure, no I/O.
pub fn record_path_at(folder: &Path, id: &PackageId) -> PathBuf {
    got_dir_at(folder).join(id.as_str())
}

// ---------------------------------------------------------------------------
// 2. Record format
// ---------------------------------------------------------------------------

/// Serialize a record line (without trailing newline).
pub fn serialize_record(version: &str, installed_at: DateTime<Utc>) -> String {
    format!("{} {}", version, installed_at.format(TIME_FORMAT))
}

/// Parse a record line for `id`. Anything but exactly
/// `<compatible version> <timestamp>` yields `None`.
pub fn parse_record(id: &PackageId, line: &str) -> Option<Package> {
    let mut tokens = line.split(' ');
    let (Some(version), Some(time), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return None;
    };
    if !version::is_compatible(version) {
        return None;
    }
    let installed_at = parse_time(time)?;
    Some(Package::installed(id.clone(), version, installed_at))
}

fn parse_time(token: &str) -> Option<DateTime<Utc>> {
    if token.len() != TIME_LEN {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(token, TIME_FORMAT).ok()?;
    let parsed = naive.and_utc();
    // Reject anything the formatter would not reproduce byte for byte.
    (parsed.format(TIME_FORMAT).to_string() == token).then_some(parsed)
}

// ---------------------------------------------------------------------------
// 3. GotFolder
// ---------------------------------------------------------------------------

/// [`GotStore`] backed by the hidden `.goodgot` directory of a packages folder.
#[derive(Debug, Clone)]
pub struct GotFolder {
    folder: PathBuf,
}

impl GotFolder {
    /// A store for the packages folder at `folder`. Nothing is touched on
    /// disk until the first save.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// The `.goodgot` directory.
    pub fn path(&self) -> PathBuf {
        got_dir_at(&self.folder)
    }

    /// Every readable record in the store, sorted by id.
    pub fn list(&self) -> Result<Vec<Package>, CoreError> {
        let dir = self.path();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(io_err(&dir, err)),
        };

        let mut packages = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            // Temp files start with a dot; valid ids never do.
            let Ok(id) = PackageId::parse(&name) else {
                continue;
            };
            if let Some(package) = self.read_record(&id)? {
                packages.push(package);
            }
        }
        packages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(packages)
    }

    fn read_record(&self, id: &PackageId) -> Result<Option<Package>, CoreError> {
        let path = record_path_at(&self.folder, id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                tracing::warn!(package = %id, path = %path.display(), "ignoring non-UTF-8 got record");
                return Ok(None);
            }
            Err(err) => return Err(io_err(&path, err)),
        };

        let first = contents.lines().next().unwrap_or_default();
        let parsed = parse_record(id, first);
        if parsed.is_none() {
            tracing::warn!(package = %id, path = %path.display(), "ignoring malformed got record");
        }
        Ok(parsed)
    }
}

impl GotStore for GotFolder {
    fn get(&self, ids: &[PackageId]) -> Result<Vec<Option<Package>>, CoreError> {
        if !self.path().is_dir() {
            return Ok(vec![None; ids.len()]);
        }
        ids.iter().map(|id| self.read_record(id)).collect()
    }

    fn save(&self, package: &Package) -> Result<Package, CoreError> {
        let Some(version) = package.version.as_deref() else {
            return Err(CoreError::MissingVersion {
                id: package.id.to_string(),
            });
        };
        version::parse(version)?;

        let installed_at = package.installed_at.unwrap_or_else(timestamp_now);
        let record = Package::installed(package.id.clone(), version, installed_at);

        let dir = self.path();
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let path = record_path_at(&self.folder, &package.id);
        let tmp = dir.join(format!(".{}.tmp", package.id));
        let line = format!("{}\n", serialize_record(version, installed_at));
        std::fs::write(&tmp, line).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&path, e));
        }

        tracing::debug!(package = %package.id, version, "recorded got entry");
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// 4. GotNone
// ---------------------------------------------------------------------------

/// [`GotStore`] that never has anything: every package is a fresh install,
/// and saves are discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct GotNone;

impl GotStore for GotNone {
    fn get(&self, ids: &[PackageId]) -> Result<Vec<Option<Package>>, CoreError> {
        Ok(vec![None; ids.len()])
    }

    fn save(&self, package: &Package) -> Result<Package, CoreError> {
        let Some(version) = package.version.as_deref() else {
            return Err(CoreError::MissingVersion {
                id: package.id.to_string(),
            });
        };
        Ok(Package::installed(
            package.id.clone(),
            version,
            package.installed_at.unwrap_or_else(timestamp_now),
        ))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
