//! Installers: fetch one package version into a target folder.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use goodget_core::{Feed, Package, PackageId};

use crate::error::{install_io_err, InstallError};

pub mod diagnostic;
pub mod nuget;

pub use diagnostic::DiagnosticInstaller;
pub use nuget::{NuGetCliInstaller, ToolDownload};

/// Installs packages from one feed.
pub trait Installer: Send + Sync {
    /// The feed packages are fetched from.
    fn feed(&self) -> &Feed;

    /// Install the latest version of `package` into `target/<id>`, replacing
    /// whatever is there. Returns the package with the installed version and
    /// completion time.
    fn install(&self, target: &Path, package: &Package) -> Result<Package, InstallError>;
}

/// `target/<id>`: where an installed package ends up.
pub fn package_dir_at(target: &Path, id: &PackageId) -> PathBuf {
    target.join(id.as_str())
}

/// Remove whatever sits at `target/<id>`, if anything. Symlinks are removed,
/// not followed.
pub(crate) fn remove_existing(target: &Path, id: &PackageId) -> Result<(), InstallError> {
    let path = package_dir_at(target, id);
    let metadata = match std::fs::symlink_metadata(&path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(install_io_err(&path, err)),
    };
    let removed = if metadata.is_dir() {
        std::fs::remove_dir_all(&path)
    } else {
        std::fs::remove_file(&path)
    };
    match removed {
        Ok(()) => {
            tracing::debug!(package = %id, path = %path.display(), "removed previous install");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(install_io_err(&path, err)),
    }
}
