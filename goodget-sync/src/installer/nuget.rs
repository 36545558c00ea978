//! Installer driving the NuGet command line tool.
//!
//! The tool installs into `<target>/<id>.<version>`; the directory is then
//! renamed to `<target>/<id>` so consumers find packages at a stable path.
//! The version is read back from the directory name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use goodget_core::types::timestamp_now;
use goodget_core::{version, Feed, Package, PackageId};

use super::{package_dir_at, remove_existing, Installer};
use crate::error::{install_io_err, InstallError};

/// Where to fetch the tool from when it cannot be found, and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDownload {
    pub url: String,
    pub destination: PathBuf,
}

impl ToolDownload {
    /// Download `url` into the user cache directory (`<cache>/goodget/<file>`).
    pub fn to_cache(url: impl Into<String>, file_name: &str) -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            url: url.into(),
            destination: base.join("goodget").join(file_name),
        }
    }
}

/// [`Installer`] that shells out to `nuget install`.
#[derive(Debug, Clone)]
pub struct NuGetCliInstaller {
    feed: Feed,
    tool: PathBuf,
    download: Option<ToolDownload>,
    /// Set once a download attempt fails; later packages skip the retry.
    download_failed: OnceLock<()>,
}

impl NuGetCliInstaller {
    /// Platform default tool name, resolved through `PATH`.
    pub const DEFAULT_TOOL: &'static str = if cfg!(windows) { "nuget.exe" } else { "nuget" };

    pub fn new(feed: Feed, tool: impl Into<PathBuf>) -> Self {
        Self {
            feed,
            tool: tool.into(),
            download: None,
            download_failed: OnceLock::new(),
        }
    }

    pub fn with_download(mut self, download: Option<ToolDownload>) -> Self {
        self.download = download;
        self
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// The configured tool, or a previously downloaded copy of it.
    fn tool_path(&self) -> &Path {
        match &self.download {
            Some(download) if download.destination.is_file() => &download.destination,
            _ => &self.tool,
        }
    }

    fn run_tool(&self, target: &Path, id: &PackageId) -> Result<Vec<String>, InstallError> {
        match self.invoke(self.tool_path(), target, id) {
            Err(InstallError::ToolNotFound { tool }) => {
                let Some(download) = &self.download else {
                    return Err(InstallError::ToolNotFound { tool });
                };
                if download.destination.is_file() || self.download_failed.get().is_some() {
                    return Err(InstallError::ToolNotFound { tool });
                }
                tracing::warn!(tool = %tool.display(), url = %download.url, "tool not found, downloading");
                if let Err(err) = download_tool(download) {
                    let _ = self.download_failed.set(());
                    return Err(err);
                }
                self.invoke(&download.destination, target, id)
            }
            other => other,
        }
    }

    fn invoke(&self, tool: &Path, target: &Path, id: &PackageId) -> Result<Vec<String>, InstallError> {
        let output = Command::new(tool)
            .arg("install")
            .arg(id.as_str())
            .arg("-Source")
            .arg(&self.feed.uri)
            .arg("-OutputDirectory")
            .arg(target)
            .args(["-Prerelease", "-NonInteractive"])
            .output()
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => InstallError::ToolNotFound {
                    tool: tool.to_path_buf(),
                },
                _ => InstallError::Spawn {
                    tool: tool.to_path_buf(),
                    source,
                },
            })?;

        let lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&output.stderr).lines())
            .map(str::to_string)
            .collect();
        for line in &lines {
            tracing::debug!(package = %id, "{line}");
        }

        if !output.status.success() {
            return Err(InstallError::ToolFailed {
                tool: tool.to_path_buf(),
                code: output.status.code(),
                output: lines,
            });
        }
        Ok(lines)
    }
}

impl Installer for NuGetCliInstaller {
    fn feed(&self) -> &Feed {
        &self.feed
    }

    fn install(&self, target: &Path, package: &Package) -> Result<Package, InstallError> {
        let id = &package.id;
        remove_existing(target, id)?;
        self.run_tool(target, id)?;

        let (installed, version) =
            find_installed_dir(target, id)?.ok_or_else(|| InstallError::NotInstalled {
                id: id.to_string(),
                dir: target.to_path_buf(),
            })?;
        let dest = package_dir_at(target, id);
        std::fs::rename(&installed, &dest).map_err(|e| install_io_err(&dest, e))?;

        Ok(Package::installed(id.clone(), version, timestamp_now()))
    }
}

/// Find the `<id>.<version>` directory the tool left in `target`.
///
/// Matching is case-insensitive on the id and the remainder must be a
/// compatible version, so `Bar` never picks up `Bar.Core.1.0.0`. Among
/// several candidates the most recently modified wins, then the longest name.
pub fn find_installed_dir(
    target: &Path,
    id: &PackageId,
) -> Result<Option<(PathBuf, String)>, InstallError> {
    let entries = std::fs::read_dir(target).map_err(|e| install_io_err(target, e))?;
    let id_len = id.as_str().len();
    let wanted = id.as_str().to_lowercase();

    let mut best: Option<(SystemTime, usize, PathBuf, String)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| install_io_err(target, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let (Some(head), Some(rest)) = (name.get(..id_len), name.get(id_len..)) else {
            continue;
        };
        let Some(remainder) = rest.strip_prefix('.') else {
            continue;
        };
        if head.to_lowercase() != wanted || !version::is_compatible(remainder) {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| install_io_err(entry.path(), e))?;
        if !metadata.is_dir() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let key = (modified, name.len());
        if best.as_ref().map_or(true, |(m, l, _, _)| key > (*m, *l)) {
            best = Some((modified, name.len(), entry.path(), remainder.to_string()));
        }
    }
    Ok(best.map(|(_, _, path, version)| (path, version)))
}

/// Fetch the tool to `download.destination` and make it executable.
fn download_tool(download: &ToolDownload) -> Result<(), InstallError> {
    let fail = |reason: String| InstallError::Download {
        url: download.url.clone(),
        reason,
    };
    let dest = &download.destination;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| install_io_err(parent, e))?;
    }

    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(60))
        .user_agent("goodget")
        .build();
    let resp = agent
        .get(&download.url)
        .call()
        .map_err(|e| fail(e.to_string()))?;

    let tmp = dest.with_extension("download");
    let mut file = std::fs::File::create(&tmp).map_err(|e| install_io_err(&tmp, e))?;
    let mut reader = resp.into_reader();
    if let Err(e) = std::io::copy(&mut reader, &mut file) {
        let _ = std::fs::remove_file(&tmp);
        return Err(fail(e.to_string()));
    }
    drop(file);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| install_io_err(&tmp, e))?;
    }

    if let Err(e) = std::fs::rename(&tmp, dest) {
        let _ = std::fs::remove_file(&tmp);
        return Err(install_io_err(dest, e));
    }
    tracing::info!(tool = %dest.display(), "downloaded tool");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    fn id(s: &str) -> PackageId {
        PackageId::parse(s).unwrap()
    }

    fn mkdirs(root: &Path, names: &[&str]) {
        for name in names {
            std::fs::create_dir_all(root.join(name)).unwrap();
        }
    }

    fn set_mtime(path: &Path, secs: i64) {
        filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    // -- directory matching -----------------------------------------------

    #[test]
    fn prefix_match_requires_version_after_id() {
        let tmp = TempDir::new().unwrap();
        mkdirs(tmp.path(), &["Bar.Core.1.0.0", "Bar.1.0.0", "Barn.2.0.0"]);
        let (path, version) = find_installed_dir(tmp.path(), &id("Bar")).unwrap().unwrap();
        assert_eq!(path, tmp.path().join("Bar.1.0.0"));
        assert_eq!(version, "1.0.0");
    }

    #[test]
    fn prefix_match_ignores_case() {
        let tmp = TempDir::new().unwrap();
        mkdirs(tmp.path(), &["nunit.2.6.3"]);
        let (_, version) = find_installed_dir(tmp.path(), &id("NUnit")).unwrap().unwrap();
        assert_eq!(version, "2.6.3");
    }

    #[test]
    fn files_and_unrelated_dirs_do_not_match() {
        let tmp = TempDir::new().unwrap();
        mkdirs(tmp.path(), &["NUnit", "Other.1.0.0"]);
        std::fs::write(tmp.path().join("NUnit.2.6.3"), b"").unwrap();
        assert!(find_installed_dir(tmp.path(), &id("NUnit")).unwrap().is_none());
    }

    #[test]
    fn most_recently_modified_candidate_wins() {
        let tmp = TempDir::new().unwrap();
        mkdirs(tmp.path(), &["Foo.1.0.0", "Foo.2.0.0"]);
        set_mtime(&tmp.path().join("Foo.1.0.0"), 2_000_000_000);
        set_mtime(&tmp.path().join("Foo.2.0.0"), 1_000_000_000);
        let (_, version) = find_installed_dir(tmp.path(), &id("Foo")).unwrap().unwrap();
        assert_eq!(version, "1.0.0");
    }

    #[test]
    fn mtime_tie_goes_to_longest_name() {
        let tmp = TempDir::new().unwrap();
        mkdirs(tmp.path(), &["Foo.1.0.0", "Foo.1.0.0-beta"]);
        set_mtime(&tmp.path().join("Foo.1.0.0"), 1_500_000_000);
        set_mtime(&tmp.path().join("Foo.1.0.0-beta"), 1_500_000_000);
        let (_, version) = find_installed_dir(tmp.path(), &id("Foo")).unwrap().unwrap();
        assert_eq!(version, "1.0.0-beta");
    }

    // -- driving the tool -------------------------------------------------

    #[cfg(unix)]
    fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Arguments: install <id> -Source <uri> -OutputDirectory <target> ...
    #[cfg(unix)]
    const FAKE_NUGET: &str = r#"mkdir -p "$6/$2.1.2.3" && echo "Successfully installed '$2 1.2.3'.""#;

    #[cfg(unix)]
    #[test]
    fn install_renames_versioned_dir_and_replaces_previous() {
        let tools = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let tool = write_tool(tools.path(), "nuget", FAKE_NUGET);
        std::fs::create_dir_all(target.path().join("A")).unwrap();
        std::fs::write(target.path().join("A/stale.txt"), b"old").unwrap();

        let installer = NuGetCliInstaller::new(Feed::nuget_official(), tool);
        let installed = installer
            .install(target.path(), &Package::bare(id("A")))
            .unwrap();

        assert_eq!(installed.version.as_deref(), Some("1.2.3"));
        assert!(target.path().join("A").is_dir());
        assert!(!target.path().join("A/stale.txt").exists());
        assert!(!target.path().join("A.1.2.3").exists());
    }

    #[cfg(unix)]
    #[test]
    fn install_replaces_stray_file_at_package_path() {
        let tools = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let tool = write_tool(tools.path(), "nuget", FAKE_NUGET);
        std::fs::write(target.path().join("A"), b"leftover").unwrap();

        let installer = NuGetCliInstaller::new(Feed::nuget_official(), tool);
        let installed = installer
            .install(target.path(), &Package::bare(id("A")))
            .unwrap();

        assert_eq!(installed.version.as_deref(), Some("1.2.3"));
        assert!(target.path().join("A").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_reports_exit_code_and_output() {
        let tools = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let tool = write_tool(
            tools.path(),
            "nuget",
            "echo \"Unable to find package '$2'\" >&2\nexit 3",
        );

        let installer = NuGetCliInstaller::new(Feed::nuget_official(), tool);
        let err = installer
            .install(target.path(), &Package::bare(id("Missing")))
            .unwrap_err();
        match err {
            InstallError::ToolFailed { code, ref output, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(output, &vec!["Unable to find package 'Missing'".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn tool_that_installs_nothing_is_an_error() {
        let tools = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let tool = write_tool(tools.path(), "nuget", "exit 0");

        let installer = NuGetCliInstaller::new(Feed::nuget_official(), tool);
        let err = installer
            .install(target.path(), &Package::bare(id("A")))
            .unwrap_err();
        assert!(matches!(err, InstallError::NotInstalled { .. }), "got: {err}");
    }

    #[test]
    fn missing_tool_without_download_is_not_found() {
        let tools = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let installer = NuGetCliInstaller::new(Feed::nuget_official(), tools.path().join("absent"));
        let err = installer
            .install(target.path(), &Package::bare(id("A")))
            .unwrap_err();
        assert!(matches!(err, InstallError::ToolNotFound { .. }), "got: {err}");
    }

    #[cfg(unix)]
    fn serve_once(status: &str, body: String) -> String {
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
        });
        format!("http://{addr}/nuget")
    }

    #[cfg(unix)]
    #[test]
    fn missing_tool_is_downloaded_then_retried_once() {
        let tools = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let url = serve_once("200 OK", format!("#!/bin/sh\n{FAKE_NUGET}\n"));
        let destination = tools.path().join("cache/nuget");

        let installer = NuGetCliInstaller::new(Feed::nuget_official(), tools.path().join("absent"))
            .with_download(Some(ToolDownload {
                url,
                destination: destination.clone(),
            }));
        let installed = installer
            .install(target.path(), &Package::bare(id("A")))
            .unwrap();

        assert_eq!(installed.version.as_deref(), Some("1.2.3"));
        assert!(destination.is_file());
        assert_eq!(installer.tool_path(), destination.as_path());
    }

    #[cfg(unix)]
    #[test]
    fn failed_download_is_reported() {
        let tools = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let url = serve_once("404 Not Found", String::new());

        let installer = NuGetCliInstaller::new(Feed::nuget_official(), tools.path().join("absent"))
            .with_download(Some(ToolDownload {
                url,
                destination: tools.path().join("nuget"),
            }));
        let err = installer
            .install(target.path(), &Package::bare(id("A")))
            .unwrap_err();
        assert!(matches!(err, InstallError::Download { .. }), "got: {err}");
        assert!(!tools.path().join("nuget").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failed_download_is_not_retried_for_later_packages() {
        let tools = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        // Serves a single request; a second download attempt could not connect.
        let url = serve_once("404 Not Found", String::new());

        let installer = NuGetCliInstaller::new(Feed::nuget_official(), tools.path().join("absent"))
            .with_download(Some(ToolDownload {
                url,
                destination: tools.path().join("nuget"),
            }));
        let first = installer
            .install(target.path(), &Package::bare(id("A")))
            .unwrap_err();
        assert!(matches!(first, InstallError::Download { .. }), "got: {first}");

        let second = installer
            .install(target.path(), &Package::bare(id("B")))
            .unwrap_err();
        assert!(matches!(second, InstallError::ToolNotFound { .. }), "got: {second}");
    }

    #[test]
    fn cache_download_lands_under_goodget_dir() {
        let download = ToolDownload::to_cache("https://example.invalid/nuget.exe", "nuget.exe");
        assert!(download.destination.ends_with("goodget/nuget.exe"));
    }
}
