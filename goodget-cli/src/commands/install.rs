//! `goodget install`: install packages into a folder and keep them current.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;

use goodget_core::Feed;
use goodget_sync::{AuthorityPolicy, Config, InstallerKind, PackagesFolder, SyncReport};

/// Arguments for `goodget install`.
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Folder the packages are installed into (created if missing).
    pub folder: PathBuf,

    /// Ids of the packages to install.
    #[arg(required = true, value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Install from this feed instead of the configured ones.
    #[arg(long, value_name = "URI")]
    pub feed: Option<String>,

    /// When installed packages are considered stale.
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// How long an install stays current, e.g. `90m`, `12h` or `7d`.
    /// Implies `--policy interval`.
    #[arg(long, value_name = "DURATION")]
    pub interval: Option<IntervalArg>,

    /// Only report what would be installed.
    #[arg(long)]
    pub diagnostic: bool,

    /// Ignore and do not write the `.goodgot` records.
    #[arg(long)]
    pub no_got: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Always,
    Interval,
    Feed,
}

impl InstallArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let mut config = match config_path {
            Some(path) => Config::load_at(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Config::load_or_default_at(&self.folder)
                .with_context(|| format!("failed to load config from {}", self.folder.display()))?,
        };
        self.apply(&mut config)?;

        let mut folder = PackagesFolder::new(&self.folder, config)
            .with_context(|| format!("cannot use {} as a packages folder", self.folder.display()))?;
        for id in &self.packages {
            folder
                .add_package(id, None)
                .with_context(|| format!("cannot declare package '{id}'"))?;
        }

        let report = folder
            .synchronize()
            .with_context(|| format!("synchronizing {} failed", folder.path().display()))?;
        print_report(folder.path(), &report);
        report.into_result()?;
        Ok(())
    }

    /// Command line options override the loaded config.
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(uri) = &self.feed {
            config.feeds = vec![Feed::from_uri(uri.clone())];
        }

        config.update = match (self.policy, &self.interval) {
            (Some(PolicyArg::Always), None) => AuthorityPolicy::Always,
            (Some(PolicyArg::Feed), None) => AuthorityPolicy::Feed {
                recency_delay_seconds: None,
            },
            (Some(PolicyArg::Interval) | None, Some(interval)) => AuthorityPolicy::Interval {
                seconds: interval.0.as_secs(),
            },
            (Some(PolicyArg::Interval), None) => bail!("--policy interval needs --interval"),
            (Some(policy), Some(_)) => {
                bail!("--interval does not apply to --policy {policy:?}")
            }
            (None, None) => config.update,
        };

        if self.diagnostic {
            config.installer = InstallerKind::Diagnostic {
                version: goodget_sync::DiagnosticInstaller::DEFAULT_VERSION.to_string(),
            };
        }
        if self.no_got {
            config.use_got = false;
        }
        Ok(())
    }
}

fn print_report(folder: &Path, report: &SyncReport) {
    let mut installed = 0;
    let mut updated = 0;
    for feed in &report.feeds {
        for package in &feed.installed {
            installed += 1;
            println!(
                "{} installed {} {}",
                "✓".green(),
                package.id,
                package.version.as_deref().unwrap_or_default()
            );
        }
        for update in &feed.updated {
            updated += 1;
            println!(
                "{} updated {} {} -> {}",
                "✓".green(),
                update.package.id,
                update.previous.version.as_deref().unwrap_or("?"),
                update.package.version.as_deref().unwrap_or_default()
            );
        }
        for failure in &feed.failed {
            println!("{} failed {}: {}", "✗".red(), failure.id, failure.error);
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        println!(
            "{} '{}': {installed} installed, {updated} updated, {failed} failed",
            "✗".red(),
            folder.display()
        );
    } else if report.changed() {
        println!(
            "{} '{}': {installed} installed, {updated} updated",
            "✓".green(),
            folder.display()
        );
    } else {
        println!("{} '{}' is up to date", "✓".green(), folder.display());
    }
}

// ---------------------------------------------------------------------------
// --interval parsing
// ---------------------------------------------------------------------------

/// A duration written as a number with an optional `s`, `m`, `h` or `d`
/// suffix. A bare number is seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalArg(pub Duration);

impl FromStr for IntervalArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("invalid interval '{s}'; expected e.g. 30m, 12h, 7d"))?;
        let scale = match unit {
            "" | "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            "d" => 24 * 60 * 60,
            other => return Err(format!("unknown interval unit '{other}'; expected s, m, h or d")),
        };
        value
            .checked_mul(scale)
            .map(|secs| Self(Duration::from_secs(secs)))
            .ok_or_else(|| format!("interval '{s}' is too large"))
    }
}

impl fmt::Display for IntervalArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0.as_secs())
    }
}
