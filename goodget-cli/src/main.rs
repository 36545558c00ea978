//! GoodGet: keep a folder of NuGet packages installed and up to date.
//!
//! # Usage
//!
//! ```text
//! goodget [--verbose|--quiet] [--config FILE] install <FOLDER> <PACKAGE>...
//!         [--feed URI] [--policy always|interval|feed] [--interval 1d]
//!         [--diagnostic] [--no-got]
//! goodget got <FOLDER> [PACKAGE...] [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{got::GotArgs, install::InstallArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "goodget",
    version,
    about = "Install NuGet packages into a folder and keep them up to date",
    long_about = None,
)]
struct Cli {
    /// Log every step (debug level).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Read configuration from FILE instead of `<FOLDER>/goodget.yaml`.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install packages into a folder, updating the ones that are stale.
    Install(InstallArgs),

    /// Show what GoodGet recorded as installed in a folder.
    Got(GotArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    match cli.command {
        Commands::Install(args) => args.run(cli.config.as_deref()),
        Commands::Got(args) => args.run(),
    }
}

/// `RUST_LOG` wins; otherwise the level follows `--verbose` / `--quiet`.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
