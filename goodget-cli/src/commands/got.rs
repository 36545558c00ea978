//! `goodget got`: show the got store of a packages folder.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use goodget_core::{GotFolder, GotStore, Package, PackageId};
use goodget_sync::authority::format_age;

/// Arguments for `goodget got`.
#[derive(Args, Debug)]
pub struct GotArgs {
    /// Packages folder to inspect.
    pub folder: PathBuf,

    /// Only show these packages (default: everything recorded).
    #[arg(value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl GotArgs {
    pub fn run(self) -> Result<()> {
        let store = GotFolder::new(&self.folder);
        let entries: Vec<Entry> = if self.packages.is_empty() {
            store
                .list()
                .with_context(|| format!("failed to read {}", store.path().display()))?
                .into_iter()
                .map(|package| (package.id.clone(), Some(package)))
                .collect()
        } else {
            let ids = self
                .packages
                .iter()
                .map(|id| PackageId::parse(id))
                .collect::<Result<Vec<_>, _>>()?;
            let records = store
                .get(&ids)
                .with_context(|| format!("failed to read {}", store.path().display()))?;
            ids.into_iter().zip(records).collect()
        };

        if self.json {
            print_json(entries)
        } else {
            print_table(&self, entries);
            Ok(())
        }
    }
}

type Entry = (PackageId, Option<Package>);

#[derive(Serialize)]
struct GotEntryJson {
    id: String,
    version: Option<String>,
    installed_at: Option<String>,
}

#[derive(Tabled)]
struct GotTableRow {
    #[tabled(rename = "package")]
    package: String,
    #[tabled(rename = "version")]
    version: String,
    #[tabled(rename = "installed")]
    installed: String,
    #[tabled(rename = "age")]
    age: String,
}

fn print_json(entries: Vec<Entry>) -> Result<()> {
    let payload: Vec<GotEntryJson> = entries
        .into_iter()
        .map(|(id, package)| GotEntryJson {
            id: id.to_string(),
            version: package.as_ref().and_then(|p| p.version.clone()),
            installed_at: package
                .and_then(|p| p.installed_at)
                .map(|at| at.to_rfc3339()),
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize got JSON")?
    );
    Ok(())
}

fn print_table(args: &GotArgs, entries: Vec<Entry>) {
    if entries.is_empty() {
        println!("Nothing got in '{}'.", args.folder.display());
        return;
    }

    let missing = entries.iter().filter(|(_, p)| p.is_none()).count();
    let rows: Vec<GotTableRow> = entries
        .into_iter()
        .map(|(id, package)| match package {
            Some(package) => GotTableRow {
                package: id.to_string(),
                version: package.version.unwrap_or_default(),
                installed: package
                    .installed_at
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_default(),
                age: package.installed_at.map(format_age).unwrap_or_default(),
            },
            None => GotTableRow {
                package: id.to_string(),
                version: "-".to_string(),
                installed: "never".to_string(),
                age: "-".to_string(),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if missing > 0 {
        println!(
            "{} {missing} package(s) not got yet; run 'goodget install' to fetch them.",
            "■".yellow().bold()
        );
    }
}
