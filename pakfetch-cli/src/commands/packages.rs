//! Packages command - list the DLC packages advertised by a CDN manifest.

use std::path::PathBuf;

use clap::Args;
use pakfetch::{ManifestEntry, PackageRegistry};

use super::load_config;
use crate::error::CliError;
use crate::local::{load_manifest, MANIFEST_FILE};

/// Arguments for the packages command.
#[derive(Debug, Args)]
pub struct PackagesArgs {
    /// CDN directory containing manifest.json
    #[arg(long)]
    pub cdn: PathBuf,

    /// Coordinator configuration file (INI, [coordinator] section)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run the packages command.
pub fn run(args: PackagesArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let records = load_manifest(&args.cdn.join(MANIFEST_FILE))?;

    let (registry, report) = PackageRegistry::from_manifest(
        records.iter().map(ManifestEntry::from),
        config.default_version.as_ref(),
    );

    print!("{}", render(&registry));

    if !report.skipped.is_empty() {
        println!();
        println!("Skipped {} unparsable entries:", report.skipped.len());
        for chunk_id in &report.skipped {
            println!("  [{}]", chunk_id);
        }
    }

    Ok(())
}

fn render(registry: &PackageRegistry) -> String {
    if registry.is_empty() {
        return "No packages found.\n".to_string();
    }

    let mut out = String::new();
    for package in registry.packages() {
        out.push_str(package.name());
        out.push('\n');
        let latest = package.latest_version().ok();
        for info in package.versions() {
            let marker = if latest.is_some_and(|l| std::ptr::eq(l, info)) {
                "  (latest)"
            } else {
                ""
            };
            out.push_str(&format!("  {}{}\n", info, marker));
        }
    }
    out
}
