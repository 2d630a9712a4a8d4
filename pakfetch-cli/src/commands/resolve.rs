//! Resolve command - fetch, mount and load asset references.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use futures::future::join_all;
use pakfetch::telemetry::MetricsSnapshot;
use pakfetch::{Coordinator, CoordinatorConfig, CoordinatorResult};
use tracing::info;

use super::load_config;
use crate::error::CliError;
use crate::local::{DirectoryTransport, FileLoader, LoadedFile};

/// Arguments for the resolve command.
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Asset references to resolve (e.g. /Game/DLC_Expansion1/Hero)
    #[arg(required = true)]
    pub references: Vec<String>,

    /// CDN directory containing manifest.json and chunk files
    #[arg(long)]
    pub cdn: PathBuf,

    /// Content directory holding base content and mounted chunks
    #[arg(long)]
    pub content: PathBuf,

    /// Coordinator configuration file (INI, [coordinator] section)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print coordinator counters after resolving
    #[arg(long)]
    pub stats: bool,

    /// Print the counters as JSON
    #[arg(long, requires = "stats")]
    pub json: bool,
}

/// Run the resolve command.
pub fn run(args: ResolveArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let runtime = tokio::runtime::Runtime::new().map_err(|e| CliError::Runtime(e.to_string()))?;
    runtime.block_on(resolve_all(config, args))
}

async fn resolve_all(config: CoordinatorConfig, args: ResolveArgs) -> Result<(), CliError> {
    let transport = Arc::new(DirectoryTransport::new(&args.cdn, &args.content));
    let loader = Arc::new(FileLoader::new(&args.content));
    let coordinator = Coordinator::start(config, transport, loader)?;

    info!(count = args.references.len(), "Resolving references");
    let results = join_all(
        args.references
            .iter()
            .map(|reference| coordinator.resolve_reference(reference)),
    )
    .await;

    let mut failed = 0;
    for (reference, result) in args.references.iter().zip(&results) {
        if result.is_err() {
            failed += 1;
        }
        println!("{}", describe(reference, result));
    }

    if args.stats {
        println!();
        println!("{}", render_stats(&coordinator.metrics(), args.json)?);
    }
    coordinator.shutdown();

    if failed > 0 {
        return Err(CliError::Resolve {
            failed,
            total: args.references.len(),
        });
    }
    Ok(())
}

fn render_stats(snapshot: &MetricsSnapshot, json: bool) -> Result<String, CliError> {
    if json {
        serde_json::to_string_pretty(snapshot).map_err(|e| CliError::Output(e.to_string()))
    } else {
        Ok(snapshot.to_string())
    }
}

fn describe(reference: &str, result: &CoordinatorResult<Option<LoadedFile>>) -> String {
    match result {
        Ok(Some(file)) => format!("{} -> {} ({} bytes)", reference, file.path.display(), file.size),
        Ok(None) => format!("{} -> not found", reference),
        Err(e) => format!("{} -> error: {}", reference, e),
    }
}
