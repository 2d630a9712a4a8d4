//! Pakfetch CLI - Command-line interface
//!
//! Resolves asset references against a directory-backed CDN, downloading
//! and mounting DLC chunks on demand.

mod commands;
mod error;
mod local;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::packages::PackagesArgs;
use commands::parse::ParseArgs;
use commands::resolve::ResolveArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "pakfetch", version = pakfetch::VERSION, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve asset references, fetching their DLC chunks as needed
    Resolve(ResolveArgs),
    /// Show how a chunk identifier or reference is parsed
    Parse(ParseArgs),
    /// List packages advertised by a CDN manifest
    Packages(PackagesArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Resolve(args) => commands::resolve::run(args),
        Commands::Parse(args) => commands::parse::run(args),
        Commands::Packages(args) => commands::packages::run(args),
    }
}

fn main() {
    init_logging();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
