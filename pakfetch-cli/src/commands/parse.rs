//! Parse command - show how a chunk identifier or reference is interpreted.

use clap::Args;
use pakfetch::package::{parse_chunk_id, parse_version, ParsedChunkId, ReferenceRules};
use pakfetch::Version;

use crate::error::CliError;

/// Arguments for the parse command.
#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Chunk identifier (`Expansion1_1.2.0`) or asset reference
    /// (`/Game/DLC_Expansion1/Hero`)
    pub input: String,

    /// Version assumed when the identifier carries none
    #[arg(long, default_value = "1.0.0", conflicts_with = "no_default")]
    pub default_version: String,

    /// Reject identifiers without a version
    #[arg(long)]
    pub no_default: bool,
}

/// Interpret `input` as a reference when it is a path, else as a chunk id.
pub fn interpret(
    input: &str,
    default_version: Option<&Version>,
    rules: &ReferenceRules,
) -> Result<ParsedChunkId, CliError> {
    let chunk_id = if input.starts_with('/') {
        rules
            .extract_chunk_id(input)
            .ok_or_else(|| CliError::InvalidChunkId(input.to_string()))?
    } else {
        input.to_string()
    };

    parse_chunk_id(&chunk_id, default_version).ok_or(CliError::InvalidChunkId(chunk_id))
}

/// Run the parse command.
pub fn run(args: ParseArgs) -> Result<(), CliError> {
    let default_version = if args.no_default {
        None
    } else {
        Some(parse_version(&args.default_version).ok_or_else(|| {
            CliError::Config("--default-version must not be empty".to_string())
        })?)
    };

    let parsed = interpret(&args.input, default_version.as_ref(), &ReferenceRules::default())?;
    println!("Package: {}", parsed.name);
    println!("Version: {}", parsed.version);
    Ok(())
}
