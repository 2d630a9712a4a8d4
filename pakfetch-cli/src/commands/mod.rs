//! CLI command implementations.

pub mod packages;
pub mod parse;
pub mod resolve;

use std::path::Path;

use pakfetch::CoordinatorConfig;

use crate::error::CliError;

/// Load coordinator settings from an INI file, or use the defaults.
fn load_config(path: Option<&Path>) -> Result<CoordinatorConfig, CliError> {
    match path {
        Some(path) => Ok(CoordinatorConfig::from_ini(path)?),
        None => Ok(CoordinatorConfig::default()),
    }
}
