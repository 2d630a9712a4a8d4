//! Catalog of DLC packages built from the content manifest.
//!
//! The registry is filled once by [`PackageRegistry::from_manifest`] before
//! the initialization barrier opens and is read-only afterwards; only the
//! per-package acquisition state changes later.

use std::collections::BTreeMap;
use std::sync::Arc;

use semver::Version;
use tracing::{debug, warn};

use super::core::{Package, VersionInfo};
use super::naming::{parse_chunk_id, ParsedChunkId};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::transport::ManifestEntry;

/// How a package version is chosen for a requested chunk identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    /// Use the highest known version, ignoring the requested one.
    #[default]
    Latest,
    /// Use exactly the version encoded in the requested identifier.
    Exact,
}

impl VersionPolicy {
    /// Parse from a config string (`latest` or `exact`).
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Some(Self::Latest),
            "exact" => Some(Self::Exact),
            _ => None,
        }
    }
}

/// Summary of a manifest ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Entries added to a package.
    pub accepted: usize,

    /// Chunk identifiers of entries that were skipped.
    pub skipped: Vec<String>,
}

impl IngestReport {
    /// Total entries seen.
    pub fn total(&self) -> usize {
        self.accepted + self.skipped.len()
    }
}

/// In-memory catalog of packages keyed by name.
#[derive(Debug, Default)]
pub struct PackageRegistry {
    packages: BTreeMap<String, Arc<Package>>,
}

impl PackageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from manifest entries.
    ///
    /// Entries whose chunk identifier does not parse are logged and skipped;
    /// one bad entry never aborts ingestion.
    pub fn from_manifest<I>(entries: I, default_version: Option<&Version>) -> (Self, IngestReport)
    where
        I: IntoIterator<Item = ManifestEntry>,
    {
        let mut registry = Self::new();
        let mut report = IngestReport::default();

        for entry in entries {
            match registry.add_entry(&entry, default_version) {
                Ok(parsed) => {
                    debug!(
                        chunk_id = %entry.chunk_id,
                        package = %parsed.name,
                        version = %parsed.version,
                        chunk_number = entry.chunk_number,
                        "Registered package version"
                    );
                    report.accepted += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Skipping manifest entry");
                    report.skipped.push(entry.chunk_id);
                }
            }
        }

        (registry, report)
    }

    /// Add one manifest entry, creating its package on first sight.
    pub fn add_entry(
        &mut self,
        entry: &ManifestEntry,
        default_version: Option<&Version>,
    ) -> CoordinatorResult<ParsedChunkId> {
        let parsed = parse_chunk_id(&entry.chunk_id, default_version).ok_or_else(|| {
            CoordinatorError::ManifestEntryUnparsable {
                chunk_id: entry.chunk_id.clone(),
                chunk_number: entry.chunk_number,
            }
        })?;

        let package = self
            .packages
            .entry(parsed.name.clone())
            .or_insert_with(|| Arc::new(Package::new(parsed.name.clone())));

        // Versions are only appended before the registry is shared
        let package = Arc::get_mut(package).ok_or_else(|| {
            CoordinatorError::invariant(format!(
                "package [{}] modified after the registry was shared",
                parsed.name
            ))
        })?;
        package.add_version(VersionInfo::new(
            parsed.version.clone(),
            entry.chunk_number,
        ));

        Ok(parsed)
    }

    /// Look up a package by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Package>> {
        self.packages.get(name)
    }

    /// All packages, ordered by name.
    pub fn packages(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.packages.values()
    }

    /// Number of registered packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the registry has no packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Resolve a chunk identifier to its package and the version to acquire.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::ChunkNotFound`] if the identifier does not parse,
    ///   names an unknown package, or (with [`VersionPolicy::Exact`]) names a
    ///   version the package does not have
    /// - [`CoordinatorError::InvariantViolation`] if a package has no
    ///   versions
    pub fn resolve(
        &self,
        chunk_id: &str,
        policy: VersionPolicy,
        default_version: Option<&Version>,
    ) -> CoordinatorResult<(Arc<Package>, VersionInfo)> {
        let not_found = || CoordinatorError::ChunkNotFound {
            chunk_id: chunk_id.to_string(),
        };

        let parsed = parse_chunk_id(chunk_id, default_version).ok_or_else(not_found)?;
        let package = self.get(&parsed.name).ok_or_else(not_found)?;

        let info = match policy {
            VersionPolicy::Latest => package.latest_version()?.clone(),
            VersionPolicy::Exact => package
                .find_version(&parsed.version)
                .cloned()
                .ok_or_else(not_found)?,
        };

        Ok((Arc::clone(package), info))
    }
}
