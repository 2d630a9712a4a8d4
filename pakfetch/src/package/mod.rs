//! DLC package types, naming rules and the package registry.
//!
//! # Overview
//!
//! Remote content is organized as numbered chunks. Each pak file in a chunk
//! carries a chunk identifier string naming a logical DLC package and,
//! optionally, its version:
//!
//! - **Reference**: an asset path such as `/Game/DLC_Expansion1/Hero`
//! - **Chunk identifier**: `Expansion1` or `Expansion1_1.2.0`
//! - **Package**: all known versions of `Expansion1` and its acquisition state
//! - **Registry**: every package discovered in the manifest
//!
//! # Type Hierarchy
//!
//! ```text
//! PackageRegistry
//! └── Package (one per name)
//!     ├── name: String
//!     ├── versions: Vec<VersionInfo>  ←── { version, chunk_number }
//!     └── status: PackageStatus       ←── NotDownloaded → DownloadingAndMounting → Mounted
//! ```

mod core;
mod naming;
mod registry;
mod version;

// Core types
pub use core::{Package, PackageStatus, VersionInfo};
pub(crate) use core::AcquireStep;

// Registry
pub use registry::{IngestReport, PackageRegistry, VersionPolicy};

// Naming utilities
pub use naming::{
    extract_chunk_id, parse_chunk_id, parse_chunk_id_or_default, ParsedChunkId, ReferenceRules,
    CHUNK_ID_DELIMITER, DEFAULT_DLC_PREFIX, DEFAULT_ROOT_SEGMENT,
};

// Versions
pub use version::{parse_version, VERSION_ONE};

// Re-export semver::Version for convenience
pub use semver::Version;
