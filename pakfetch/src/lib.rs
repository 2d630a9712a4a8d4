//! Pakfetch - On-demand DLC chunk acquisition
//!
//! This library resolves asset references whose content may live in a
//! remote, not yet mounted chunk. Concurrent requests for the same package
//! share a single download and mount, and every caller receives the result
//! exactly once.
//!
//! The network transport and the object loader are supplied by the host
//! through the [`ChunkTransport`] and [`ObjectLoader`] traits.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod package;
pub mod promise;
pub mod telemetry;
pub mod transport;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, ManifestSource};
pub use error::{CoordinatorError, CoordinatorResult};
pub use loader::ObjectLoader;
pub use package::{Package, PackageRegistry, PackageStatus, Version, VersionInfo, VersionPolicy};
pub use promise::{BroadcastPromise, CompletionPromise, PromiseAbandoned, PromiseFuture};
pub use transport::{BoxFuture, ChunkNumber, ChunkTransport, ManifestEntry};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_manifest() {
        assert!(!VERSION.is_empty());
        assert!(Version::parse(VERSION).is_ok());
    }
}
