//! Chunk Transport Service interface.
//!
//! The transport owns everything the coordinator does not: fetching the
//! content manifest, moving chunk bytes over the network, and mounting
//! downloaded pak files. The coordinator only talks to it through
//! [`ChunkTransport`].
//!
//! Completion callbacks of the underlying service are modeled as boxed
//! futures resolving to the service's `success` flag. Futures are `'static`
//! so the coordinator can drive them from spawned tasks.
//!
//! # Dyn Compatibility
//!
//! Async methods return [`BoxFuture`] so the coordinator can hold an
//! `Arc<dyn ChunkTransport>`.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Remote chunk number, as assigned by the content build.
pub type ChunkNumber = i32;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One pak file entry discovered in the content manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Raw chunk identifier string carried by the pak entry
    /// (e.g., `Expansion1_1.2.0`).
    pub chunk_id: String,

    /// Remote chunk containing the pak file.
    pub chunk_number: ChunkNumber,
}

impl ManifestEntry {
    /// Create a manifest entry.
    pub fn new(chunk_id: impl Into<String>, chunk_number: ChunkNumber) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            chunk_number,
        }
    }
}

/// Remote content package transport.
///
/// Implementations must be thread-safe; the coordinator may call them from
/// any task.
pub trait ChunkTransport: Send + Sync + 'static {
    /// Prepare the transport for a platform with a download concurrency cap.
    fn initialize(&self, platform: &str, max_concurrent_downloads: usize);

    /// Location of the locally cached build manifest, if the transport keeps
    /// one.
    ///
    /// The coordinator moves this file aside before updating the build so
    /// that a stale cache cannot mask a fresh manifest.
    fn cached_manifest_path(&self) -> Option<PathBuf> {
        None
    }

    /// Fetch the manifest for a deployment/build.
    ///
    /// Resolves to `true` once the manifest is ready for ingestion.
    fn update_build(&self, deployment_name: &str, build_id: &str) -> BoxFuture<'static, bool>;

    /// Fall back to the locally cached manifest of a deployment.
    fn load_cached_build(&self, deployment_name: &str) -> BoxFuture<'static, bool>;

    /// Pak entries of the current manifest.
    fn manifest_entries(&self) -> Vec<ManifestEntry>;

    /// Request download of a set of chunks.
    fn download_chunks(&self, chunks: &[ChunkNumber], priority: i32) -> BoxFuture<'static, bool>;

    /// Resolve once every outstanding download has finished.
    fn begin_loading_mode(&self) -> BoxFuture<'static, bool>;

    /// Mount a downloaded chunk.
    fn mount_chunk(&self, chunk: ChunkNumber) -> BoxFuture<'static, bool>;

    /// Release transport resources.
    fn shutdown(&self) {}
}
