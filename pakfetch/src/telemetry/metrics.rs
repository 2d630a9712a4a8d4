//! Atomic coordinator counters.

use std::sync::atomic::{AtomicU64, Ordering};

use super::snapshot::MetricsSnapshot;

/// Lock-free counters updated by the coordinator.
///
/// All counters only grow. Use [`snapshot`](Self::snapshot) to read a
/// consistent-enough copy for display.
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
    references_requested: AtomicU64,
    fast_path_hits: AtomicU64,
    base_content_references: AtomicU64,
    chunks_not_found: AtomicU64,
    acquisitions_started: AtomicU64,
    acquisitions_coalesced: AtomicU64,
    already_mounted: AtomicU64,
    mounts_completed: AtomicU64,
    transport_failures: AtomicU64,
    objects_loaded: AtomicU64,
    loader_misses: AtomicU64,
    manifest_entries_skipped: AtomicU64,
}

impl CoordinatorMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// A reference resolution was requested.
    pub fn reference_requested(&self) {
        self.references_requested.fetch_add(1, Ordering::Relaxed);
    }

    /// A reference was served from the already-resolved fast path.
    pub fn fast_path_hit(&self) {
        self.fast_path_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A reference had no chunk dependency.
    pub fn base_content_reference(&self) {
        self.base_content_references.fetch_add(1, Ordering::Relaxed);
    }

    /// A chunk identifier matched no registered package.
    pub fn chunk_not_found(&self) {
        self.chunks_not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// A download and mount was issued.
    pub fn acquisition_started(&self) {
        self.acquisitions_started.fetch_add(1, Ordering::Relaxed);
    }

    /// A caller joined an in-flight acquisition.
    pub fn acquisition_coalesced(&self) {
        self.acquisitions_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// A caller found its package already mounted.
    pub fn already_mounted(&self) {
        self.already_mounted.fetch_add(1, Ordering::Relaxed);
    }

    /// A package reached the mounted state.
    pub fn mount_completed(&self) {
        self.mounts_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// The transport reported `success == false` for some step.
    pub fn transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// The loader produced an object.
    pub fn object_loaded(&self) {
        self.objects_loaded.fetch_add(1, Ordering::Relaxed);
    }

    /// The loader found nothing at a reference.
    pub fn loader_miss(&self) {
        self.loader_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Manifest entries were skipped during ingestion.
    pub fn manifest_entries_skipped(&self, count: u64) {
        self.manifest_entries_skipped
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            references_requested: self.references_requested.load(Ordering::Relaxed),
            fast_path_hits: self.fast_path_hits.load(Ordering::Relaxed),
            base_content_references: self.base_content_references.load(Ordering::Relaxed),
            chunks_not_found: self.chunks_not_found.load(Ordering::Relaxed),
            acquisitions_started: self.acquisitions_started.load(Ordering::Relaxed),
            acquisitions_coalesced: self.acquisitions_coalesced.load(Ordering::Relaxed),
            already_mounted: self.already_mounted.load(Ordering::Relaxed),
            mounts_completed: self.mounts_completed.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            objects_loaded: self.objects_loaded.load(Ordering::Relaxed),
            loader_misses: self.loader_misses.load(Ordering::Relaxed),
            manifest_entries_skipped: self.manifest_entries_skipped.load(Ordering::Relaxed),
        }
    }
}
