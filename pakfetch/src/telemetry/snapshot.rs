//! Point-in-time copy of coordinator counters.

use std::fmt;

use serde::Serialize;

/// Snapshot of [`CoordinatorMetrics`](super::CoordinatorMetrics).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Reference resolutions requested.
    pub references_requested: u64,
    /// References served by the already-resolved fast path.
    pub fast_path_hits: u64,
    /// References with no chunk dependency.
    pub base_content_references: u64,
    /// Chunk identifiers matching no package.
    pub chunks_not_found: u64,
    /// Download+mount operations issued.
    pub acquisitions_started: u64,
    /// Callers that joined an in-flight acquisition.
    pub acquisitions_coalesced: u64,
    /// Callers that found their chunk mounted.
    pub already_mounted: u64,
    /// Chunks that reached the mounted state.
    pub mounts_completed: u64,
    /// Transport steps reporting failure.
    pub transport_failures: u64,
    /// Objects handed back by the loader.
    pub objects_loaded: u64,
    /// Loader lookups that found nothing.
    pub loader_misses: u64,
    /// Manifest entries skipped at ingestion.
    pub manifest_entries_skipped: u64,
}

impl MetricsSnapshot {
    /// Fraction of chunk acquisitions served without issuing new I/O.
    ///
    /// Returns `0.0` before any acquisition was requested.
    pub fn dedup_ratio(&self) -> f64 {
        let total = self.acquisitions_started + self.acquisitions_coalesced + self.already_mounted;
        if total == 0 {
            0.0
        } else {
            (self.acquisitions_coalesced + self.already_mounted) as f64 / total as f64
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "references: {} (fast path {}, base content {}), acquisitions: {} started, {} coalesced, {} already mounted, {} mounted, loader: {} loaded, {} missing",
            self.references_requested,
            self.fast_path_hits,
            self.base_content_references,
            self.acquisitions_started,
            self.acquisitions_coalesced,
            self.already_mounted,
            self.mounts_completed,
            self.objects_loaded,
            self.loader_misses
        )
    }
}
