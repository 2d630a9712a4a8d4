//! Coordinator telemetry for observability.
//!
//! This module provides lock-free counters describing what the coordinator
//! has done: references served, chunks acquired, requests coalesced onto an
//! in-flight acquisition, and so on.
//!
//! # Architecture
//!
//! ```text
//! Coordinator ─────► CoordinatorMetrics ─────► MetricsSnapshot ─────► Views
//!                    (atomic counters)        (point-in-time copy)   (CLI, logs)
//! ```
//!
//! # Example
//!
//! ```
//! use pakfetch::telemetry::CoordinatorMetrics;
//!
//! let metrics = CoordinatorMetrics::new();
//! metrics.reference_requested();
//! metrics.acquisition_started();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.acquisitions_started, 1);
//! ```

mod metrics;
mod snapshot;

pub use metrics::CoordinatorMetrics;
pub use snapshot::MetricsSnapshot;
