//! Acquisition coordinator.
//!
//! The [`Coordinator`] turns an asset reference into a loaded object when
//! the reference's bytes may live in a remote chunk that still has to be
//! downloaded and mounted. It:
//! - Serves already-resolved references without waiting on anything
//! - Holds every other request until the initialization barrier opens
//! - Coalesces concurrent acquisitions of the same package chunk into a
//!   single download and mount
//! - Hands the reference to the object loader once its content is local
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Coordinator                             │
//! │                                                                  │
//! │  reference ──► ┌──────────────┐                                  │
//! │                │  Fast Path   │──► resolved ──► return object     │
//! │                └──────┬───────┘                                  │
//! │                       ▼                                          │
//! │                ┌──────────────┐                                  │
//! │                │ Init Barrier │──► wait for manifest ingestion   │
//! │                └──────┬───────┘                                  │
//! │                       ▼                                          │
//! │                ┌──────────────┐                                  │
//! │                │   Resolver   │──► no chunk ──► base content ─┐  │
//! │                └──────┬───────┘                               │  │
//! │                       ▼ chunk id                              │  │
//! │                ┌──────────────┐                               │  │
//! │                │   Package    │──► Mounted ──────────────────►│  │
//! │                │    State     │──► InFlight ──► wait ────────►│  │
//! │                └──────┬───────┘                               │  │
//! │                       ▼ Owner                                 │  │
//! │                ┌──────────────┐                               │  │
//! │                │  Transport   │──► download, mount ──────────►│  │
//! │                └──────────────┘                               ▼  │
//! │                                                    ┌──────────────┐
//! │                                                    │    Loader    │
//! │                                                    └──────────────┘
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pakfetch::{Coordinator, CoordinatorConfig};
//!
//! let coordinator = Coordinator::start(CoordinatorConfig::default(), transport, loader)?;
//! coordinator.ready().await?;
//!
//! let hero = coordinator.resolve_reference("/Game/DLC_Expansion1/Hero").await?;
//! ```

mod bootstrap;
mod cache_guard;

pub use bootstrap::{BootstrapOutcome, ManifestSource};
pub use cache_guard::{ManifestCacheGuard, MOVED_FILE_SUFFIX};

use std::sync::{Arc, OnceLock};

use futures::future;
use tokio::runtime::Handle;
use tracing::{debug, error, info, trace, warn};

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::loader::ObjectLoader;
use crate::package::{AcquireStep, IngestReport, Package, PackageRegistry, VersionInfo};
use crate::promise::{CompletionPromise, PromiseFuture};
use crate::telemetry::{CoordinatorMetrics, MetricsSnapshot};
use crate::transport::{BoxFuture, ChunkTransport};

/// Coordinates chunk acquisition and reference resolution.
///
/// Cloning is cheap; clones share the same registry, transport and loader.
pub struct Coordinator<L: ObjectLoader> {
    inner: Arc<Inner<L>>,
}

struct Inner<L: ObjectLoader> {
    config: CoordinatorConfig,
    transport: Arc<dyn ChunkTransport>,
    loader: Arc<L>,
    init: CompletionPromise,
    state: OnceLock<BootstrapOutcome>,
    metrics: CoordinatorMetrics,
    runtime: Handle,
}

impl<L: ObjectLoader> Clone for Coordinator<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: ObjectLoader> Coordinator<L> {
    /// Create a coordinator and start its initialization in the background.
    ///
    /// Returns immediately. Use [`ready`](Self::ready) to wait for the
    /// manifest to be ingested; [`resolve_reference`](Self::resolve_reference)
    /// waits on its own.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NoRuntime`] when called outside a Tokio
    /// runtime.
    pub fn start(
        config: CoordinatorConfig,
        transport: Arc<dyn ChunkTransport>,
        loader: Arc<L>,
    ) -> CoordinatorResult<Self> {
        let runtime =
            Handle::try_current().map_err(|e| CoordinatorError::NoRuntime(e.to_string()))?;

        let inner = Arc::new(Inner {
            config,
            transport,
            loader,
            init: CompletionPromise::new(),
            state: OnceLock::new(),
            metrics: CoordinatorMetrics::new(),
            runtime,
        });

        let task = Arc::clone(&inner);
        inner.runtime.spawn(async move { task.initialize().await });

        Ok(Self { inner })
    }

    /// Readiness future: resolves once the manifest has been ingested.
    pub fn ready(&self) -> PromiseFuture<()> {
        self.inner.init.make_future()
    }

    /// Whether the initialization barrier has opened.
    pub fn is_ready(&self) -> bool {
        self.inner.init.is_set()
    }

    /// Configuration in use.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// The package registry, once initialization has completed.
    pub fn registry(&self) -> Option<&PackageRegistry> {
        self.inner.state.get().map(|state| &state.registry)
    }

    /// Manifest ingestion summary, once initialization has completed.
    pub fn ingest_report(&self) -> Option<&IngestReport> {
        self.inner.state.get().map(|state| &state.report)
    }

    /// Where the ingested manifest came from, once initialization has
    /// completed.
    pub fn manifest_source(&self) -> Option<ManifestSource> {
        self.inner.state.get().map(|state| state.source)
    }

    /// Current counter values.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Acquire the package named by a chunk identifier.
    ///
    /// The returned future resolves once the selected chunk of the package
    /// is mounted. When the
    /// barrier is already open, the state check and any transport requests
    /// happen before this method returns; otherwise they happen after the
    /// barrier opens.
    ///
    /// Concurrent calls that select the same chunk share one download and
    /// mount.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::ChunkNotFound`], immediately, if no registered
    ///   package matches the identifier
    /// - [`CoordinatorError::Abandoned`] if the coordinator was torn down
    ///   while waiting
    pub fn acquire(&self, chunk_id: &str) -> BoxFuture<'static, CoordinatorResult<()>> {
        if self.inner.state.get().is_some() {
            return match self.inner.begin_acquisition(chunk_id) {
                Ok(pending) => pending,
                Err(e) => Box::pin(future::ready(Err(e))),
            };
        }

        let inner = Arc::clone(&self.inner);
        let barrier = inner.init.make_future();
        let chunk_id = chunk_id.to_string();
        Box::pin(async move {
            barrier.await?;
            inner.begin_acquisition(&chunk_id)?.await
        })
    }

    /// Resolve a reference to a loaded object.
    ///
    /// Resolves to `Ok(None)` when the reference is empty or the loader
    /// found nothing at it. A reference whose chunk identifier matches no
    /// package is logged and handed to the loader anyway.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::InvariantViolation`] on an internal
    ///   inconsistency
    /// - [`CoordinatorError::Abandoned`] if the coordinator was torn down
    ///   while waiting
    pub async fn resolve_reference(&self, reference: &str) -> CoordinatorResult<Option<L::Object>> {
        let inner = &self.inner;
        inner.metrics.reference_requested();
        trace!(reference, "Loading of object requested");

        if reference.is_empty() {
            warn!("Loading of object: empty reference passed");
            return Ok(None);
        }

        if let Some(object) = inner.loader.try_get_resolved(reference) {
            inner.metrics.fast_path_hit();
            trace!(reference, "Loading of object: already resolved");
            return Ok(Some(object));
        }

        if !self.is_ready() {
            debug!(reference, "Loading of object: waiting for initialization");
        }
        self.ready().await?;

        match inner.config.rules.extract_chunk_id(reference) {
            None => {
                inner.metrics.base_content_reference();
                debug!(reference, "Loading of object: no chunk dependency");
            }
            Some(chunk_id) => match self.acquire(&chunk_id).await {
                Ok(()) => {
                    debug!(reference, chunk_id = %chunk_id, "Loading of object: chunk mounted");
                }
                Err(CoordinatorError::ChunkNotFound { .. }) => {
                    warn!(
                        reference,
                        chunk_id = %chunk_id,
                        "Loading of object: chunk not found, treating as base content"
                    );
                }
                Err(e) => {
                    error!(reference, chunk_id = %chunk_id, error = %e, "Loading of object failed");
                    return Err(e);
                }
            },
        }

        let object = inner.loader.load_async(reference).await;
        if object.is_some() {
            inner.metrics.object_loaded();
            debug!(reference, "Loading of object: loaded");
        } else {
            inner.metrics.loader_miss();
            warn!(reference, "Loading of object: nothing found at reference");
        }

        Ok(object)
    }

    /// Release transport resources.
    ///
    /// In-flight acquisitions keep running until the runtime stops.
    pub fn shutdown(&self) {
        info!("Shutting down chunk transport");
        self.inner.transport.shutdown();
    }
}

impl<L: ObjectLoader> Inner<L> {
    async fn initialize(&self) {
        let outcome = bootstrap::bootstrap(&self.config, self.transport.as_ref()).await;
        self.metrics
            .manifest_entries_skipped(outcome.report.skipped.len() as u64);

        // Registry must be visible before any observer wakes
        if self.state.set(outcome).is_err() {
            error!("Initialization ran twice");
            return;
        }
        if self.init.try_set(()).is_err() {
            error!("Initialization barrier opened twice");
        }
    }

    fn registry(&self) -> CoordinatorResult<&PackageRegistry> {
        self.state
            .get()
            .map(|state| &state.registry)
            .ok_or_else(|| CoordinatorError::invariant("registry used before initialization"))
    }

    fn begin_acquisition(
        self: &Arc<Self>,
        chunk_id: &str,
    ) -> CoordinatorResult<BoxFuture<'static, CoordinatorResult<()>>> {
        let resolved = self.registry()?.resolve(
            chunk_id,
            self.config.version_policy,
            self.config.default_version.as_ref(),
        );

        let (package, selected) = match resolved {
            Ok(found) => found,
            Err(e @ CoordinatorError::ChunkNotFound { .. }) => {
                self.metrics.chunk_not_found();
                debug!(chunk_id, "Downloading DLC chunk: no registered package");
                return Err(e);
            }
            Err(e) => {
                error!(chunk_id, error = %e, "Downloading DLC chunk failed");
                return Err(e);
            }
        };

        match package.begin_acquisition(|_| Ok(selected))? {
            AcquireStep::Owner { target, completion } => {
                self.metrics.acquisition_started();
                info!(
                    chunk_id,
                    package = %package.name(),
                    version = %target.version,
                    chunk_number = target.chunk_number,
                    "Downloading DLC chunk"
                );
                self.drive(package, target);
                Ok(Box::pin(async move {
                    completion.await?;
                    Ok(())
                }))
            }
            AcquireStep::InFlight(completion) => {
                self.metrics.acquisition_coalesced();
                debug!(chunk_id, package = %package.name(), "Downloading DLC chunk: already in flight");
                Ok(Box::pin(async move {
                    completion.await?;
                    Ok(())
                }))
            }
            AcquireStep::Mounted => {
                self.metrics.already_mounted();
                trace!(chunk_id, package = %package.name(), "Downloading DLC chunk: already mounted");
                Ok(Box::pin(future::ready(Ok(()))))
            }
        }
    }

    /// Issue the download and mount for an owned acquisition.
    ///
    /// Transport failures are logged and counted; the package still moves
    /// to `Mounted` once the mount step reports back.
    fn drive(self: &Arc<Self>, package: Arc<Package>, target: VersionInfo) {
        let chunks = [target.chunk_number];
        let download = self
            .transport
            .download_chunks(&chunks, self.config.download_priority);
        let loading = self.transport.begin_loading_mode();

        let inner = Arc::clone(self);
        let name = package.name().to_string();
        let chunk_number = target.chunk_number;
        self.runtime.spawn(async move {
            if !download.await {
                inner.transport_failed(&name, chunk_number, "download");
            }
        });

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let name = package.name();
            if !loading.await {
                inner.transport_failed(name, target.chunk_number, "loading mode");
            }

            trace!(package = %name, chunk_number = target.chunk_number, "Mounting DLC chunk");
            if !inner.transport.mount_chunk(target.chunk_number).await {
                inner.transport_failed(name, target.chunk_number, "mount");
            }

            // Counted before waiters wake so they observe it
            inner.metrics.mount_completed();
            match package.finish_acquisition(target.chunk_number) {
                Ok(mounted) => {
                    info!(
                        package = %name,
                        version = %mounted.version,
                        chunk_number = mounted.chunk_number,
                        "Downloading DLC chunk: mounted"
                    );
                }
                Err(e) => error!(package = %name, error = %e, "Downloading DLC chunk failed"),
            }
        });
    }

    fn transport_failed(&self, package: &str, chunk_number: i32, step: &str) {
        self.metrics.transport_failure();
        warn!(package, chunk_number, step, "Downloading DLC chunk: transport reported failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::package::PackageStatus;
    use crate::transport::{ChunkNumber, ManifestEntry};

    struct InstantTransport;

    impl ChunkTransport for InstantTransport {
        fn initialize(&self, _: &str, _: usize) {}

        fn update_build(&self, _: &str, _: &str) -> BoxFuture<'static, bool> {
            Box::pin(async { true })
        }

        fn load_cached_build(&self, _: &str) -> BoxFuture<'static, bool> {
            Box::pin(async { false })
        }

        fn manifest_entries(&self) -> Vec<ManifestEntry> {
            vec![
                ManifestEntry::new("Expansion1_1.0.0", 3),
                ManifestEntry::new("_1.0.0", 5),
            ]
        }

        fn download_chunks(&self, _: &[ChunkNumber], _: i32) -> BoxFuture<'static, bool> {
            Box::pin(async { true })
        }

        fn begin_loading_mode(&self) -> BoxFuture<'static, bool> {
            Box::pin(async { true })
        }

        fn mount_chunk(&self, _: ChunkNumber) -> BoxFuture<'static, bool> {
            Box::pin(async { false })
        }
    }

    struct EchoLoader;

    impl ObjectLoader for EchoLoader {
        type Object = String;

        fn try_get_resolved(&self, _: &str) -> Option<String> {
            None
        }

        fn load_async(&self, reference: &str) -> BoxFuture<'static, Option<String>> {
            let reference = reference.to_string();
            Box::pin(async move { Some(reference) })
        }
    }

    fn start() -> Coordinator<EchoLoader> {
        Coordinator::start(
            CoordinatorConfig::default(),
            Arc::new(InstantTransport),
            Arc::new(EchoLoader),
        )
        .unwrap()
    }

    #[test]
    fn test_start_outside_runtime() {
        let result = Coordinator::start(
            CoordinatorConfig::default(),
            Arc::new(InstantTransport),
            Arc::new(EchoLoader),
        );
        assert!(matches!(result, Err(CoordinatorError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn test_ready_publishes_registry() {
        let coordinator = start();
        coordinator.ready().await.unwrap();

        assert!(coordinator.is_ready());
        assert_eq!(coordinator.registry().unwrap().len(), 1);
        assert_eq!(coordinator.manifest_source(), Some(ManifestSource::Fresh));
        assert_eq!(coordinator.ingest_report().unwrap().skipped.len(), 1);
        assert_eq!(coordinator.metrics().manifest_entries_skipped, 1);
    }

    #[tokio::test]
    async fn test_acquire_before_ready_waits_for_barrier() {
        let coordinator = start();

        tokio::time::timeout(Duration::from_secs(1), coordinator.acquire("Expansion1"))
            .await
            .unwrap()
            .unwrap();

        let package = coordinator.registry().unwrap().get("Expansion1").unwrap();
        assert_eq!(package.status(), PackageStatus::Mounted);
    }

    #[tokio::test]
    async fn test_failed_mount_still_reaches_mounted() {
        let coordinator = start();
        coordinator.ready().await.unwrap();

        coordinator.acquire("Expansion1").await.unwrap();

        let metrics = coordinator.metrics();
        assert_eq!(metrics.transport_failures, 1);
        assert_eq!(metrics.mounts_completed, 1);
    }

    #[tokio::test]
    async fn test_acquire_unknown_chunk_fails_fast() {
        let coordinator = start();
        coordinator.ready().await.unwrap();

        let err = coordinator.acquire("Nope").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::ChunkNotFound { .. }));
        assert_eq!(coordinator.metrics().chunks_not_found, 1);
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let coordinator = start();
        let clone = coordinator.clone();
        clone.ready().await.unwrap();

        coordinator.acquire("Expansion1").await.unwrap();
        clone.acquire("Expansion1").await.unwrap();

        assert_eq!(clone.metrics().acquisitions_started, 1);
        assert_eq!(clone.metrics().already_mounted, 1);
    }
}
