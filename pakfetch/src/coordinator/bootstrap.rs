//! Initialization sequence run before the barrier opens.
//!
//! ```text
//! initialize(platform, max_concurrent)
//!        │
//!        ▼
//! move cached manifest aside ──(none)──┐
//!        │                              │
//!        ▼                              ▼
//!             update_build(deployment, build)
//!        │ ok                           │ failed
//!        ▼                              ▼
//! discard backup              restore backup + load_cached_build
//!        │                              │
//!        └──────────────┬───────────────┘
//!                       ▼
//!          ingest manifest → PackageRegistry
//! ```
//!
//! The caller publishes the registry and then opens the barrier, so every
//! observer of the barrier sees a fully ingested registry.

use std::fmt;

use tracing::{debug, info, warn};

use super::cache_guard::ManifestCacheGuard;
use crate::config::CoordinatorConfig;
use crate::package::{IngestReport, PackageRegistry};
use crate::transport::ChunkTransport;

/// Where the ingested manifest came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestSource {
    /// The build update succeeded.
    Fresh,
    /// The build update failed and the cached manifest was reloaded.
    Cached,
    /// The build update failed with no cached manifest to fall back to.
    Unavailable,
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Cached => write!(f, "cached"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Result of the initialization sequence.
#[derive(Debug)]
pub struct BootstrapOutcome {
    pub registry: PackageRegistry,
    pub report: IngestReport,
    pub source: ManifestSource,
}

/// Run the initialization sequence against a transport.
///
/// Never fails: a failed build update falls back to the cached manifest,
/// and whatever manifest the transport ends up exposing is ingested.
pub async fn bootstrap(
    config: &CoordinatorConfig,
    transport: &dyn ChunkTransport,
) -> BootstrapOutcome {
    info!(
        platform = %config.platform,
        deployment = %config.deployment_name,
        build = %config.content_build_id,
        "Initialization started"
    );

    transport.initialize(&config.platform, config.max_concurrent_downloads);

    let guard = match transport.cached_manifest_path() {
        Some(path) => ManifestCacheGuard::move_aside(&path).await,
        None => None,
    };

    let updated = transport
        .update_build(&config.deployment_name, &config.content_build_id)
        .await;

    let source = if updated {
        if let Some(guard) = guard {
            if let Err(e) = guard.commit().await {
                warn!(error = %e, "Initialization: failed to discard cached manifest backup");
            }
        }
        ManifestSource::Fresh
    } else {
        warn!(
            deployment = %config.deployment_name,
            build = %config.content_build_id,
            "Initialization: build update failed"
        );
        recover(config, transport, guard).await
    };

    let (registry, report) = PackageRegistry::from_manifest(
        transport.manifest_entries(),
        config.default_version.as_ref(),
    );

    info!(
        source = %source,
        packages = registry.len(),
        accepted = report.accepted,
        skipped = report.skipped.len(),
        "Initialization complete"
    );

    BootstrapOutcome {
        registry,
        report,
        source,
    }
}

async fn recover(
    config: &CoordinatorConfig,
    transport: &dyn ChunkTransport,
    guard: Option<ManifestCacheGuard>,
) -> ManifestSource {
    let Some(guard) = guard else {
        debug!("Initialization: no cached manifest to recover");
        return ManifestSource::Unavailable;
    };

    if let Err(e) = guard.restore().await {
        warn!(error = %e, "Initialization: failed to restore cached manifest");
        return ManifestSource::Unavailable;
    }

    if transport.load_cached_build(&config.deployment_name).await {
        info!(deployment = %config.deployment_name, "Initialization: using cached build");
        ManifestSource::Cached
    } else {
        warn!(deployment = %config.deployment_name, "Initialization: cached build failed to load");
        ManifestSource::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use crate::transport::{BoxFuture, ChunkNumber, ManifestEntry};

    struct ScriptedTransport {
        cache_path: Option<PathBuf>,
        update_succeeds: bool,
        entries: Vec<ManifestEntry>,
        initialized: Mutex<Option<(String, usize)>>,
        cached_loads: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(update_succeeds: bool, cache_path: Option<PathBuf>) -> Self {
            Self {
                cache_path,
                update_succeeds,
                entries: vec![
                    ManifestEntry::new("Expansion1_1.0.0", 3),
                    ManifestEntry::new("", 4),
                ],
                initialized: Mutex::new(None),
                cached_loads: AtomicUsize::new(0),
            }
        }
    }

    impl ChunkTransport for ScriptedTransport {
        fn initialize(&self, platform: &str, max_concurrent_downloads: usize) {
            *self.initialized.lock() = Some((platform.to_string(), max_concurrent_downloads));
        }

        fn cached_manifest_path(&self) -> Option<PathBuf> {
            self.cache_path.clone()
        }

        fn update_build(&self, _deployment: &str, _build: &str) -> BoxFuture<'static, bool> {
            let ok = self.update_succeeds;
            Box::pin(async move { ok })
        }

        fn load_cached_build(&self, _deployment: &str) -> BoxFuture<'static, bool> {
            self.cached_loads.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { true })
        }

        fn manifest_entries(&self) -> Vec<ManifestEntry> {
            self.entries.clone()
        }

        fn download_chunks(&self, _: &[ChunkNumber], _: i32) -> BoxFuture<'static, bool> {
            Box::pin(async { true })
        }

        fn begin_loading_mode(&self) -> BoxFuture<'static, bool> {
            Box::pin(async { true })
        }

        fn mount_chunk(&self, _: ChunkNumber) -> BoxFuture<'static, bool> {
            Box::pin(async { true })
        }
    }

    #[tokio::test]
    async fn test_bootstrap_fresh_without_cache() {
        let config = CoordinatorConfig::default().with_platform("Linux");
        let transport = ScriptedTransport::new(true, None);

        let outcome = bootstrap(&config, &transport).await;

        assert_eq!(outcome.source, ManifestSource::Fresh);
        assert_eq!(
            *transport.initialized.lock(),
            Some(("Linux".to_string(), 8))
        );
        assert_eq!(outcome.registry.len(), 1);
        assert_eq!(outcome.report.accepted, 1);
        assert_eq!(outcome.report.skipped.len(), 1);
        assert_eq!(transport.cached_loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_fresh_discards_backup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cached.manifest");
        std::fs::write(&cache, "stale").unwrap();

        let transport = ScriptedTransport::new(true, Some(cache.clone()));
        let outcome = bootstrap(&CoordinatorConfig::default(), &transport).await;

        assert_eq!(outcome.source, ManifestSource::Fresh);
        assert!(!cache.exists());
        assert!(!dir.path().join("cached.manifest.renamed").exists());
    }

    #[tokio::test]
    async fn test_bootstrap_failure_restores_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cached.manifest");
        std::fs::write(&cache, "known good").unwrap();

        let transport = ScriptedTransport::new(false, Some(cache.clone()));
        let outcome = bootstrap(&CoordinatorConfig::default(), &transport).await;

        assert_eq!(outcome.source, ManifestSource::Cached);
        assert_eq!(std::fs::read_to_string(&cache).unwrap(), "known good");
        assert_eq!(transport.cached_loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_failure_without_cache() {
        let transport = ScriptedTransport::new(false, None);
        let outcome = bootstrap(&CoordinatorConfig::default(), &transport).await;

        assert_eq!(outcome.source, ManifestSource::Unavailable);
        assert_eq!(transport.cached_loads.load(Ordering::SeqCst), 0);
        // Whatever the transport exposes is still ingested
        assert_eq!(outcome.registry.len(), 1);
    }
}
