//! Directory-backed chunk transport and object loader.
//!
//! A local directory plays the CDN and another one the installed content:
//!
//! ```text
//! <cdn>/
//! ├── manifest.json                 [{ chunk_id, chunk_number, file }, ...]
//! └── Game/DLC_Expansion1/Hero      files named by the manifest
//!
//! <content>/
//! ├── cached-manifest.json          last successfully fetched manifest
//! ├── .staging/<chunk_number>/...   downloaded, not yet mounted
//! ├── mounted/<chunk_number>/...    mounted chunks
//! └── Game/Maps/Town                base content
//! ```
//!
//! Downloading copies a chunk's files into the staging area; mounting moves
//! the staged chunk under `mounted/`. The loader looks a reference up as a
//! relative path in the base content first and then in every mounted chunk.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future;
use pakfetch::{BoxFuture, ChunkNumber, ChunkTransport, ManifestEntry, ObjectLoader};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Manifest file name inside the CDN directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Cached manifest file name inside the content directory.
pub const CACHED_MANIFEST_FILE: &str = "cached-manifest.json";

/// Staging area for downloaded chunks.
pub const STAGING_DIR: &str = ".staging";

/// Directory holding mounted chunks.
pub const MOUNTED_DIR: &str = "mounted";

/// One file of the CDN manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    #[serde(flatten)]
    pub entry: ManifestEntry,
    /// Path of the file relative to the CDN root.
    pub file: String,
}

impl From<&ManifestRecord> for ManifestEntry {
    fn from(record: &ManifestRecord) -> Self {
        record.entry.clone()
    }
}

/// Parse manifest JSON text.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestRecord>, CliError> {
    serde_json::from_str(text).map_err(|e| CliError::Manifest(e.to_string()))
}

/// Read and parse a manifest file.
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestRecord>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&text)
}

async fn read_manifest(path: &Path) -> Result<Vec<ManifestRecord>, CliError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_manifest(&text)
}

/// Turn a reference or manifest path into a safe relative path.
///
/// Leading slashes are ignored; anything but plain components is rejected.
fn relative_path(path: &str) -> Option<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    let mut components = relative.components().peekable();
    components.peek()?;

    components
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| relative.to_path_buf())
}

// =============================================================================
// Transport
// =============================================================================

/// Chunk transport reading from a CDN directory.
pub struct DirectoryTransport {
    shared: Arc<TransportState>,
}

struct TransportState {
    cdn_dir: PathBuf,
    content_dir: PathBuf,
    records: Mutex<Vec<ManifestRecord>>,
    initialized: AtomicBool,
    permits: Semaphore,
    pending_downloads: AtomicUsize,
    downloads_idle: Notify,
}

impl DirectoryTransport {
    /// Create a transport. Downloads stay blocked until
    /// [`initialize`](ChunkTransport::initialize) grants download slots.
    pub fn new(cdn_dir: impl Into<PathBuf>, content_dir: impl Into<PathBuf>) -> Self {
        Self {
            shared: Arc::new(TransportState {
                cdn_dir: cdn_dir.into(),
                content_dir: content_dir.into(),
                records: Mutex::new(Vec::new()),
                initialized: AtomicBool::new(false),
                permits: Semaphore::new(0),
                pending_downloads: AtomicUsize::new(0),
                downloads_idle: Notify::new(),
            }),
        }
    }
}

impl TransportState {
    fn cached_manifest(&self) -> PathBuf {
        self.content_dir.join(CACHED_MANIFEST_FILE)
    }

    fn staging_dir(&self, chunk: ChunkNumber) -> PathBuf {
        self.content_dir.join(STAGING_DIR).join(chunk.to_string())
    }

    fn mounted_dir(&self, chunk: ChunkNumber) -> PathBuf {
        self.content_dir.join(MOUNTED_DIR).join(chunk.to_string())
    }

    async fn cache_manifest(&self, records: &[ManifestRecord]) {
        let path = self.cached_manifest();
        let result = match serde_json::to_string_pretty(records) {
            Ok(json) => match tokio::fs::create_dir_all(&self.content_dir).await {
                Ok(()) => tokio::fs::write(&path, json).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(e.to_string()),
        };

        if let Err(e) = result {
            warn!(error = %e, path = %path.display(), "Failed to cache manifest");
        }
    }

    async fn download(&self, files: Vec<(ChunkNumber, String)>) -> bool {
        let Ok(_permit) = self.permits.acquire().await else {
            return false;
        };

        if files.is_empty() {
            warn!("No manifest files for requested chunks");
            return false;
        }

        for (chunk, file) in files {
            let Some(relative) = relative_path(&file) else {
                warn!(file = %file, "Manifest file path is not a plain relative path");
                return false;
            };

            let source = self.cdn_dir.join(&relative);
            let target = self.staging_dir(chunk).join(&relative);
            if let Some(parent) = target.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!(error = %e, path = %parent.display(), "Failed to create staging directory");
                    return false;
                }
            }

            match tokio::fs::copy(&source, &target).await {
                Ok(bytes) => debug!(chunk, file = %file, bytes, "Downloaded file"),
                Err(e) => {
                    warn!(error = %e, source = %source.display(), "Failed to download file");
                    return false;
                }
            }
        }

        true
    }

    async fn mount(&self, chunk: ChunkNumber) -> bool {
        let staged = self.staging_dir(chunk);
        let target = self.mounted_dir(chunk);

        if tokio::fs::metadata(&staged).await.is_err() {
            warn!(chunk, "Chunk is not staged");
            return false;
        }
        if let Some(parent) = target.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(error = %e, "Failed to create mount directory");
                return false;
            }
        }
        if tokio::fs::metadata(&target).await.is_ok() {
            if let Err(e) = tokio::fs::remove_dir_all(&target).await {
                warn!(error = %e, path = %target.display(), "Failed to replace mounted chunk");
                return false;
            }
        }

        match tokio::fs::rename(&staged, &target).await {
            Ok(()) => {
                info!(chunk, path = %target.display(), "Mounted chunk");
                true
            }
            Err(e) => {
                warn!(error = %e, chunk, "Failed to mount chunk");
                false
            }
        }
    }
}

impl ChunkTransport for DirectoryTransport {
    fn initialize(&self, platform: &str, max_concurrent_downloads: usize) {
        if !self.shared.initialized.swap(true, Ordering::SeqCst) {
            self.shared.permits.add_permits(max_concurrent_downloads.max(1));
        }
        info!(
            platform,
            max_concurrent_downloads,
            cdn = %self.shared.cdn_dir.display(),
            "Directory transport initialized"
        );
    }

    fn cached_manifest_path(&self) -> Option<PathBuf> {
        Some(self.shared.cached_manifest())
    }

    fn update_build(&self, deployment_name: &str, build_id: &str) -> BoxFuture<'static, bool> {
        info!(deployment = deployment_name, build = build_id, "Fetching build manifest");
        let shared = Arc::clone(&self.shared);

        Box::pin(async move {
            match read_manifest(&shared.cdn_dir.join(MANIFEST_FILE)).await {
                Ok(records) => {
                    shared.cache_manifest(&records).await;
                    *shared.records.lock() = records;
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Failed to fetch build manifest");
                    false
                }
            }
        })
    }

    fn load_cached_build(&self, deployment_name: &str) -> BoxFuture<'static, bool> {
        debug!(deployment = deployment_name, "Loading cached build manifest");
        let shared = Arc::clone(&self.shared);

        Box::pin(async move {
            match read_manifest(&shared.cached_manifest()).await {
                Ok(records) => {
                    *shared.records.lock() = records;
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load cached manifest");
                    false
                }
            }
        })
    }

    fn manifest_entries(&self) -> Vec<ManifestEntry> {
        self.shared.records.lock().iter().map(ManifestEntry::from).collect()
    }

    fn download_chunks(&self, chunks: &[ChunkNumber], priority: i32) -> BoxFuture<'static, bool> {
        let files: Vec<_> = self
            .shared
            .records
            .lock()
            .iter()
            .filter(|record| chunks.contains(&record.entry.chunk_number))
            .map(|record| (record.entry.chunk_number, record.file.clone()))
            .collect();
        debug!(?chunks, priority, files = files.len(), "Downloading chunks");

        let shared = Arc::clone(&self.shared);
        shared.pending_downloads.fetch_add(1, Ordering::SeqCst);

        Box::pin(async move {
            let ok = shared.download(files).await;
            if shared.pending_downloads.fetch_sub(1, Ordering::SeqCst) == 1 {
                shared.downloads_idle.notify_waiters();
            }
            ok
        })
    }

    fn begin_loading_mode(&self) -> BoxFuture<'static, bool> {
        let shared = Arc::clone(&self.shared);

        Box::pin(async move {
            loop {
                let mut idle = std::pin::pin!(shared.downloads_idle.notified());
                idle.as_mut().enable();
                if shared.pending_downloads.load(Ordering::SeqCst) == 0 {
                    return true;
                }
                idle.await;
            }
        })
    }

    fn mount_chunk(&self, chunk: ChunkNumber) -> BoxFuture<'static, bool> {
        let shared = Arc::clone(&self.shared);
        Box::pin(async move { shared.mount(chunk).await })
    }

    fn shutdown(&self) {
        self.shared.permits.close();
        debug!("Directory transport shut down");
    }
}

// =============================================================================
// Loader
// =============================================================================

/// A file found for a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub reference: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Loader resolving references to files in the content directory.
pub struct FileLoader {
    content_dir: PathBuf,
    resolved: Arc<Mutex<HashMap<String, LoadedFile>>>,
}

impl FileLoader {
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
            resolved: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

async fn candidate_roots(content_dir: &Path) -> Vec<PathBuf> {
    let mut roots = vec![content_dir.to_path_buf()];

    let mut mounted = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(content_dir.join(MOUNTED_DIR)).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            mounted.push(entry.path());
        }
    }
    mounted.sort();

    roots.extend(mounted);
    roots
}

impl ObjectLoader for FileLoader {
    type Object = LoadedFile;

    fn try_get_resolved(&self, reference: &str) -> Option<LoadedFile> {
        self.resolved.lock().get(reference).cloned()
    }

    fn load_async(&self, reference: &str) -> BoxFuture<'static, Option<LoadedFile>> {
        let Some(relative) = relative_path(reference) else {
            return Box::pin(future::ready(None));
        };
        let reference = reference.to_string();
        let content_dir = self.content_dir.clone();
        let resolved = Arc::clone(&self.resolved);

        Box::pin(async move {
            for root in candidate_roots(&content_dir).await {
                let path = root.join(&relative);
                let Ok(metadata) = tokio::fs::metadata(&path).await else {
                    continue;
                };
                if !metadata.is_file() {
                    continue;
                }

                let file = LoadedFile {
                    reference: reference.clone(),
                    path,
                    size: metadata.len(),
                };
                resolved.lock().insert(reference, file.clone());
                return Some(file);
            }
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use pakfetch::{Coordinator, CoordinatorConfig, ManifestSource};

    const MANIFEST: &str = r#"[
        { "chunk_id": "Expansion1_1.0.0", "chunk_number": 3, "file": "Game/DLC_Expansion1/Hero" },
        { "chunk_id": "Expansion1_1.0.0", "chunk_number": 3, "file": "Game/DLC_Expansion1/Sword" }
    ]"#;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn start(cdn: &Path, content: &Path) -> Coordinator<FileLoader> {
        Coordinator::start(
            CoordinatorConfig::default(),
            Arc::new(DirectoryTransport::new(cdn, content)),
            Arc::new(FileLoader::new(content)),
        )
        .unwrap()
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path("/Game/DLC_Foo/Asset"),
            Some(PathBuf::from("Game/DLC_Foo/Asset"))
        );
        assert_eq!(relative_path("Game/Asset"), Some(PathBuf::from("Game/Asset")));
        assert_eq!(relative_path("/Game/../../etc/passwd"), None);
        assert_eq!(relative_path("/"), None);
        assert_eq!(relative_path(""), None);
    }

    #[test]
    fn test_parse_manifest() {
        let records = parse_manifest(MANIFEST).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entry.chunk_number, 3);
        assert_eq!(
            ManifestEntry::from(&records[1]),
            ManifestEntry::new("Expansion1_1.0.0", 3)
        );
    }

    #[test]
    fn test_parse_manifest_invalid() {
        assert!(matches!(
            parse_manifest("{ not json"),
            Err(CliError::Manifest(_))
        ));
    }

    #[test]
    fn test_load_manifest_missing_file() {
        assert!(matches!(
            load_manifest(Path::new("/nonexistent/manifest.json")),
            Err(CliError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_from_directories() {
        let cdn = tempfile::tempdir().unwrap();
        let content = tempfile::tempdir().unwrap();
        write(&cdn.path().join(MANIFEST_FILE), MANIFEST);
        write(&cdn.path().join("Game/DLC_Expansion1/Hero"), "hero");
        write(&cdn.path().join("Game/DLC_Expansion1/Sword"), "sword");
        write(&content.path().join("Game/Maps/Town"), "town");

        let coordinator = start(cdn.path(), content.path());

        let hero = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.resolve_reference("/Game/DLC_Expansion1/Hero"),
        )
        .await
        .unwrap()
        .unwrap()
        .unwrap();
        assert_eq!(
            hero.path,
            content.path().join("mounted/3/Game/DLC_Expansion1/Hero")
        );
        assert_eq!(hero.size, 4);

        let town = coordinator
            .resolve_reference("/Game/Maps/Town")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(town.path, content.path().join("Game/Maps/Town"));

        let missing = coordinator
            .resolve_reference("/Game/DLC_Expansion1/Shield")
            .await
            .unwrap();
        assert!(missing.is_none());

        assert!(content.path().join(CACHED_MANIFEST_FILE).exists());
        assert!(!content.path().join(STAGING_DIR).join("3").exists());
        assert_eq!(coordinator.metrics().acquisitions_started, 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_cached_manifest() {
        let cdn = tempfile::tempdir().unwrap();
        let content = tempfile::tempdir().unwrap();
        write(&content.path().join(CACHED_MANIFEST_FILE), MANIFEST);

        let coordinator = start(cdn.path(), content.path());
        coordinator.ready().await.unwrap();

        assert_eq!(coordinator.manifest_source(), Some(ManifestSource::Cached));
        assert!(coordinator.registry().unwrap().get("Expansion1").is_some());
        assert!(content.path().join(CACHED_MANIFEST_FILE).exists());
    }

    #[tokio::test]
    async fn test_mount_unstaged_chunk_fails() {
        let content = tempfile::tempdir().unwrap();
        let transport = DirectoryTransport::new(content.path(), content.path());

        assert!(!transport.mount_chunk(9).await);
    }

    #[tokio::test]
    async fn test_loader_caches_resolved_files() {
        let content = tempfile::tempdir().unwrap();
        write(&content.path().join("Game/Maps/Town"), "town");
        let loader = FileLoader::new(content.path());

        assert!(loader.try_get_resolved("/Game/Maps/Town").is_none());
        assert!(loader.load_async("/Game/Maps/Town").await.is_some());
        assert!(loader.is_already_resolved("/Game/Maps/Town"));
    }
}
