//! Cached manifest bookkeeping around a build update.
//!
//! The transport keeps a local copy of the last build manifest and prefers
//! it over the CDN. Before updating the build, the cached copy is moved
//! aside so the fresh manifest is always fetched. Afterwards the backup is
//! either discarded (update succeeded) or moved back so the cached build
//! can be loaded instead (update failed).

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{CoordinatorError, CoordinatorResult};

/// Suffix appended to the cached manifest while it is moved aside.
pub const MOVED_FILE_SUFFIX: &str = ".renamed";

/// A cached manifest that has been moved aside.
#[derive(Debug)]
pub struct ManifestCacheGuard {
    original: PathBuf,
    moved: PathBuf,
}

impl ManifestCacheGuard {
    /// Move the cached manifest at `path` aside.
    ///
    /// Returns `None` when there is no cached manifest or it cannot be moved;
    /// the update then proceeds without a fallback.
    pub async fn move_aside(path: &Path) -> Option<Self> {
        let moved = moved_path(path);

        match tokio::fs::rename(path, &moved).await {
            Ok(()) => {
                debug!(
                    original = %path.display(),
                    moved = %moved.display(),
                    "Moved cached manifest aside"
                );
                Some(Self {
                    original: path.to_path_buf(),
                    moved,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cached manifest to move aside");
                None
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to move cached manifest aside");
                None
            }
        }
    }

    /// Path of the cached manifest.
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Path of the moved-aside backup.
    pub fn moved(&self) -> &Path {
        &self.moved
    }

    /// Discard the backup after a successful update.
    pub async fn commit(self) -> CoordinatorResult<()> {
        tokio::fs::remove_file(&self.moved)
            .await
            .map_err(|source| CoordinatorError::Io {
                path: self.moved.clone(),
                source,
            })?;
        debug!(moved = %self.moved.display(), "Discarded cached manifest backup");
        Ok(())
    }

    /// Put the backup back in place after a failed update.
    pub async fn restore(self) -> CoordinatorResult<()> {
        tokio::fs::rename(&self.moved, &self.original)
            .await
            .map_err(|source| CoordinatorError::Io {
                path: self.moved.clone(),
                source,
            })?;
        debug!(original = %self.original.display(), "Restored cached manifest");
        Ok(())
    }
}

fn moved_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(MOVED_FILE_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moved_path() {
        assert_eq!(
            moved_path(Path::new("/cache/build.manifest")),
            PathBuf::from("/cache/build.manifest.renamed")
        );
    }

    #[tokio::test]
    async fn test_move_aside_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.manifest");

        assert!(ManifestCacheGuard::move_aside(&path).await.is_none());
    }

    #[tokio::test]
    async fn test_move_aside_and_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.manifest");
        std::fs::write(&path, "old manifest").unwrap();

        let guard = ManifestCacheGuard::move_aside(&path).await.unwrap();
        assert!(!path.exists());
        assert!(guard.moved().exists());

        let moved = guard.moved().to_path_buf();
        guard.commit().await.unwrap();
        assert!(!moved.exists());
    }

    #[tokio::test]
    async fn test_move_aside_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.manifest");
        std::fs::write(&path, "old manifest").unwrap();

        let guard = ManifestCacheGuard::move_aside(&path).await.unwrap();
        assert_eq!(guard.original(), path.as_path());
        guard.restore().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old manifest");
    }

    #[tokio::test]
    async fn test_commit_missing_backup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.manifest");
        std::fs::write(&path, "old manifest").unwrap();

        let guard = ManifestCacheGuard::move_aside(&path).await.unwrap();
        std::fs::remove_file(guard.moved()).unwrap();

        assert!(matches!(
            guard.commit().await,
            Err(CoordinatorError::Io { .. })
        ));
    }
}
