//! Core DLC package type and its acquisition state.
//!
//! The [`Package`] struct represents one logical DLC unit: a name, every
//! version the manifest advertises for it, and where it currently stands in
//! the download/mount lifecycle.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use semver::Version;

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::promise::{CompletionPromise, PromiseFuture};
use crate::transport::ChunkNumber;

/// A version of a package and the remote chunk that carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Package version.
    pub version: Version,

    /// Remote chunk holding this version.
    pub chunk_number: ChunkNumber,
}

impl VersionInfo {
    /// Create a version entry.
    pub fn new(version: Version, chunk_number: ChunkNumber) -> Self {
        Self {
            version,
            chunk_number,
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{} (chunk {})", self.version, self.chunk_number)
    }
}

/// Where a package, or one of its chunks, stands in its acquisition
/// lifecycle.
///
/// Transitions only move forward:
///
/// ```text
/// NotDownloaded ──► DownloadingAndMounting ──► Mounted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStatus {
    /// No acquisition has been requested yet.
    NotDownloaded,
    /// A download and mount is in flight.
    DownloadingAndMounting,
    /// The chunk is mounted and its content can be loaded.
    Mounted,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotDownloaded => "NotDownloaded",
            Self::DownloadingAndMounting => "DownloadingAndMounting",
            Self::Mounted => "Mounted",
        };
        f.write_str(name)
    }
}

/// Acquisition state of one chunk, with the data valid only in each state.
///
/// A chunk with no entry is `NotDownloaded`.
enum ChunkState {
    DownloadingAndMounting { promise: Arc<CompletionPromise> },
    Mounted,
}

struct Acquisition {
    target: VersionInfo,
    state: ChunkState,
}

/// Outcome of the atomic check-and-transition performed by
/// [`Package::begin_acquisition`].
pub(crate) enum AcquireStep {
    /// This caller moved the selected chunk out of `NotDownloaded` and must
    /// issue the download and mount for `target`.
    Owner {
        target: VersionInfo,
        completion: PromiseFuture<()>,
    },
    /// Another caller owns the in-flight acquisition of the same chunk.
    InFlight(PromiseFuture<()>),
    /// Nothing to do.
    Mounted,
}

/// A logical DLC package.
///
/// Acquisition state is tracked per selected chunk, in the order the
/// chunks were first requested. With the `Latest` policy every request
/// selects the same chunk, so the package moves through the lifecycle as
/// a single unit.
pub struct Package {
    name: String,
    versions: Vec<VersionInfo>,
    acquisitions: Mutex<Vec<Acquisition>>,
}

impl Package {
    /// Create a package with no versions.
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: Vec::new(),
            acquisitions: Mutex::new(Vec::new()),
        }
    }

    /// Package name (unique within a registry).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Known versions, in manifest discovery order.
    pub fn versions(&self) -> &[VersionInfo] {
        &self.versions
    }

    pub(crate) fn add_version(&mut self, info: VersionInfo) {
        self.versions.push(info);
    }

    /// The entry with the highest version.
    ///
    /// Ties are broken by discovery order: the first entry carrying the
    /// maximum version wins.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvariantViolation`] if the package has no
    /// versions.
    pub fn latest_version(&self) -> CoordinatorResult<&VersionInfo> {
        self.versions
            .iter()
            .reduce(|best, candidate| {
                if candidate.version > best.version {
                    candidate
                } else {
                    best
                }
            })
            .ok_or_else(|| {
                CoordinatorError::invariant(format!("package [{}] has no versions", self.name))
            })
    }

    /// The first entry carrying exactly `version`.
    pub fn find_version(&self, version: &Version) -> Option<&VersionInfo> {
        self.versions.iter().find(|info| &info.version == version)
    }

    /// Current lifecycle status of the package as a whole.
    ///
    /// `DownloadingAndMounting` while any chunk is in flight, otherwise
    /// `Mounted` once any chunk is mounted.
    pub fn status(&self) -> PackageStatus {
        let acquisitions = self.acquisitions.lock();
        if acquisitions
            .iter()
            .any(|a| matches!(a.state, ChunkState::DownloadingAndMounting { .. }))
        {
            PackageStatus::DownloadingAndMounting
        } else if acquisitions.is_empty() {
            PackageStatus::NotDownloaded
        } else {
            PackageStatus::Mounted
        }
    }

    /// Lifecycle status of one of this package's chunks.
    pub fn chunk_status(&self, chunk_number: ChunkNumber) -> PackageStatus {
        match self
            .acquisitions
            .lock()
            .iter()
            .find(|a| a.target.chunk_number == chunk_number)
            .map(|a| &a.state)
        {
            None => PackageStatus::NotDownloaded,
            Some(ChunkState::DownloadingAndMounting { .. }) => {
                PackageStatus::DownloadingAndMounting
            }
            Some(ChunkState::Mounted) => PackageStatus::Mounted,
        }
    }

    /// The first version that was acquired or is being acquired, if any.
    pub fn selected_version(&self) -> Option<VersionInfo> {
        self.acquisitions.lock().first().map(|a| a.target.clone())
    }

    /// Check the selected chunk's state and advance it in one atomic step.
    ///
    /// `select` runs under the package lock; its error leaves the state
    /// untouched.
    pub(crate) fn begin_acquisition<F>(&self, select: F) -> CoordinatorResult<AcquireStep>
    where
        F: FnOnce(&Self) -> CoordinatorResult<VersionInfo>,
    {
        let mut acquisitions = self.acquisitions.lock();
        let target = select(self)?;

        if let Some(existing) = acquisitions
            .iter()
            .find(|a| a.target.chunk_number == target.chunk_number)
        {
            return Ok(match &existing.state {
                ChunkState::DownloadingAndMounting { promise } => {
                    AcquireStep::InFlight(promise.make_future())
                }
                ChunkState::Mounted => AcquireStep::Mounted,
            });
        }

        let promise = Arc::new(CompletionPromise::new());
        let completion = promise.make_future();
        acquisitions.push(Acquisition {
            target: target.clone(),
            state: ChunkState::DownloadingAndMounting { promise },
        });
        Ok(AcquireStep::Owner { target, completion })
    }

    /// Move the in-flight acquisition of `chunk_number` to `Mounted` and
    /// wake its observers.
    ///
    /// The state change is visible before any observer is notified, so a
    /// caller woken by the promise never sees `DownloadingAndMounting`.
    pub(crate) fn finish_acquisition(
        &self,
        chunk_number: ChunkNumber,
    ) -> CoordinatorResult<VersionInfo> {
        let (target, promise) = {
            let mut acquisitions = self.acquisitions.lock();
            let acquisition = acquisitions
                .iter_mut()
                .find(|a| a.target.chunk_number == chunk_number)
                .ok_or_else(|| {
                    CoordinatorError::invariant(format!(
                        "package [{}] finished an acquisition of chunk {} it never started",
                        self.name, chunk_number
                    ))
                })?;

            match std::mem::replace(&mut acquisition.state, ChunkState::Mounted) {
                ChunkState::DownloadingAndMounting { promise } => {
                    (acquisition.target.clone(), promise)
                }
                ChunkState::Mounted => {
                    return Err(CoordinatorError::invariant(format!(
                        "package [{}] chunk {} is already mounted",
                        self.name, chunk_number
                    )));
                }
            }
        };

        promise.complete();
        Ok(target)
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("name", &self.name)
            .field("versions", &self.versions)
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} versions, {})",
            self.name,
            self.versions.len(),
            self.status()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_with(versions: &[(u64, u64, u64, ChunkNumber)]) -> Package {
        let mut package = Package::new("Expansion1");
        for &(major, minor, patch, chunk) in versions {
            package.add_version(VersionInfo::new(Version::new(major, minor, patch), chunk));
        }
        package
    }

    fn latest(package: &Package) -> CoordinatorResult<VersionInfo> {
        package.latest_version().cloned()
    }

    fn v1(package: &Package) -> CoordinatorResult<VersionInfo> {
        Ok(package.find_version(&Version::new(1, 0, 0)).unwrap().clone())
    }

    fn v2(package: &Package) -> CoordinatorResult<VersionInfo> {
        Ok(package.find_version(&Version::new(2, 0, 0)).unwrap().clone())
    }

    #[test]
    fn test_new_package_is_not_downloaded() {
        let package = Package::new("Expansion1");
        assert_eq!(package.name(), "Expansion1");
        assert!(package.versions().is_empty());
        assert_eq!(package.status(), PackageStatus::NotDownloaded);
        assert!(package.selected_version().is_none());
    }

    #[test]
    fn test_latest_version_picks_maximum() {
        let package = package_with(&[(1, 0, 0, 3), (2, 1, 0, 7), (1, 9, 9, 5)]);
        let info = package.latest_version().unwrap();

        assert_eq!(info.version, Version::new(2, 1, 0));
        assert_eq!(info.chunk_number, 7);
    }

    #[test]
    fn test_latest_version_tie_prefers_first_discovered() {
        let package = package_with(&[(1, 0, 0, 3), (2, 0, 0, 8), (2, 0, 0, 9)]);
        assert_eq!(package.latest_version().unwrap().chunk_number, 8);
    }

    #[test]
    fn test_latest_version_empty_is_invariant_violation() {
        let package = Package::new("Empty");
        let err = package.latest_version().unwrap_err();
        assert!(matches!(err, CoordinatorError::InvariantViolation(_)));
    }

    #[test]
    fn test_find_version() {
        let package = package_with(&[(1, 0, 0, 3), (2, 0, 0, 4)]);

        assert_eq!(
            package.find_version(&Version::new(2, 0, 0)).map(|i| i.chunk_number),
            Some(4)
        );
        assert!(package.find_version(&Version::new(3, 0, 0)).is_none());
    }

    #[tokio::test]
    async fn test_acquisition_lifecycle() {
        let package = package_with(&[(1, 0, 0, 3)]);

        let completion = match package.begin_acquisition(latest).unwrap() {
            AcquireStep::Owner { target, completion } => {
                assert_eq!(target.chunk_number, 3);
                completion
            }
            _ => panic!("first caller should own the acquisition"),
        };
        assert_eq!(package.status(), PackageStatus::DownloadingAndMounting);

        let waiter = match package.begin_acquisition(latest).unwrap() {
            AcquireStep::InFlight(waiter) => waiter,
            _ => panic!("second caller should wait on the in-flight acquisition"),
        };

        let mounted = package.finish_acquisition(3).unwrap();
        assert_eq!(mounted.chunk_number, 3);
        assert_eq!(package.status(), PackageStatus::Mounted);
        assert_eq!(package.selected_version(), Some(mounted));
        assert!(package.finish_acquisition(3).is_err());
        assert_eq!(package.status(), PackageStatus::Mounted);

        assert_eq!(completion.await, Ok(()));
        assert_eq!(waiter.await, Ok(()));

        assert!(matches!(
            package.begin_acquisition(latest).unwrap(),
            AcquireStep::Mounted
        ));
    }

    #[test]
    fn test_selection_error_leaves_state_untouched() {
        let package = Package::new("Empty");

        assert!(package.begin_acquisition(latest).is_err());
        assert_eq!(package.status(), PackageStatus::NotDownloaded);
    }

    #[test]
    fn test_finish_without_start_is_invariant_violation() {
        let package = package_with(&[(1, 0, 0, 3)]);

        assert!(package.finish_acquisition(3).is_err());
        assert_eq!(package.status(), PackageStatus::NotDownloaded);
    }

    #[tokio::test]
    async fn test_versions_are_acquired_independently() {
        let package = package_with(&[(1, 0, 0, 3), (2, 0, 0, 7)]);

        let first = match package.begin_acquisition(v1).unwrap() {
            AcquireStep::Owner { target, completion } => {
                assert_eq!(target.chunk_number, 3);
                completion
            }
            _ => panic!("first version should start its own acquisition"),
        };
        let second = match package.begin_acquisition(v2).unwrap() {
            AcquireStep::Owner { target, completion } => {
                assert_eq!(target.chunk_number, 7);
                completion
            }
            _ => panic!("second version must not join the first version's acquisition"),
        };
        assert_eq!(package.chunk_status(7), PackageStatus::DownloadingAndMounting);

        package.finish_acquisition(3).unwrap();
        assert_eq!(package.chunk_status(3), PackageStatus::Mounted);
        assert_eq!(package.chunk_status(7), PackageStatus::DownloadingAndMounting);
        assert_eq!(package.status(), PackageStatus::DownloadingAndMounting);
        assert_eq!(first.await, Ok(()));

        package.finish_acquisition(7).unwrap();
        assert_eq!(package.status(), PackageStatus::Mounted);
        assert_eq!(second.await, Ok(()));

        assert!(matches!(package.begin_acquisition(v2).unwrap(), AcquireStep::Mounted));
        assert_eq!(package.selected_version().map(|v| v.chunk_number), Some(3));
    }

    #[test]
    fn test_unknown_chunk_status_is_not_downloaded() {
        let package = package_with(&[(1, 0, 0, 3)]);
        assert_eq!(package.chunk_status(42), PackageStatus::NotDownloaded);
    }

    #[test]
    fn test_package_display() {
        let package = package_with(&[(1, 0, 0, 3), (1, 1, 0, 4)]);
        assert_eq!(format!("{}", package), "Expansion1 (2 versions, NotDownloaded)");
    }

    #[test]
    fn test_version_info_display() {
        let info = VersionInfo::new(Version::new(1, 2, 3), 9);
        assert_eq!(info.to_string(), "v1.2.3 (chunk 9)");
    }
}
