//! Configuration for the acquisition coordinator.
//!
//! Settings can be built in code with the `with_*` methods or loaded from
//! the `[coordinator]` section of an INI file:
//!
//! ```ini
//! [coordinator]
//! deployment_name = PatchingDemoLive
//! content_build_id = PatchingDemoKey
//! platform = Windows
//! max_concurrent_downloads = 8
//! download_priority = 1
//! root_segment = Game
//! dlc_prefix = DLC_
//! default_version = 1.0.0
//! version_policy = latest
//! ```

use std::path::Path;

use ini::Ini;
use semver::Version;

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::package::{parse_version, ReferenceRules, VersionPolicy, VERSION_ONE};

/// INI section holding coordinator settings.
pub const CONFIG_SECTION: &str = "coordinator";

/// Default CDN deployment name.
pub const DEFAULT_DEPLOYMENT_NAME: &str = "PatchingDemoLive";

/// Default content build identifier.
pub const DEFAULT_CONTENT_BUILD_ID: &str = "PatchingDemoKey";

/// Default platform passed to the transport.
pub const DEFAULT_PLATFORM: &str = "Windows";

/// Default cap on concurrent chunk downloads.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 8;

/// Default priority of chunk download requests.
pub const DEFAULT_DOWNLOAD_PRIORITY: i32 = 1;

/// Configuration for the acquisition coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// CDN deployment (folder) to fetch the manifest from.
    pub deployment_name: String,

    /// Content build identifier of the manifest.
    pub content_build_id: String,

    /// Platform name handed to the transport.
    pub platform: String,

    /// Maximum concurrent chunk downloads.
    pub max_concurrent_downloads: usize,

    /// Priority of chunk download requests.
    pub download_priority: i32,

    /// Rules locating chunk identifiers in asset references.
    pub rules: ReferenceRules,

    /// Version assumed for chunk identifiers without one.
    ///
    /// `None` makes unversioned identifiers unparsable.
    pub default_version: Option<Version>,

    /// How a package version is selected on acquisition.
    pub version_policy: VersionPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            deployment_name: DEFAULT_DEPLOYMENT_NAME.to_string(),
            content_build_id: DEFAULT_CONTENT_BUILD_ID.to_string(),
            platform: DEFAULT_PLATFORM.to_string(),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            download_priority: DEFAULT_DOWNLOAD_PRIORITY,
            rules: ReferenceRules::default(),
            default_version: Some(VERSION_ONE),
            version_policy: VersionPolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Create a configuration for a deployment and build.
    pub fn new(deployment_name: impl Into<String>, content_build_id: impl Into<String>) -> Self {
        Self {
            deployment_name: deployment_name.into(),
            content_build_id: content_build_id.into(),
            ..Default::default()
        }
    }

    /// Set the platform name.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Set the maximum concurrent downloads (minimum 1).
    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = max.max(1);
        self
    }

    /// Set the download priority.
    pub fn with_download_priority(mut self, priority: i32) -> Self {
        self.download_priority = priority;
        self
    }

    /// Set the reference rules.
    pub fn with_rules(mut self, rules: ReferenceRules) -> Self {
        self.rules = rules;
        self
    }

    /// Set the default version for unversioned chunk identifiers.
    pub fn with_default_version(mut self, version: Option<Version>) -> Self {
        self.default_version = version;
        self
    }

    /// Set the version selection policy.
    pub fn with_version_policy(mut self, policy: VersionPolicy) -> Self {
        self.version_policy = policy;
        self
    }

    /// Load configuration from an INI file.
    ///
    /// Missing keys keep their defaults.
    pub fn from_ini(path: &Path) -> CoordinatorResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| {
            CoordinatorError::Config(format!("failed to load {}: {}", path.display(), e))
        })?;
        Self::from_ini_document(&ini)
    }

    /// Load configuration from INI text.
    pub fn from_ini_str(contents: &str) -> CoordinatorResult<Self> {
        let ini = Ini::load_from_str(contents)
            .map_err(|e| CoordinatorError::Config(format!("failed to parse INI: {}", e)))?;
        Self::from_ini_document(&ini)
    }

    fn from_ini_document(ini: &Ini) -> CoordinatorResult<Self> {
        let mut config = Self::default();

        let Some(section) = ini.section(Some(CONFIG_SECTION)) else {
            return Ok(config);
        };

        if let Some(v) = section.get("deployment_name") {
            config.deployment_name = v.to_string();
        }
        if let Some(v) = section.get("content_build_id") {
            config.content_build_id = v.to_string();
        }
        if let Some(v) = section.get("platform") {
            config.platform = v.to_string();
        }
        if let Some(v) = section.get("max_concurrent_downloads") {
            let max: usize = parse_number("max_concurrent_downloads", v)?;
            config.max_concurrent_downloads = max.max(1);
        }
        if let Some(v) = section.get("download_priority") {
            config.download_priority = parse_number("download_priority", v)?;
        }
        if let Some(v) = section.get("root_segment") {
            config.rules.root_segment = v.to_string();
        }
        if let Some(v) = section.get("dlc_prefix") {
            config.rules.dlc_prefix = v.to_string();
        }
        if let Some(v) = section.get("default_version") {
            config.default_version = match v.trim() {
                "" | "none" => None,
                s => parse_version(s),
            };
        }
        if let Some(v) = section.get("version_policy") {
            config.version_policy = VersionPolicy::from_config_str(v).ok_or_else(|| {
                CoordinatorError::Config(format!(
                    "version_policy must be 'latest' or 'exact', got '{}'",
                    v
                ))
            })?;
        }

        if config.rules.root_segment.is_empty() {
            return Err(CoordinatorError::Config(
                "root_segment must not be empty".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> CoordinatorResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CoordinatorError::Config(format!("{} must be a number, got '{}'", key, value)))
}
