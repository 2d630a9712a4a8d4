//! Centralized reference and chunk identifier naming conventions.
//!
//! This module is the single source of truth for how names map onto DLC
//! packages:
//! - Asset reference paths (e.g., `/Game/DLC_Expansion1/Hero`) carry a chunk
//!   identifier in the segment following the content root
//! - Chunk identifiers (e.g., `Expansion1_2.1.0`) carry a package name and an
//!   optional version
//!
//! Both operations are pure string rules. They never touch I/O or
//! coordinator state.

use std::fmt;

use semver::Version;

use super::version::{parse_version, VERSION_ONE};

/// Default content root segment of asset references.
pub const DEFAULT_ROOT_SEGMENT: &str = "Game";

/// Default prefix marking a DLC sub-root directly under the content root.
pub const DEFAULT_DLC_PREFIX: &str = "DLC_";

/// Delimiter between package name and version in a chunk identifier.
pub const CHUNK_ID_DELIMITER: char = '_';

/// Rules for locating a chunk identifier inside an asset reference path.
///
/// # Example
///
/// ```
/// use pakfetch::package::ReferenceRules;
///
/// let rules = ReferenceRules::default();
/// assert_eq!(rules.extract_chunk_id("/Game/DLC_Foo/Asset"), Some("Foo".to_string()));
/// assert_eq!(rules.extract_chunk_id("/Game/Bar/Asset"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRules {
    /// Segment that marks the content root (first occurrence wins).
    pub root_segment: String,

    /// Prefix the segment after the root must start with to name a chunk.
    pub dlc_prefix: String,
}

impl Default for ReferenceRules {
    fn default() -> Self {
        Self {
            root_segment: DEFAULT_ROOT_SEGMENT.to_string(),
            dlc_prefix: DEFAULT_DLC_PREFIX.to_string(),
        }
    }
}

impl ReferenceRules {
    /// Create rules with a custom root segment and DLC prefix.
    pub fn new(root_segment: impl Into<String>, dlc_prefix: impl Into<String>) -> Self {
        Self {
            root_segment: root_segment.into(),
            dlc_prefix: dlc_prefix.into(),
        }
    }

    /// Extract the chunk identifier referenced by an asset path.
    ///
    /// The path is split on `/` (empty segments are dropped). The first
    /// segment equal to the root marker is located; the segment right after
    /// it must begin with the DLC prefix, and whatever follows the prefix is
    /// the chunk identifier.
    ///
    /// Returns `None` when there is no root marker, when the root marker is
    /// the last segment, when the sub-root does not start with the prefix,
    /// or when nothing follows the prefix.
    pub fn extract_chunk_id(&self, reference: &str) -> Option<String> {
        let segments: Vec<&str> = reference.split('/').filter(|s| !s.is_empty()).collect();

        let root_index = segments
            .iter()
            .position(|segment| *segment == self.root_segment)?;

        let sub_root = segments.get(root_index + 1)?;
        let chunk_id = sub_root.strip_prefix(self.dlc_prefix.as_str())?;

        if chunk_id.is_empty() {
            return None;
        }

        Some(chunk_id.to_string())
    }
}

/// Extract the chunk identifier from a reference using the default rules.
///
/// # Examples
///
/// ```
/// use pakfetch::package::extract_chunk_id;
///
/// assert_eq!(extract_chunk_id("/Game/DLC_Foo/Asset"), Some("Foo".to_string()));
/// assert_eq!(extract_chunk_id("/Game/Bar/Asset"), None);
/// assert_eq!(extract_chunk_id("/Game"), None);
/// ```
pub fn extract_chunk_id(reference: &str) -> Option<String> {
    ReferenceRules::default().extract_chunk_id(reference)
}

/// A chunk identifier split into package name and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChunkId {
    /// Logical package name (never empty).
    pub name: String,

    /// Version encoded in the identifier, or the default version.
    pub version: Version,
}

impl fmt::Display for ParsedChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// Parse a chunk identifier into `(package name, version)`.
///
/// The identifier is split on the first `_`. A non-empty version part is
/// parsed tolerantly (see [`parse_version`]), so `Foo_garbage` yields
/// version `0.0.0`. When there is no version part, `default_version` is
/// used; without a default the parse fails. Identifiers with an empty
/// package name are rejected.
///
/// # Examples
///
/// ```
/// use semver::Version;
/// use pakfetch::package::{parse_chunk_id, VERSION_ONE};
///
/// let parsed = parse_chunk_id("Foo_2.1.0", Some(&VERSION_ONE)).unwrap();
/// assert_eq!(parsed.name, "Foo");
/// assert_eq!(parsed.version, Version::new(2, 1, 0));
///
/// let parsed = parse_chunk_id("Foo", Some(&VERSION_ONE)).unwrap();
/// assert_eq!(parsed.version, Version::new(1, 0, 0));
///
/// assert!(parse_chunk_id("Foo", None).is_none());
/// ```
pub fn parse_chunk_id(chunk_id: &str, default_version: Option<&Version>) -> Option<ParsedChunkId> {
    let (name, version_part) = chunk_id
        .split_once(CHUNK_ID_DELIMITER)
        .unwrap_or((chunk_id, ""));

    if name.is_empty() {
        return None;
    }

    let version = if version_part.is_empty() {
        default_version.cloned()
    } else {
        parse_version(version_part)
    }?;

    Some(ParsedChunkId {
        name: name.to_string(),
        version,
    })
}

/// Parse a chunk identifier with the standard `1.0.0` default version.
pub fn parse_chunk_id_or_default(chunk_id: &str) -> Option<ParsedChunkId> {
    parse_chunk_id(chunk_id, Some(&VERSION_ONE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_dlc_segment() {
        assert_eq!(
            extract_chunk_id("/Game/DLC_Foo/Asset"),
            Some("Foo".to_string())
        );
    }

    #[test]
    fn test_extract_non_dlc_segment() {
        assert_eq!(extract_chunk_id("/Game/Bar/Asset"), None);
    }

    #[test]
    fn test_extract_root_is_last_segment() {
        assert_eq!(extract_chunk_id("/Game"), None);
        assert_eq!(extract_chunk_id("/Game/"), None);
    }

    #[test]
    fn test_extract_without_root() {
        assert_eq!(extract_chunk_id("/Engine/DLC_Foo/Asset"), None);
        assert_eq!(extract_chunk_id(""), None);
    }

    #[test]
    fn test_extract_rejects_leading_text() {
        assert_eq!(extract_chunk_id("/Game/XDLC_Foo/Asset"), None);
    }

    #[test]
    fn test_extract_prefix_is_case_sensitive() {
        assert_eq!(extract_chunk_id("/Game/dlc_Foo/Asset"), None);
    }

    #[test]
    fn test_extract_empty_remainder() {
        assert_eq!(extract_chunk_id("/Game/DLC_/Asset"), None);
    }

    #[test]
    fn test_extract_uses_first_root() {
        assert_eq!(
            extract_chunk_id("/Game/Maps/Game/DLC_Foo/Asset"),
            None,
            "only the segment after the first root is inspected"
        );
        assert_eq!(
            extract_chunk_id("/Game/DLC_Foo/Game/DLC_Bar"),
            Some("Foo".to_string())
        );
    }

    #[test]
    fn test_extract_keeps_versioned_identifier() {
        assert_eq!(
            extract_chunk_id("/Game/DLC_Expansion1_2.0.0/Hero.Hero"),
            Some("Expansion1_2.0.0".to_string())
        );
    }

    #[test]
    fn test_extract_custom_rules() {
        let rules = ReferenceRules::new("Content", "Pack-");
        assert_eq!(
            rules.extract_chunk_id("Content/Pack-Maps/Level"),
            Some("Maps".to_string())
        );
        assert_eq!(rules.extract_chunk_id("/Game/DLC_Foo/Asset"), None);
    }

    #[test]
    fn test_parse_with_version() {
        let parsed = parse_chunk_id_or_default("Foo_2.1.0").unwrap();
        assert_eq!(parsed.name, "Foo");
        assert_eq!(parsed.version, Version::new(2, 1, 0));
    }

    #[test]
    fn test_parse_without_version_uses_default() {
        let parsed = parse_chunk_id_or_default("Foo").unwrap();
        assert_eq!(parsed.name, "Foo");
        assert_eq!(parsed.version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_parse_without_version_or_default_fails() {
        assert!(parse_chunk_id("Foo", None).is_none());
        assert!(parse_chunk_id("Foo_", None).is_none());
    }

    #[test]
    fn test_parse_garbage_version_is_zero() {
        // Tolerant parse: unparsable components become zero
        let parsed = parse_chunk_id_or_default("Foo_garbage").unwrap();
        assert_eq!(parsed.name, "Foo");
        assert_eq!(parsed.version, Version::new(0, 0, 0));
    }

    #[test]
    fn test_parse_splits_on_first_delimiter() {
        let parsed = parse_chunk_id_or_default("Foo_1.2_3").unwrap();
        assert_eq!(parsed.name, "Foo");
        assert_eq!(parsed.version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_parse_empty_name_fails() {
        assert!(parse_chunk_id_or_default("_1.0.0").is_none());
        assert!(parse_chunk_id_or_default("").is_none());
    }

    #[test]
    fn test_parsed_display() {
        let parsed = parse_chunk_id_or_default("Foo_1.2.3").unwrap();
        assert_eq!(parsed.to_string(), "Foo v1.2.3");
    }
}
