//! Package version parsing.
//!
//! Versions are plain `major.minor.patch` triples carried by [`semver::Version`].
//! Chunk identifiers in a manifest are free-form strings, so parsing here is
//! deliberately tolerant: any missing or unparsable component becomes `0`
//! instead of rejecting the whole identifier.

use semver::Version;

/// The version assumed for chunk identifiers that do not encode one.
pub const VERSION_ONE: Version = Version::new(1, 0, 0);

/// Parse a dot-delimited version string, tolerating malformed components.
///
/// Returns `None` only for an empty string. Every other input yields a
/// version, with `0` substituted for each component that is missing or is
/// not a number. Pre-release and build metadata are never produced, so the
/// result orders lexicographically over `(major, minor, patch)`.
///
/// Components are unsigned. A negative component such as the `-1` in
/// `"-1.2.3"` is not a number here and becomes `0`, so it does not order
/// below `0.x.y` the way a signed component would.
///
/// # Examples
///
/// ```
/// use semver::Version;
/// use pakfetch::package::parse_version;
///
/// assert_eq!(parse_version("2.1.0"), Some(Version::new(2, 1, 0)));
/// assert_eq!(parse_version("3"), Some(Version::new(3, 0, 0)));
/// assert_eq!(parse_version("1.x.7"), Some(Version::new(1, 0, 7)));
/// assert_eq!(parse_version(""), None);
/// ```
pub fn parse_version(s: &str) -> Option<Version> {
    if s.is_empty() {
        return None;
    }

    let mut components = s.split('.').filter(|c| !c.is_empty());
    let mut next = || {
        components
            .next()
            .and_then(|c| c.trim().parse::<u64>().ok())
            .unwrap_or(0)
    };

    let major = next();
    let minor = next();
    let patch = next();

    Some(Version::new(major, minor, patch))
}
