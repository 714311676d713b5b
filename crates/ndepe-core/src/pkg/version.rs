//! Loose version comparison for manifest versions.
//!
//! Manifest versions are not always strict semver (`v1.2.3`, `=1.0.0`,
//! `1.2.3 ` with stray whitespace). Loose parsing strips those prefixes and
//! falls back to a plain string order for anything still unparseable.

use semver::Version;
use std::cmp::Ordering;

/// Parse a version leniently.
#[must_use]
pub fn parse_loose(version: &str) -> Option<Version> {
    let trimmed = version
        .trim()
        .trim_start_matches('=')
        .trim_start_matches(['v', 'V'])
        .trim();
    Version::parse(trimmed).ok()
}

/// Compare two versions loosely.
///
/// Parsed versions order by semver precedence (build metadata ignored).
/// An unparseable version sorts below any parseable one; two unparseable
/// versions compare as strings. The result is a total order.
#[must_use]
pub fn compare_loose(a: &str, b: &str) -> Ordering {
    match (parse_loose(a), parse_loose(b)) {
        (Some(va), Some(vb)) => va.cmp_precedence(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loose_prefixes() {
        assert_eq!(parse_loose("v1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_loose("=1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_loose(" 1.2.3 "), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_loose("latest"), None);
    }

    #[test]
    fn test_compare_loose() {
        assert_eq!(compare_loose("2.0.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_loose("1.0.0-beta.1", "1.0.0"), Ordering::Less);
        assert_eq!(compare_loose("v1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_loose("1.0.0+build", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_loose("garbage", "0.0.1"), Ordering::Less);
        assert_eq!(compare_loose("a", "b"), Ordering::Less);
    }
}
