use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

fn semantic_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").expect("static regex"))
}

/// Semantic version representation.
///
/// Only ever built from a bare `major.minor.patch` tag; field order gives the
/// derived tuple ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// Which component the planner bumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    Major,
    Minor,
}

impl SemanticVersion {
    /// Create a new version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemanticVersion {
            major,
            minor,
            patch,
        }
    }

    /// Parse a tag name. No `v` prefix, no pre-release or build suffix.
    ///
    /// ```
    /// # use release_tracker::domain::SemanticVersion;
    /// assert_eq!(SemanticVersion::parse("1.2.3"), Some(SemanticVersion::new(1, 2, 3)));
    /// assert_eq!(SemanticVersion::parse("v1.2.3"), None);
    /// ```
    pub fn parse(tag: &str) -> Option<Self> {
        let caps = semantic_tag_regex().captures(tag)?;
        let major = caps[1].parse().ok()?;
        let minor = caps[2].parse().ok()?;
        let patch = caps[3].parse().ok()?;
        Some(SemanticVersion::new(major, minor, patch))
    }

    /// Bump version according to bump type.
    ///
    /// Returns `None` when the bumped component would overflow.
    pub fn bump(&self, bump_type: VersionBump) -> Option<Self> {
        match bump_type {
            VersionBump::Major => Some(SemanticVersion::new(self.major.checked_add(1)?, 0, 0)),
            VersionBump::Minor => Some(SemanticVersion::new(
                self.major,
                self.minor.checked_add(1)?,
                0,
            )),
        }
    }

    /// First version of a new major line: highest existing major + 1.
    ///
    /// With no semantic tags at all the highest major is taken as -1, so the
    /// first release is `0.0.0`. `None` if the highest major is `u64::MAX`.
    pub fn next_major(tags: &BTreeSet<SemanticVersion>) -> Option<Self> {
        let major = match tags.iter().map(|v| v.major).max() {
            Some(m) => m.checked_add(1)?,
            None => 0,
        };
        Some(SemanticVersion::new(major, 0, 0))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Keep only the tags that are bare semantic versions.
pub fn semantic_versions<'a, I>(tags: I) -> BTreeSet<SemanticVersion>
where
    I: IntoIterator<Item = &'a str>,
{
    tags.into_iter().filter_map(SemanticVersion::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strict() {
        assert_eq!(
            SemanticVersion::parse("10.20.30"),
            Some(SemanticVersion::new(10, 20, 30))
        );
        for bad in ["v1.2.3", "V1.2.3", "1.2", "1.2.3.4", "1.2.3-rc1", "1.2.3+b", " 1.2.3", ""] {
            assert_eq!(SemanticVersion::parse(bad), None, "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_round_trip_through_tag_string() {
        for v in [
            SemanticVersion::new(0, 0, 0),
            SemanticVersion::new(3, 14, 159),
        ] {
            assert_eq!(SemanticVersion::parse(&v.to_string()), Some(v));
        }
    }

    #[test]
    fn test_tuple_ordering() {
        assert!(SemanticVersion::new(2, 0, 0) > SemanticVersion::new(1, 99, 99));
        assert!(SemanticVersion::new(1, 10, 0) > SemanticVersion::new(1, 9, 9));
        assert!(SemanticVersion::new(1, 1, 2) > SemanticVersion::new(1, 1, 1));
    }

    #[test]
    fn test_bump() {
        let v = SemanticVersion::new(2, 3, 4);
        assert_eq!(v.bump(VersionBump::Major), Some(SemanticVersion::new(3, 0, 0)));
        assert_eq!(v.bump(VersionBump::Minor), Some(SemanticVersion::new(2, 4, 0)));
    }

    #[test]
    fn test_bump_at_component_limit() {
        let max = SemanticVersion::parse("18446744073709551615.18446744073709551615.0").unwrap();
        assert_eq!(max.bump(VersionBump::Major), None);
        assert_eq!(max.bump(VersionBump::Minor), None);
        let tags = BTreeSet::from([max]);
        assert_eq!(SemanticVersion::next_major(&tags), None);
    }

    #[test]
    fn test_next_major() {
        let tags = semantic_versions(["1.0.0", "1.1.0", "2.0.0", "v9.0.0", "release-7"]);
        assert_eq!(tags.len(), 3);
        assert_eq!(
            SemanticVersion::next_major(&tags),
            Some(SemanticVersion::new(3, 0, 0))
        );
        assert_eq!(
            SemanticVersion::next_major(&BTreeSet::new()),
            Some(SemanticVersion::new(0, 0, 0))
        );
    }

    #[test]
    fn test_next_major_exceeds_every_tag() {
        let tags = semantic_versions(["0.9.9", "4.0.1", "4.12.0", "3.99.99"]);
        let next = SemanticVersion::next_major(&tags).unwrap();
        assert!(tags.iter().all(|t| next > *t));
    }
}
