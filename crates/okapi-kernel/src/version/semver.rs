use super::{MAX_NUMERIC_DIGITS, VersionError, is_numeric};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Semantic version: `release[-pre.release][+metadata]`.
///
/// Release and pre-release components are either all digits (compared
/// numerically) or free text (compared lexicographically); a numeric
/// component sorts below a textual one.  A version without pre-release sorts
/// above the same release with one.  Metadata only breaks ties, and an
/// absent metadata sorts below a present one.
#[derive(Debug, Clone)]
pub struct SemVer {
    release: Vec<String>,
    pre_release: Vec<String>,
    metadata: Option<String>,
}

impl SemVer {
    /// Parse a version string.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        if let Some(ch) = input.chars().find(|c| c.is_whitespace()) {
            return Err(VersionError::InvalidCharacter {
                input: input.to_string(),
                ch,
            });
        }

        let (head, metadata) = match input.split_once('+') {
            Some((_, "")) => return Err(VersionError::EmptyMetadata(input.to_string())),
            Some((head, meta)) => {
                if meta.contains('+') {
                    return Err(VersionError::InvalidCharacter {
                        input: input.to_string(),
                        ch: '+',
                    });
                }
                (head, Some(meta.to_string()))
            }
            None => (input, None),
        };

        let (release_part, pre_part) = match head.split_once('-') {
            Some((release, pre)) => (release, Some(pre)),
            None => (head, None),
        };

        let mut release = Vec::new();
        for (pos, component) in release_part.split('.').enumerate() {
            if component.is_empty() {
                return Err(if pos == 0 {
                    VersionError::MissingMajor(input.to_string())
                } else {
                    VersionError::EmptyComponent(input.to_string())
                });
            }
            check_length(input, component)?;
            release.push(component.to_string());
        }

        let mut pre_release = Vec::new();
        if let Some(pre) = pre_part {
            for component in pre.split('.') {
                if component.is_empty() {
                    return Err(VersionError::UnterminatedPreRelease(input.to_string()));
                }
                check_length(input, component)?;
                pre_release.push(component.to_string());
            }
        }

        Ok(Self {
            release,
            pre_release,
            metadata,
        })
    }

    /// Release components, major first.
    pub fn release(&self) -> &[String] {
        &self.release
    }

    /// Pre-release components (empty when absent).
    pub fn pre_release(&self) -> &[String] {
        &self.pre_release
    }

    /// Build metadata, if any.
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    pub fn major(&self) -> &str {
        &self.release[0]
    }

    pub fn has_pre_release(&self) -> bool {
        !self.pre_release.is_empty()
    }

    /// Heuristic for snapshot-style builds such as `1.2.100042`: exactly
    /// three release components and a third component of five or more
    /// characters.
    pub fn has_npm_snapshot(&self) -> bool {
        self.release.len() == 3 && self.release[2].len() >= 5
    }

    /// Magnitude-coded comparison.
    ///
    /// `±4` for a difference in the major component, `±3` for the second,
    /// `±2` for later release components (or an extra trailing component),
    /// `±1` for pre-release or metadata differences, `0` when equal.  Only
    /// the sign is meaningful to most callers.
    pub fn compare(&self, other: &SemVer) -> i32 {
        let mut level = 4;
        for (a, b) in self.release.iter().zip(&other.release) {
            match compare_component(a, b) {
                Ordering::Less => return -level,
                Ordering::Greater => return level,
                Ordering::Equal => {
                    if level > 2 {
                        level -= 1;
                    }
                }
            }
        }
        match self.release.len().cmp(&other.release.len()) {
            Ordering::Less => return -level,
            Ordering::Greater => return level,
            Ordering::Equal => {}
        }

        match (self.pre_release.is_empty(), other.pre_release.is_empty()) {
            (true, false) => return 1,
            (false, true) => return -1,
            _ => {}
        }
        for (a, b) in self.pre_release.iter().zip(&other.pre_release) {
            match compare_component(a, b) {
                Ordering::Less => return -1,
                Ordering::Greater => return 1,
                Ordering::Equal => {}
            }
        }
        match self.pre_release.len().cmp(&other.pre_release.len()) {
            Ordering::Less => return -1,
            Ordering::Greater => return 1,
            Ordering::Equal => {}
        }

        match (&self.metadata, &other.metadata) {
            (None, None) => 0,
            (None, Some(_)) => -1,
            (Some(_), None) => 1,
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            },
        }
    }

    /// Prefix containment: `1.2.3` has prefix `1.2`, but not `1.3`.
    ///
    /// When `other` carries a pre-release it must also prefix this value's
    /// pre-release, and metadata present in `other` must match exactly.
    pub fn has_prefix(&self, other: &SemVer) -> bool {
        if !components_prefix(&self.release, &other.release) {
            return false;
        }
        if other.pre_release.is_empty() {
            return true;
        }
        if !components_prefix(&self.pre_release, &other.pre_release) {
            return false;
        }
        match &other.metadata {
            Some(meta) => self.metadata.as_ref() == Some(meta),
            None => true,
        }
    }
}

fn check_length(input: &str, component: &str) -> Result<(), VersionError> {
    if is_numeric(component) && component.len() > MAX_NUMERIC_DIGITS {
        return Err(VersionError::NumberTooLong {
            input: input.to_string(),
            component: component.to_string(),
        });
    }
    Ok(())
}

/// Numeric components compare by value (leading zeros ignored) and sort
/// below textual ones.
fn compare_component(a: &str, b: &str) -> Ordering {
    match (is_numeric(a), is_numeric(b)) {
        (true, true) => {
            let a = a.trim_start_matches('0');
            let b = b.trim_start_matches('0');
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

fn components_prefix(full: &[String], prefix: &[String]) -> bool {
    prefix.len() <= full.len()
        && full
            .iter()
            .zip(prefix)
            .all(|(a, b)| compare_component(a, b) == Ordering::Equal)
}

impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == 0
    }
}

impl Eq for SemVer {}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other).cmp(&0)
    }
}

impl Hash for SemVer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with `compare`, so numeric components hash by value.
        fn hash_component<H: Hasher>(c: &str, state: &mut H) {
            if is_numeric(c) {
                0u8.hash(state);
                c.trim_start_matches('0').hash(state);
            } else {
                1u8.hash(state);
                c.hash(state);
            }
        }
        self.release.len().hash(state);
        for c in &self.release {
            hash_component(c, state);
        }
        self.pre_release.len().hash(state);
        for c in &self.pre_release {
            hash_component(c, state);
        }
        self.metadata.hash(state);
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.release.join("."))?;
        if !self.pre_release.is_empty() {
            write!(f, "-{}", self.pre_release.join("."))?;
        }
        if let Some(meta) = &self.metadata {
            write!(f, "+{meta}")?;
        }
        Ok(())
    }
}

impl FromStr for SemVer {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SemVer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SemVer::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemVer {
        SemVer::parse(s).unwrap()
    }

    #[test]
    fn parses_all_sections() {
        let ver = v("1.2.3-alpha.1+build.7");
        assert_eq!(ver.release(), ["1", "2", "3"]);
        assert_eq!(ver.pre_release(), ["alpha", "1"]);
        assert_eq!(ver.metadata(), Some("build.7"));
        assert_eq!(ver.to_string(), "1.2.3-alpha.1+build.7");
    }

    #[test]
    fn release_ordering_is_total() {
        assert!(v("1.2.3") < v("1.2.4"));
        assert!(v("1.2.4") < v("1.3.0"));
        assert!(v("1.3.0") < v("2.0.0"));
        assert!(v("1.2.3") < v("2.0.0"));
        assert!(v("10.0.0") > v("9.9.9"));
    }

    #[test]
    fn magnitudes_shrink_with_position() {
        assert_eq!(v("1.0.0").compare(&v("2.0.0")), -4);
        assert_eq!(v("1.1.0").compare(&v("1.0.0")), 3);
        assert_eq!(v("1.0.1").compare(&v("1.0.0")), 2);
        assert_eq!(v("1.0.0.1").compare(&v("1.0.0.2")), -2);
        assert_eq!(v("1.0.0-alpha").compare(&v("1.0.0")), -1);
        assert_eq!(v("1.0.0+a").compare(&v("1.0.0")), 1);
        assert_eq!(v("1.0.0").compare(&v("1.0.0")), 0);
    }

    #[test]
    fn missing_pre_release_sorts_higher() {
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.0.0-alpha") < v("1.0.0-alpha.1"));
        assert!(v("1.0.0-SNAPSHOT.2") < v("1.0.0-SNAPSHOT.10"));
    }

    #[test]
    fn numeric_sorts_below_text() {
        assert!(v("1.0.5") < v("1.0.x"));
        assert!(v("1.0.0-1") < v("1.0.0-rc"));
    }

    #[test]
    fn metadata_breaks_ties_only() {
        assert!(v("1.0.0") < v("1.0.0+001"));
        assert!(v("1.0.0+001") < v("1.0.0+002"));
        assert!(v("1.0.0+zzz") < v("1.0.1"));
    }

    #[test]
    fn ordering_is_antisymmetric_and_transitive() {
        let samples = [
            "0.9", "1.0.0-alpha", "1.0.0-alpha.1", "1.0.0-beta", "1.0.0", "1.0.0+b1",
            "1.0.1", "1.1", "1.10.0", "2.0.0-rc.1", "2.0.0", "10.0.0",
        ];
        let parsed: Vec<SemVer> = samples.iter().map(|s| v(s)).collect();
        for a in &parsed {
            for b in &parsed {
                assert_eq!(a.compare(b).signum(), -b.compare(a).signum(), "{a} vs {b}");
                for c in &parsed {
                    if a < b && b < c {
                        assert!(a < c, "{a} < {b} < {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn leading_zeros_compare_equal() {
        assert_eq!(v("1.02.0"), v("1.2.0"));
    }

    #[test]
    fn prefix_containment() {
        assert!(v("1.2.3").has_prefix(&v("1.2")));
        assert!(v("1.2.3").has_prefix(&v("1.2.3")));
        assert!(!v("1.2").has_prefix(&v("1.2.3")));
        assert!(!v("1.3.0").has_prefix(&v("1.2")));
        assert!(v("1.2.3-alpha.1").has_prefix(&v("1.2.3")));
        assert!(v("1.2.3-alpha.1").has_prefix(&v("1.2.3-alpha")));
        assert!(!v("1.2.3-beta").has_prefix(&v("1.2.3-alpha")));
        assert!(!v("1.2.3-alpha+x").has_prefix(&v("1.2.3-alpha+y")));
    }

    #[test]
    fn npm_snapshot_heuristic() {
        assert!(v("1.2.100042").has_npm_snapshot());
        assert!(!v("1.2.1000").has_npm_snapshot());
        assert!(!v("1.2.3.100042").has_npm_snapshot());
    }

    #[test]
    fn rejects_malformed_versions() {
        assert!(matches!(SemVer::parse(""), Err(VersionError::MissingMajor(_))));
        assert!(matches!(SemVer::parse(".1"), Err(VersionError::MissingMajor(_))));
        assert!(matches!(SemVer::parse("1..2"), Err(VersionError::EmptyComponent(_))));
        assert!(matches!(
            SemVer::parse("1.0-"),
            Err(VersionError::UnterminatedPreRelease(_))
        ));
        assert!(matches!(
            SemVer::parse("1.0-alpha."),
            Err(VersionError::UnterminatedPreRelease(_))
        ));
        assert!(matches!(
            SemVer::parse("1.1234567890123456789"),
            Err(VersionError::NumberTooLong { .. })
        ));
        assert!(matches!(SemVer::parse("1.0+"), Err(VersionError::EmptyMetadata(_))));
        assert!(matches!(
            SemVer::parse("1.0+a+b"),
            Err(VersionError::InvalidCharacter { ch: '+', .. })
        ));
        assert!(matches!(
            SemVer::parse("1.0 2.0"),
            Err(VersionError::InvalidCharacter { ch: ' ', .. })
        ));
    }

    #[test]
    fn eighteen_digits_fit() {
        let ver = v("123456789012345678");
        assert_eq!(ver.major(), "123456789012345678");
    }

    #[test]
    fn serde_uses_string_form() {
        let ver: SemVer = serde_json::from_str("\"2.1.0-rc.1\"").unwrap();
        assert_eq!(serde_json::to_string(&ver).unwrap(), "\"2.1.0-rc.1\"");
        assert!(serde_json::from_str::<SemVer>("\"1..0\"").is_err());
    }
}
