use super::{SemVer, VersionError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Module identity: `product-version`, e.g. `mod-users-17.1.0`.
///
/// The string is split at the first `-` that is immediately followed by a
/// digit.  Without such a split point the whole string is the product and
/// the id is a product-only *wildcard*, which is only meaningful in queries
/// such as "enable the latest `mod-users`".
#[derive(Debug, Clone)]
pub struct ModuleId {
    id: String,
    product: String,
    semver: Option<SemVer>,
}

impl ModuleId {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        if let Some(ch) = input.chars().find(|c| c.is_whitespace()) {
            return Err(VersionError::InvalidCharacter {
                input: input.to_string(),
                ch,
            });
        }
        let bytes = input.as_bytes();
        let split = bytes
            .windows(2)
            .position(|w| w[0] == b'-' && w[1].is_ascii_digit());

        let (product, semver) = match split {
            Some(pos) => (&input[..pos], Some(SemVer::parse(&input[pos + 1..])?)),
            None => (input, None),
        };
        if product.is_empty() {
            return Err(VersionError::EmptyProduct(input.to_string()));
        }
        Ok(Self {
            id: input.to_string(),
            product: product.to_string(),
            semver,
        })
    }

    /// Full id as given.
    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn semver(&self) -> Option<&SemVer> {
        self.semver.as_ref()
    }

    pub fn has_semver(&self) -> bool {
        self.semver.is_some()
    }

    pub fn has_pre_release(&self) -> bool {
        self.semver.as_ref().is_some_and(SemVer::has_pre_release)
    }

    pub fn has_npm_snapshot(&self) -> bool {
        self.semver.as_ref().is_some_and(SemVer::has_npm_snapshot)
    }

    /// The product-only wildcard for this id's product.
    pub fn without_version(&self) -> ModuleId {
        Self {
            id: self.product.clone(),
            product: self.product.clone(),
            semver: None,
        }
    }

    /// Magnitude-coded comparison: `±5` when products differ (the product
    /// always dominates), `±4` when only one side has a version, otherwise
    /// the [`SemVer::compare`] result.
    pub fn compare(&self, other: &ModuleId) -> i32 {
        match self.product.cmp(&other.product) {
            Ordering::Less => -5,
            Ordering::Greater => 5,
            Ordering::Equal => match (&self.semver, &other.semver) {
                (Some(a), Some(b)) => a.compare(b),
                (Some(_), None) => 4,
                (None, Some(_)) => -4,
                (None, None) => 0,
            },
        }
    }

    /// Highest-versioned candidate sharing this id's product.
    ///
    /// Ties keep the first candidate found.  When nothing matches, a clone
    /// of `self` is returned; callers detect that by comparing with `self`.
    pub fn get_latest<'a>(&self, candidates: impl IntoIterator<Item = &'a ModuleId>) -> ModuleId {
        let mut best: Option<&ModuleId> = None;
        for candidate in candidates {
            if candidate.product != self.product || candidate.semver.is_none() {
                continue;
            }
            match best {
                Some(current) if candidate.compare(current) <= 0 => {}
                _ => best = Some(candidate),
            }
        }
        best.cloned().unwrap_or_else(|| self.clone())
    }

    /// `mod-a-1.2.3` has prefix `mod-a`, `mod-a-1` and `mod-a-1.2`.
    pub fn has_prefix(&self, other: &ModuleId) -> bool {
        if self.product != other.product {
            return false;
        }
        match (&self.semver, &other.semver) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(mine), Some(theirs)) => mine.has_prefix(theirs),
        }
    }
}

impl PartialEq for ModuleId {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == 0
    }
}

impl Eq for ModuleId {}

impl PartialOrd for ModuleId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other).cmp(&0)
    }
}

impl Hash for ModuleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.product.hash(state);
        self.semver.hash(state);
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl FromStr for ModuleId {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ModuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ModuleId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ModuleId {
        ModuleId::parse(s).unwrap()
    }

    #[test]
    fn splits_at_first_dash_digit() {
        let m = id("sample-module-1.0.0");
        assert_eq!(m.product(), "sample-module");
        assert_eq!(m.semver().unwrap().to_string(), "1.0.0");

        let m = id("sample-module2-1");
        assert_eq!(m.product(), "sample-module2");
        assert_eq!(m.semver().unwrap().to_string(), "1");

        let m = id("mod-users-1.0.0-SNAPSHOT.12");
        assert_eq!(m.product(), "mod-users");
        assert!(m.has_pre_release());
    }

    #[test]
    fn product_only_is_wildcard() {
        let m = id("mod-users");
        assert_eq!(m.product(), "mod-users");
        assert!(!m.has_semver());
        assert_eq!(m.to_string(), "mod-users");
        assert_eq!(id("mod-users-2.1.0").without_version(), m);
    }

    #[test]
    fn rejects_bad_ids() {
        assert!(matches!(ModuleId::parse(""), Err(VersionError::EmptyProduct(_))));
        assert!(matches!(ModuleId::parse("-1.0"), Err(VersionError::EmptyProduct(_))));
        assert!(ModuleId::parse("mod-1..0").is_err());
        assert!(ModuleId::parse("mod a-1.0").is_err());
    }

    #[test]
    fn product_dominates_ordering() {
        assert_eq!(id("a-9.0.0").compare(&id("b-1.0.0")), -5);
        assert_eq!(id("b-1.0.0").compare(&id("a-9.0.0")), 5);
        assert!(id("a") < id("b-0.1"));
        assert!(id("mod-a-2.0.0") > id("mod-a-1.9.9"));
    }

    #[test]
    fn versioned_beats_product_only() {
        assert_eq!(id("mod-a-1.0.0").compare(&id("mod-a")), 4);
        assert_eq!(id("mod-a").compare(&id("mod-a-1.0.0")), -4);
        assert_eq!(id("mod-a").compare(&id("mod-a")), 0);
    }

    #[test]
    fn get_latest_picks_highest_matching_product() {
        let candidates = vec![
            id("mod-a-1.0.0"),
            id("mod-b-9.0.0"),
            id("mod-a-2.0.0-alpha"),
            id("mod-a-1.5.0"),
        ];
        let latest = id("mod-a").get_latest(&candidates);
        assert_eq!(latest.as_str(), "mod-a-2.0.0-alpha");

        let unknown = id("mod-z");
        assert_eq!(unknown.get_latest(&candidates).as_str(), "mod-z");
    }

    #[test]
    fn get_latest_ties_keep_first() {
        let candidates = vec![id("mod-a-1.02"), id("mod-a-1.2")];
        assert_eq!(id("mod-a").get_latest(&candidates).as_str(), "mod-a-1.02");
    }

    #[test]
    fn has_prefix_requires_product_and_version() {
        assert!(id("mod-a-1.2.3").has_prefix(&id("mod-a")));
        assert!(id("mod-a-1.2.3").has_prefix(&id("mod-a-1.2")));
        assert!(!id("mod-a-1.2.3").has_prefix(&id("mod-a-1.3")));
        assert!(!id("mod-a").has_prefix(&id("mod-a")));
        assert!(!id("mod-b-1.2.3").has_prefix(&id("mod-a")));
    }
}
