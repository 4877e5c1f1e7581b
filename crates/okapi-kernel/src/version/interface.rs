use super::{MAX_NUMERIC_DIGITS, VersionError, is_numeric};
use std::fmt;

/// Version of an interface: `major.minor` or `major.minor.patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: Option<u64>,
}

impl InterfaceVersion {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidInterfaceVersion(input.to_string());
        let parts: Vec<&str> = input.split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(invalid());
        }
        let mut numbers = Vec::with_capacity(3);
        for part in parts {
            if !is_numeric(part) || part.len() > MAX_NUMERIC_DIGITS {
                return Err(invalid());
            }
            numbers.push(part.parse::<u64>().map_err(|_| invalid())?);
        }
        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers.get(2).copied(),
        })
    }

    /// Parse a space-separated list such as `"1.0 2.0"`.
    pub fn parse_list(input: &str) -> Result<Vec<Self>, VersionError> {
        let list = input
            .split_whitespace()
            .map(Self::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if list.is_empty() {
            return Err(VersionError::InvalidInterfaceVersion(input.to_string()));
        }
        Ok(list)
    }

    /// Whether this (provided) version satisfies `required`: same major and
    /// a higher minor, or the same minor and a patch at least as high.
    pub fn satisfies(&self, required: &InterfaceVersion) -> bool {
        self.major == required.major
            && (self.minor > required.minor
                || (self.minor == required.minor
                    && self.patch.unwrap_or(0) >= required.patch.unwrap_or(0)))
    }

    /// Whether any provided version in `provided` satisfies any version in
    /// the `required` list.  Both sides use the space-separated list syntax.
    pub fn lists_compatible(provided: &str, required: &str) -> Result<bool, VersionError> {
        let provided = Self::parse_list(provided)?;
        let required = Self::parse_list(required)?;
        Ok(provided
            .iter()
            .any(|p| required.iter().any(|r| p.satisfies(r))))
    }
}

impl fmt::Display for InterfaceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.patch {
            Some(patch) => write!(f, "{}.{}.{}", self.major, self.minor, patch),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}
