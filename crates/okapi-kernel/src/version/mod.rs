//! Version identities.
//!
//! - [`SemVer`]: totally ordered version strings with release, pre-release
//!   and build-metadata sections.
//! - [`ModuleId`]: `product-version` compound identifiers.
//! - [`InterfaceVersion`]: `major.minor[.patch]` interface versions and the
//!   compatibility rule used by dependency resolution.
//!
//! Everything here is pure and allocation-light; parse failures are reported
//! as [`VersionError`] and never silently truncated.

mod interface;
mod module_id;
mod semver;

pub use interface::InterfaceVersion;
pub use module_id::ModuleId;
pub use semver::SemVer;

use thiserror::Error;

/// Maximum number of decimal digits in a numeric version component, so every
/// numeric component fits in 63 bits.
pub const MAX_NUMERIC_DIGITS: usize = 18;

/// Parse error for version and identity strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum VersionError {
    #[error("missing major version component in '{0}'")]
    MissingMajor(String),

    #[error("empty version component in '{0}'")]
    EmptyComponent(String),

    #[error("non-terminated pre-release section in '{0}'")]
    UnterminatedPreRelease(String),

    #[error("numeric component '{component}' in '{input}' exceeds {MAX_NUMERIC_DIGITS} digits")]
    NumberTooLong { input: String, component: String },

    #[error("empty build metadata in '{0}'")]
    EmptyMetadata(String),

    #[error("unexpected character '{ch}' in '{input}'")]
    InvalidCharacter { input: String, ch: char },

    #[error("module id '{0}' has an empty product name")]
    EmptyProduct(String),

    #[error("invalid interface version '{0}': expected major.minor or major.minor.patch")]
    InvalidInterfaceVersion(String),
}

pub(crate) fn is_numeric(component: &str) -> bool {
    !component.is_empty() && component.bytes().all(|b| b.is_ascii_digit())
}
