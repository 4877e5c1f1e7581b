//! Gateway error taxonomy shared by the kernel and the runtime.
//!
//! Every failure the gateway reports is classified by an [`ErrorType`],
//! which fixes the HTTP status the caller sees.  [`GatewayError`] carries
//! the classification in its variant plus a human-readable message, so
//! results throughout the workspace are plain
//! `Result<T, GatewayError>` values.

use crate::version::VersionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// ErrorType
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of a gateway outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// No error.
    Ok,
    /// The caller's request is invalid (bad JSON, unsatisfiable dependency,
    /// duplicate provider, conflicting tokens).
    User,
    /// Unknown module, tenant, interface or path.
    NotFound,
    /// Missing tenant or otherwise refused access.
    Forbidden,
    /// Downstream module failure, redirect loop, deployment failure.
    Internal,
    /// Unclassified failure.
    Any,
}

impl ErrorType {
    /// HTTP status code reported for this classification.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorType::Ok => 200,
            ErrorType::User => 400,
            ErrorType::Forbidden => 403,
            ErrorType::NotFound => 404,
            ErrorType::Internal | ErrorType::Any => 500,
        }
    }

    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(self) -> &'static str {
        match self {
            ErrorType::Ok => "OK",
            ErrorType::User => "USER",
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::Forbidden => "FORBIDDEN",
            ErrorType::Internal => "INTERNAL",
            ErrorType::Any => "ANY",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayError
// ─────────────────────────────────────────────────────────────────────────────

/// Classified gateway failure.
///
/// The display form is the bare message, which is what ends up in HTTP
/// error bodies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    /// Invalid input from the caller (HTTP 400).
    #[error("{0}")]
    User(String),

    /// Something the caller named does not exist (HTTP 404).
    #[error("{0}")]
    NotFound(String),

    /// Access refused, e.g. no tenant could be determined (HTTP 403).
    #[error("{0}")]
    Forbidden(String),

    /// Collaborator or downstream module failure (HTTP 500).
    #[error("{0}")]
    Internal(String),

    /// Anything that does not fit the categories above (HTTP 500).
    #[error("{0}")]
    Any(String),
}

impl GatewayError {
    pub fn user(msg: impl Into<String>) -> Self {
        GatewayError::User(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        GatewayError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        GatewayError::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        GatewayError::Internal(msg.into())
    }

    /// The [`ErrorType`] this error is reported as.
    pub fn error_type(&self) -> ErrorType {
        match self {
            GatewayError::User(_) => ErrorType::User,
            GatewayError::NotFound(_) => ErrorType::NotFound,
            GatewayError::Forbidden(_) => ErrorType::Forbidden,
            GatewayError::Internal(_) => ErrorType::Internal,
            GatewayError::Any(_) => ErrorType::Any,
        }
    }

    /// The human-readable message without classification.
    pub fn message(&self) -> &str {
        match self {
            GatewayError::User(m)
            | GatewayError::NotFound(m)
            | GatewayError::Forbidden(m)
            | GatewayError::Internal(m)
            | GatewayError::Any(m) => m,
        }
    }

    /// Prefix the message with context, keeping the classification.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            GatewayError::User(m) => GatewayError::User(format!("{ctx}: {m}")),
            GatewayError::NotFound(m) => GatewayError::NotFound(format!("{ctx}: {m}")),
            GatewayError::Forbidden(m) => GatewayError::Forbidden(format!("{ctx}: {m}")),
            GatewayError::Internal(m) => GatewayError::Internal(format!("{ctx}: {m}")),
            GatewayError::Any(m) => GatewayError::Any(format!("{ctx}: {m}")),
        }
    }
}

impl From<VersionError> for GatewayError {
    fn from(err: VersionError) -> Self {
        GatewayError::User(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::User(format!("invalid JSON: {err}"))
    }
}

/// Convenience result alias.
pub type GatewayResult<T> = Result<T, GatewayError>;
