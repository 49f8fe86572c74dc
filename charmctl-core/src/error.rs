//! Error types for charmctl-core.
//!
//! Two concerns live here:
//! - [`CoreError`] for malformed caller input (bases, channels, charm URLs).
//! - [`ErrorKind`] plus [`classify`], the single mapping from a control-plane
//!   error onto the retry-relevant taxonomy.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Classification of a failure, shared by every reconcile operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    NotValid,
    NotSupported,
    NotImplemented,
    /// The application exists but its storage detail has not materialized.
    StorageNotFound,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::NotValid => "not valid",
            ErrorKind::NotSupported => "not supported",
            ErrorKind::NotImplemented => "not implemented",
            ErrorKind::StorageNotFound => "storage not found",
            ErrorKind::Other => "error",
        };
        f.write_str(s)
    }
}

/// Structured error codes as sent by the control plane, when it sends one.
pub const ERROR_CODES: &[(&str, ErrorKind)] = &[
    ("not found", ErrorKind::NotFound),
    ("already exists", ErrorKind::AlreadyExists),
    ("not valid", ErrorKind::NotValid),
    ("not supported", ErrorKind::NotSupported),
    ("not implemented", ErrorKind::NotImplemented),
];

/// Substring table applied to error text, first match wins.
///
/// The storage entries must stay ahead of `"not found"`: the control plane
/// reports missing filesystems as "filesystem for storage instance ... not found".
pub const MESSAGE_PATTERNS: &[(&str, ErrorKind)] = &[
    ("filesystem for storage instance", ErrorKind::StorageNotFound),
    ("volume for storage instance", ErrorKind::StorageNotFound),
    ("already exists", ErrorKind::AlreadyExists),
    ("not found", ErrorKind::NotFound),
    ("not supported", ErrorKind::NotSupported),
    ("not implemented", ErrorKind::NotImplemented),
    ("not valid", ErrorKind::NotValid),
];

/// Classify raw error text against [`MESSAGE_PATTERNS`].
pub fn classify(message: &str) -> ErrorKind {
    MESSAGE_PATTERNS
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::Other)
}

/// Classify a control-plane error: structured code first, then message text.
pub fn classify_api_error(err: &ApiError) -> ErrorKind {
    if let Some(code) = err.code.as_deref() {
        if let Some((_, kind)) = ERROR_CODES.iter().find(|(c, _)| *c == code) {
            return *kind;
        }
    }
    classify(&err.message)
}

// ---------------------------------------------------------------------------
// Control-plane error
// ---------------------------------------------------------------------------

/// An error reported by the remote control plane.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    /// Structured error code, absent on older protocol versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        classify_api_error(self)
    }
}

// ---------------------------------------------------------------------------
// Input errors
// ---------------------------------------------------------------------------

/// Errors raised while parsing caller input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid base {input:?}: {reason}")]
    InvalidBase { input: String, reason: String },

    #[error("invalid channel {input:?}: {reason}")]
    InvalidChannel { input: String, reason: String },

    #[error("invalid charm URL {input:?}: {reason}")]
    InvalidCharmUrl { input: String, reason: String },

    #[error("unknown resource type {0:?}; expected \"file\" or \"oci-image\"")]
    InvalidResourceType(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::NotValid
    }
}

// ---------------------------------------------------------------------------
// Settings errors
// ---------------------------------------------------------------------------

/// Errors from loading or saving [`crate::settings::Settings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment override held a value that does not parse.
    #[error("invalid value {value:?} for {var}")]
    InvalidOverride { var: &'static str, value: String },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_text_wins_over_not_found() {
        let msg = "filesystem for storage instance \"data/0\" not found";
        assert_eq!(classify(msg), ErrorKind::StorageNotFound);
        assert_eq!(
            classify("volume for storage instance \"pgdata/1\" not provisioned"),
            ErrorKind::StorageNotFound
        );
    }

    #[test]
    fn unmatched_text_is_other() {
        assert_eq!(classify("connection reset by peer"), ErrorKind::Other);
    }

    #[test]
    fn structured_code_takes_precedence() {
        let err = ApiError::with_code("already exists", "charm \"pg\" not found");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn unknown_code_falls_back_to_message() {
        let err = ApiError::with_code("quota limit exceeded", "application \"pg\" not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
