//! Error types for charmctl-reconcile.

use thiserror::Error;

use charmctl_core::{ApiError, ApplicationName, CoreError, ErrorKind};

/// All errors that can arise from reconcile operations.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A control-plane call failed; `kind` is the classified failure.
    #[error("{operation} failed ({kind}): {source}")]
    Remote {
        operation: &'static str,
        kind: ErrorKind,
        #[source]
        source: ApiError,
    },

    /// Caller input did not parse.
    #[error("invalid input: {0}")]
    Input(#[from] CoreError),

    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationName),

    #[error("storage for application {0} is not available yet")]
    StorageNotFound(ApplicationName),

    #[error("{0}")]
    NotValid(String),

    #[error("{0}")]
    NotSupported(String),

    /// `DeployFromRepository` reported one or more errors.
    #[error("deploying {app} failed: {}", join_messages(.errors))]
    Deploy {
        app: ApplicationName,
        errors: Vec<ApiError>,
    },

    /// The application was deployed but exposing it failed. Not rolled back.
    #[error("application {app} was deployed but exposing it failed: {source}")]
    Expose {
        app: ApplicationName,
        #[source]
        source: Box<ReconcileError>,
    },

    #[error("application {app} did not converge: {reason}")]
    NotConverged { app: ApplicationName, reason: String },

    #[error("gave up after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<ReconcileError>,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error("config serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

impl ReconcileError {
    /// Wrap a control-plane error, classifying it once.
    pub fn remote(operation: &'static str, source: ApiError) -> Self {
        let kind = source.kind();
        ReconcileError::Remote {
            operation,
            kind,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Remote { kind, .. } => *kind,
            ReconcileError::Input(err) => err.kind(),
            ReconcileError::ApplicationNotFound(_) => ErrorKind::NotFound,
            ReconcileError::StorageNotFound(_) => ErrorKind::StorageNotFound,
            ReconcileError::NotValid(_) => ErrorKind::NotValid,
            ReconcileError::NotSupported(_) => ErrorKind::NotSupported,
            ReconcileError::Deploy { errors, .. } => errors
                .first()
                .map(ApiError::kind)
                .unwrap_or(ErrorKind::Other),
            ReconcileError::Expose { source, .. } => source.kind(),
            ReconcileError::RetryExhausted { source, .. } => source.kind(),
            ReconcileError::NotConverged { .. }
            | ReconcileError::Cancelled { .. }
            | ReconcileError::Yaml(_)
            | ReconcileError::Other(_) => ErrorKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

fn join_messages(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
