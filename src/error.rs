use thiserror::Error;

use crate::reconcile::ReconcileStep;

/// Result type alias for orchestration operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// How an exec-based file operation failed, derived from the remote
/// command's exit code and stderr, never from guessing at content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    NotFound,
    PermissionDenied,
    Unknown,
}

impl std::fmt::Display for FileErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileErrorKind::NotFound => write!(f, "not found"),
            FileErrorKind::PermissionDenied => write!(f, "permission denied"),
            FileErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Errors surfaced by the orchestration core.
///
/// `NotFound` is always kept distinct from `Transport` so callers can render
/// "not deployed yet" instead of "something broke". `Transport` is safe to
/// retry with backoff; `Configuration` is not retryable without operator
/// intervention.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("no usable cluster credentials: {message}")]
    Configuration { message: String },

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[error("cluster API error: {message}")]
    Transport { message: String },

    #[error("reconcile step {step} failed: {message}")]
    ReconcileStep {
        step: ReconcileStep,
        message: String,
    },

    #[error("file operation on {path} failed ({kind}): {message}")]
    File {
        kind: FileErrorKind,
        path: String,
        message: String,
    },

    #[error("no pod found for service {service} in {namespace}")]
    NoPodFound { service: String, namespace: String },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl OrchestratorError {
    pub fn transport(message: impl Into<String>) -> Self {
        OrchestratorError::Transport {
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, name: &str, namespace: &str) -> Self {
        OrchestratorError::NotFound {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        OrchestratorError::InvalidInput {
            message: message.into(),
        }
    }

    /// True when the underlying cluster response was a 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrchestratorError::NotFound { .. })
    }
}

impl From<kube::Error> for OrchestratorError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref resp) if resp.code == 404 => OrchestratorError::NotFound {
                kind: "object",
                name: resp.message.clone(),
                namespace: String::new(),
            },
            other => OrchestratorError::Transport {
                message: other.to_string(),
            },
        }
    }
}
