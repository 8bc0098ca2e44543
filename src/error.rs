//! Error surface shared by the gateway and the subscription manager.

use std::fmt;

use serde::Serialize;

use crate::store::StoreError;

/// Category of a [`SyncError`], as seen by the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The store refused the read or write (security rules).
    PermissionDenied,
    /// The store cannot serve the request as issued, e.g. a missing index.
    PreconditionFailed,
    /// The addressed record does not exist.
    NotFound,
    /// Client-side validation failed; nothing was sent to the store.
    Validation,
    /// Anything else, including transient network failures.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error returned by mutations and delivered to `on_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct SyncError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether a caller-level retry could succeed. The crate never retries on its own.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Unknown
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            StoreError::FailedPrecondition(_) => ErrorKind::PreconditionFailed,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Unavailable(_) | StoreError::Serde(_) | StoreError::Storage(_) => {
                ErrorKind::Unknown
            }
        };
        SyncError::new(kind, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
