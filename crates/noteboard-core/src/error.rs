//! Error taxonomy for the sync core
//!
//! REST failures fall into three recoverable classes: transport trouble,
//! a missing entity, and a rejected payload. Nothing here is fatal to the
//! process; callers retry, reconnect, or surface the message.

use thiserror::Error;

/// Which backend collection an operation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Note,
    Connection,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Note => write!(f, "note"),
            EntityKind::Connection => write!(f, "connection"),
        }
    }
}

/// Errors returned by the remote store client
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network-level failure (refused connection, timeout, dropped socket)
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The entity does not exist on the backend
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },

    /// The backend rejected the payload
    #[error("validation rejected: {message}")]
    Validation { message: String },

    /// Any other non-success response
    #[error("unexpected status {status}: {message}")]
    Unexpected { status: u16, message: String },
}

impl ApiError {
    /// Classify a non-success HTTP status
    pub fn from_status(
        status: reqwest::StatusCode,
        kind: EntityKind,
        id: impl Into<String>,
        body: String,
    ) -> Self {
        match status.as_u16() {
            404 => ApiError::NotFound {
                kind,
                id: id.into(),
            },
            400 | 422 => ApiError::Validation { message: body },
            s => ApiError::Unexpected {
                status: s,
                message: body,
            },
        }
    }

    /// Whether this is a missing-entity failure
    ///
    /// Delete paths treat these as success so cascading deletes stay
    /// idempotent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// Result type for remote store operations
pub type ApiResult<T> = Result<T, ApiError>;
