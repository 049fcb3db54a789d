use thiserror::Error;

/// Errors surfaced by an [`Inspector`](crate::inspector::Inspector).
#[derive(Error, Debug)]
pub enum InspectorError {
    #[error("queue '{0}' not found")]
    QueueNotFound(String),

    #[error("queue '{0}' is not empty")]
    QueueNotEmpty(String),

    #[error("queue '{0}' is already paused")]
    QueueAlreadyPaused(String),

    #[error("queue '{0}' is not paused")]
    QueueNotPaused(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`InspectorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Internal,
}

impl InspectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InspectorError::QueueNotFound(_) => ErrorKind::NotFound,
            InspectorError::QueueNotEmpty(_)
            | InspectorError::QueueAlreadyPaused(_)
            | InspectorError::QueueNotPaused(_) => ErrorKind::InvalidState,
            InspectorError::Database(_) | InspectorError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, InspectorError>;
