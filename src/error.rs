//! Runtime error types
//!
//! Engine operations never panic toward the caller: they either return one
//! of these errors or surface the condition as an event on the stream.

use std::time::Duration;

use thiserror::Error;

/// Main error type for engine-facing operations.
#[derive(Error, Debug)]
pub enum ActorError {
    /// A request did not receive a reply within its deadline.
    #[error("request to {pid} timed out after {timeout:?}")]
    Timeout { pid: String, timeout: Duration },

    /// No process with the given id is registered.
    #[error("process not found: {id}")]
    ProcessNotFound { id: String },

    /// A spawn collided with an id already in the registry.
    #[error("duplicate process id: {id}")]
    DuplicateId { id: String },

    /// A kind or id contained the reserved pid separator or was empty.
    #[error("invalid name segment: {segment:?}")]
    InvalidName { segment: String },

    /// The responder for a request went away before replying.
    #[error("response channel dropped for request to {pid}")]
    ResponseDropped { pid: String },

    /// Internal runtime failure.
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    /// Create a timeout error.
    pub fn timeout(pid: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            pid: pid.into(),
            timeout,
        }
    }

    /// Create a process-not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::ProcessNotFound { id: id.into() }
    }

    /// Create a duplicate-id error.
    pub fn duplicate(id: impl Into<String>) -> Self {
        Self::DuplicateId { id: id.into() }
    }

    /// Create an invalid-name error.
    pub fn invalid_name(segment: impl Into<String>) -> Self {
        Self::InvalidName {
            segment: segment.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Error category for logging and metrics labels.
    pub fn category(&self) -> &'static str {
        match self {
            ActorError::Timeout { .. } => "timeout",
            ActorError::ProcessNotFound { .. } => "not_found",
            ActorError::DuplicateId { .. } => "duplicate_id",
            ActorError::InvalidName { .. } => "invalid_name",
            ActorError::ResponseDropped { .. } => "response_dropped",
            ActorError::Internal { .. } => "internal",
        }
    }
}
