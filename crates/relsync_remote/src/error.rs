//! Error types for remote database operations.

use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors reported by a remote database.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or transport error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The client is not allowed to read or write the location.
    #[error("permission denied at {path}")]
    PermissionDenied {
        /// The rejected path.
        path: String,
    },

    /// The path is not a valid location.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The client is offline.
    #[error("disconnected from remote database")]
    Disconnected,
}

impl RemoteError {
    /// Returns true if the operation may succeed when retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transport(_) | RemoteError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        assert!(RemoteError::Disconnected.is_transient());
        assert!(RemoteError::Transport("reset".into()).is_transient());
        assert!(!RemoteError::PermissionDenied { path: "a".into() }.is_transient());
    }

    #[test]
    fn error_display() {
        let err = RemoteError::PermissionDenied {
            path: "u1/tasks".into(),
        };
        assert_eq!(err.to_string(), "permission denied at u1/tasks");
    }
}
