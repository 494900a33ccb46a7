//! Error types for the sync engine.

use relsync_remote::{RemoteError, Value};
use relsync_store::StoreError;
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The entity/table binding is invalid. Not retryable.
    #[error("configuration error for {entity}: {reason}")]
    Configuration {
        /// The offending entity (or table).
        entity: String,
        /// What is wrong.
        reason: String,
    },

    /// A record failed local validation and was not saved.
    #[error("validation failed for {entity}: {source}")]
    Validation {
        /// Entity of the rejected record.
        entity: String,
        /// The store's validation error.
        #[source]
        source: StoreError,
    },

    /// A remote value does not match the local property type.
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),

    /// The remote database reported an error.
    #[error("transport error: {0}")]
    Transport(#[from] RemoteError),

    /// The local store reported an error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Creates a configuration error.
    pub fn configuration(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors that must stop the offending operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Configuration { .. })
    }
}

/// The remote representation a property expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedValue {
    /// A text string.
    Text,
    /// An integral number.
    Integer,
    /// Any number.
    Number,
    /// A boolean.
    Boolean,
    /// Integer milliseconds since the Unix epoch, or RFC 3339 text.
    Timestamp,
    /// Base64-encoded text.
    Base64,
    /// A sync ID string.
    SyncId,
    /// An array of sync ID strings.
    SyncIdList,
}

impl fmt::Display for ExpectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpectedValue::Text => "text",
            ExpectedValue::Integer => "integer",
            ExpectedValue::Number => "number",
            ExpectedValue::Boolean => "boolean",
            ExpectedValue::Timestamp => "timestamp (epoch milliseconds or RFC 3339)",
            ExpectedValue::Base64 => "base64 text",
            ExpectedValue::SyncId => "sync id",
            ExpectedValue::SyncIdList => "array of sync ids",
        };
        f.write_str(name)
    }
}

/// A remote value that could not be applied to a local property.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid value for {entity}.{property}: expected {expected}, got {}", .value.kind())]
pub struct TypeMismatch {
    /// Entity name.
    pub entity: String,
    /// Property name.
    pub property: String,
    /// What the property expects.
    pub expected: ExpectedValue,
    /// The rejected remote value.
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors() {
        assert!(SyncError::configuration("Task", "missing syncID").is_fatal());
        assert!(!SyncError::Transport(RemoteError::Disconnected).is_fatal());
        assert!(!SyncError::Store(StoreError::unknown_entity("Nope")).is_fatal());
    }

    #[test]
    fn error_display() {
        let err = SyncError::configuration("Task", "missing attribute syncID");
        assert_eq!(
            err.to_string(),
            "configuration error for Task: missing attribute syncID"
        );

        let mismatch = TypeMismatch {
            entity: "Task".into(),
            property: "dueDate".into(),
            expected: ExpectedValue::Timestamp,
            value: Value::from("tomorrow"),
        };
        assert_eq!(
            mismatch.to_string(),
            "invalid value for Task.dueDate: expected timestamp (epoch milliseconds or RFC 3339), got text"
        );
        assert_eq!(SyncError::from(mismatch.clone()).to_string(), mismatch.to_string());
    }
}
