//! Error types for local store operations.

use crate::id::ObjectId;
use crate::schema::AttributeType;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The entity is not declared in the schema.
    #[error("unknown entity: {name}")]
    UnknownEntity {
        /// Name of the entity.
        name: String,
    },

    /// The property is not declared on the entity.
    #[error("unknown property {property} on entity {entity}")]
    UnknownProperty {
        /// Entity name.
        entity: String,
        /// Property name.
        property: String,
    },

    /// A non-optional property has no value.
    #[error("{entity}.{property} is required")]
    MissingRequired {
        /// Entity name.
        entity: String,
        /// Property name.
        property: String,
    },

    /// A value does not agree with the declared property type.
    #[error("{entity}.{property} expects {expected:?}")]
    TypeMismatch {
        /// Entity name.
        entity: String,
        /// Property name.
        property: String,
        /// The declared attribute type, `None` for relationships.
        expected: Option<AttributeType>,
    },

    /// The object does not exist.
    #[error("object not found: {id}")]
    NotFound {
        /// The missing object.
        id: ObjectId,
    },

    /// The object already exists.
    #[error("object already exists: {id}")]
    AlreadyExists {
        /// The duplicate object.
        id: ObjectId,
    },
}

impl StoreError {
    /// Creates an unknown entity error.
    pub fn unknown_entity(name: impl Into<String>) -> Self {
        Self::UnknownEntity { name: name.into() }
    }

    /// Creates an unknown property error.
    pub fn unknown_property(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            entity: entity.into(),
            property: property.into(),
        }
    }

    /// Creates a missing required value error.
    pub fn missing_required(entity: impl Into<String>, property: impl Into<String>) -> Self {
        Self::MissingRequired {
            entity: entity.into(),
            property: property.into(),
        }
    }

    /// Returns true if this error comes from object validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::MissingRequired { .. }
                | StoreError::TypeMismatch { .. }
                | StoreError::UnknownProperty { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_classification() {
        assert!(StoreError::missing_required("Task", "title").is_validation());
        assert!(StoreError::unknown_property("Task", "nope").is_validation());
        assert!(!StoreError::unknown_entity("Nope").is_validation());
        assert!(!StoreError::NotFound { id: ObjectId::new() }.is_validation());
    }

    #[test]
    fn error_display() {
        let err = StoreError::missing_required("Task", "title");
        assert_eq!(err.to_string(), "Task.title is required");
    }
}
