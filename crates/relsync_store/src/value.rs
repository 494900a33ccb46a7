//! Values held by local records.

use crate::id::ObjectId;
use crate::schema::AttributeType;
use chrono::{DateTime, Utc};

/// A property value of a local record.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalValue {
    /// No value (null attribute, empty to-one relationship).
    Null,
    /// Boolean attribute.
    Bool(bool),
    /// Integer attribute.
    Integer(i64),
    /// Floating point attribute.
    Double(f64),
    /// String attribute.
    String(String),
    /// Date attribute.
    Date(DateTime<Utc>),
    /// Binary attribute.
    Binary(Vec<u8>),
    /// To-one relationship target.
    ToOne(ObjectId),
    /// To-many relationship targets.
    ToMany(Vec<ObjectId>),
}

impl LocalValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, LocalValue::Null)
    }

    /// Get this value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LocalValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LocalValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            LocalValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a date, if it is one.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            LocalValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the referenced objects of a relationship value.
    ///
    /// Null yields an empty list; non-relationship values yield `None`.
    pub fn object_ids(&self) -> Option<Vec<ObjectId>> {
        match self {
            LocalValue::Null => Some(Vec::new()),
            LocalValue::ToOne(id) => Some(vec![*id]),
            LocalValue::ToMany(ids) => Some(ids.clone()),
            _ => None,
        }
    }

    /// Returns true if this value may be stored in an attribute of the given type.
    pub fn conforms_to(&self, attribute_type: AttributeType) -> bool {
        matches!(
            (self, attribute_type),
            (LocalValue::Null, _)
                | (LocalValue::String(_), AttributeType::String)
                | (LocalValue::Integer(_), AttributeType::Integer)
                | (LocalValue::Double(_), AttributeType::Double)
                | (LocalValue::Bool(_), AttributeType::Boolean)
                | (LocalValue::Date(_), AttributeType::Date)
                | (LocalValue::Binary(_), AttributeType::Binary)
        )
    }
}

impl From<bool> for LocalValue {
    fn from(b: bool) -> Self {
        LocalValue::Bool(b)
    }
}

impl From<i64> for LocalValue {
    fn from(n: i64) -> Self {
        LocalValue::Integer(n)
    }
}

impl From<i32> for LocalValue {
    fn from(n: i32) -> Self {
        LocalValue::Integer(i64::from(n))
    }
}

impl From<f64> for LocalValue {
    fn from(n: f64) -> Self {
        LocalValue::Double(n)
    }
}

impl From<String> for LocalValue {
    fn from(s: String) -> Self {
        LocalValue::String(s)
    }
}

impl From<&str> for LocalValue {
    fn from(s: &str) -> Self {
        LocalValue::String(s.to_string())
    }
}

impl From<DateTime<Utc>> for LocalValue {
    fn from(d: DateTime<Utc>) -> Self {
        LocalValue::Date(d)
    }
}

impl From<Vec<u8>> for LocalValue {
    fn from(b: Vec<u8>) -> Self {
        LocalValue::Binary(b)
    }
}

impl From<ObjectId> for LocalValue {
    fn from(id: ObjectId) -> Self {
        LocalValue::ToOne(id)
    }
}

impl<T: Into<LocalValue>> From<Option<T>> for LocalValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(LocalValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conformance() {
        assert!(LocalValue::from("x").conforms_to(AttributeType::String));
        assert!(LocalValue::from(3i64).conforms_to(AttributeType::Integer));
        assert!(!LocalValue::from(3i64).conforms_to(AttributeType::Double));
        assert!(LocalValue::Null.conforms_to(AttributeType::Date));
        assert!(!LocalValue::ToOne(ObjectId::new()).conforms_to(AttributeType::String));
    }

    #[test]
    fn relationship_ids() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_eq!(LocalValue::Null.object_ids(), Some(vec![]));
        assert_eq!(LocalValue::ToOne(a).object_ids(), Some(vec![a]));
        assert_eq!(LocalValue::ToMany(vec![a, b]).object_ids(), Some(vec![a, b]));
        assert_eq!(LocalValue::from(1i64).object_ids(), None);
    }

    #[test]
    fn option_conversion() {
        assert_eq!(LocalValue::from(None::<&str>), LocalValue::Null);
        assert_eq!(LocalValue::from(Some(true)), LocalValue::Bool(true));
    }
}
