//! Schema introspection types.

use std::collections::BTreeMap;

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// UTF-8 string.
    String,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Double,
    /// Boolean.
    Boolean,
    /// UTC timestamp.
    Date,
    /// Opaque bytes.
    Binary,
}

/// Description of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescription {
    /// The declared value type.
    pub attribute_type: AttributeType,
    /// Whether the attribute may be null.
    pub optional: bool,
    /// Transient attributes are not persisted.
    pub transient: bool,
}

impl AttributeDescription {
    /// Creates an optional, persisted attribute of the given type.
    pub fn new(attribute_type: AttributeType) -> Self {
        Self {
            attribute_type,
            optional: true,
            transient: false,
        }
    }

    /// Marks the attribute as required.
    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }

    /// Marks the attribute as transient.
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

/// Description of a relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescription {
    /// Name of the destination entity.
    pub destination: String,
    /// Whether this is a to-many relationship.
    pub to_many: bool,
    /// Whether a to-many relationship keeps its order.
    pub ordered: bool,
    /// Whether the relationship may be empty.
    pub optional: bool,
}

impl RelationshipDescription {
    /// Creates an optional to-one relationship.
    pub fn to_one(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            to_many: false,
            ordered: false,
            optional: true,
        }
    }

    /// Creates an optional, unordered to-many relationship.
    pub fn to_many(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            to_many: true,
            ordered: false,
            optional: true,
        }
    }

    /// Marks a to-many relationship as ordered.
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Marks the relationship as required.
    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }
}

/// A property of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyDescription {
    /// A scalar attribute.
    Attribute(AttributeDescription),
    /// A reference to other objects.
    Relationship(RelationshipDescription),
}

impl PropertyDescription {
    /// Returns true if the property is stored.
    pub fn is_persisted(&self) -> bool {
        match self {
            PropertyDescription::Attribute(attr) => !attr.transient,
            PropertyDescription::Relationship(_) => true,
        }
    }

    /// Returns true if the property may be null or empty.
    pub fn is_optional(&self) -> bool {
        match self {
            PropertyDescription::Attribute(attr) => attr.optional,
            PropertyDescription::Relationship(rel) => rel.optional,
        }
    }
}

/// Description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescription {
    name: String,
    properties: BTreeMap<String, PropertyDescription>,
}

impl EntityDescription {
    /// Creates an entity description with no properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Adds an optional attribute.
    pub fn with_attribute(self, name: impl Into<String>, attribute_type: AttributeType) -> Self {
        self.with_attribute_description(name, AttributeDescription::new(attribute_type))
    }

    /// Adds an attribute with a full description.
    pub fn with_attribute_description(
        mut self,
        name: impl Into<String>,
        description: AttributeDescription,
    ) -> Self {
        self.properties
            .insert(name.into(), PropertyDescription::Attribute(description));
        self
    }

    /// Adds a relationship.
    pub fn with_relationship(
        mut self,
        name: impl Into<String>,
        description: RelationshipDescription,
    ) -> Self {
        self.properties
            .insert(name.into(), PropertyDescription::Relationship(description));
        self
    }

    /// Returns the entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns all properties keyed by name.
    pub fn properties(&self) -> &BTreeMap<String, PropertyDescription> {
        &self.properties
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescription> {
        self.properties.get(name)
    }

    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescription> {
        match self.properties.get(name) {
            Some(PropertyDescription::Attribute(attr)) => Some(attr),
            _ => None,
        }
    }

    /// Looks up a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescription> {
        match self.properties.get(name) {
            Some(PropertyDescription::Relationship(rel)) => Some(rel),
            _ => None,
        }
    }

    /// Returns the persisted properties (transient attributes excluded).
    pub fn persisted_properties(&self) -> BTreeMap<String, PropertyDescription> {
        self.properties
            .iter()
            .filter(|(_, property)| property.is_persisted())
            .map(|(name, property)| (name.clone(), property.clone()))
            .collect()
    }
}

/// The set of entity descriptions known to a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    entities: BTreeMap<String, EntityDescription>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an entity description.
    pub fn with_entity(mut self, entity: EntityDescription) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Looks up an entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntityDescription> {
        self.entities.get(name)
    }

    /// Iterates over all entity names.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}
