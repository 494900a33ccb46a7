//! The entity to table mapping.

use crate::config::{LocalDeletePolicy, SyncAttributes, SyncConfig};
use crate::error::{SyncError, SyncResult};
use relsync_remote::RemotePath;
use relsync_store::{AttributeType, EntityDescription, Schema};
use std::collections::BTreeMap;

/// One entity bound to one remote table.
///
/// The binding carries the bookkeeping attribute names that were validated
/// against the entity when it was bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTableBinding {
    /// Local entity name.
    pub entity_name: String,
    /// Remote table identifier.
    pub table_id: String,
    /// Sync ID, synced flag and last-device attribute names.
    pub attributes: SyncAttributes,
}

/// Bidirectional entity/table mapping.
///
/// Entities and tables are unique: no entity is bound twice and no table
/// serves two entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityTableMap {
    by_entity: BTreeMap<String, String>,
    by_table: BTreeMap<String, String>,
    attributes: SyncAttributes,
}

impl EntityTableMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that `entity_name` can be synced through `table_id`.
    pub fn validate(
        schema: &Schema,
        config: &SyncConfig,
        table_id: &str,
        entity_name: &str,
    ) -> SyncResult<()> {
        RemotePath::root().child(table_id).map_err(|err| {
            SyncError::configuration(entity_name, format!("invalid table id: {err}"))
        })?;

        let entity = schema.entity(entity_name).ok_or_else(|| {
            SyncError::configuration(entity_name, "entity not found in the local schema")
        })?;

        let attributes = &config.attributes;
        require_attribute(entity, &attributes.sync_id, AttributeType::String)?;
        require_attribute(entity, &attributes.is_synced, AttributeType::Boolean)?;
        if let LocalDeletePolicy::Soft { attribute } = &config.local_delete {
            require_attribute(entity, attribute, AttributeType::Boolean)?;
        }
        Ok(())
    }

    /// Binds an entity to a table, returning the entity's previous table.
    pub fn set_table(
        &mut self,
        schema: &Schema,
        config: &SyncConfig,
        table_id: &str,
        entity_name: &str,
    ) -> SyncResult<Option<String>> {
        Self::validate(schema, config, table_id, entity_name)?;
        if let Some(owner) = self.by_table.get(table_id) {
            if owner != entity_name {
                return Err(SyncError::configuration(
                    entity_name,
                    format!("table {table_id} is already bound to {owner}"),
                ));
            }
        }

        let previous = self
            .by_entity
            .insert(entity_name.to_string(), table_id.to_string());
        if let Some(previous) = &previous {
            self.by_table.remove(previous);
        }
        self.by_table
            .insert(table_id.to_string(), entity_name.to_string());
        self.attributes = config.attributes.clone();
        Ok(previous)
    }

    /// Replaces the whole mapping. Entries are keyed by entity name.
    ///
    /// Every entry is validated first; on error the map is left unchanged.
    pub fn set_tables(
        &mut self,
        schema: &Schema,
        config: &SyncConfig,
        tables_by_entity_name: &BTreeMap<String, String>,
    ) -> SyncResult<()> {
        let mut by_table = BTreeMap::new();
        for (entity_name, table_id) in tables_by_entity_name {
            Self::validate(schema, config, table_id, entity_name)?;
            if let Some(owner) = by_table.insert(table_id.clone(), entity_name.clone()) {
                return Err(SyncError::configuration(
                    entity_name.as_str(),
                    format!("table {table_id} is also bound to {owner}"),
                ));
            }
        }
        self.by_entity = tables_by_entity_name.clone();
        self.by_table = by_table;
        self.attributes = config.attributes.clone();
        Ok(())
    }

    /// Unbinds an entity, returning its table.
    pub fn remove_entity(&mut self, entity_name: &str) -> Option<String> {
        let table_id = self.by_entity.remove(entity_name)?;
        self.by_table.remove(&table_id);
        Some(table_id)
    }

    /// The table bound to an entity.
    pub fn table_for_entity(&self, entity_name: &str) -> Option<&str> {
        self.by_entity.get(entity_name).map(String::as_str)
    }

    /// The entity bound to a table.
    pub fn entity_for_table(&self, table_id: &str) -> Option<&str> {
        self.by_table.get(table_id).map(String::as_str)
    }

    /// The binding of a table.
    pub fn binding_for_table(&self, table_id: &str) -> Option<EntityTableBinding> {
        self.entity_for_table(table_id)
            .map(|entity_name| self.binding(entity_name, table_id))
    }

    /// The binding of an entity.
    pub fn binding_for_entity(&self, entity_name: &str) -> Option<EntityTableBinding> {
        self.table_for_entity(entity_name)
            .map(|table_id| self.binding(entity_name, table_id))
    }

    fn binding(&self, entity_name: &str, table_id: &str) -> EntityTableBinding {
        EntityTableBinding {
            entity_name: entity_name.to_string(),
            table_id: table_id.to_string(),
            attributes: self.attributes.clone(),
        }
    }

    /// Entity name to table ID.
    pub fn tables_by_entity_name(&self) -> &BTreeMap<String, String> {
        &self.by_entity
    }

    /// All bound table IDs.
    pub fn table_ids(&self) -> Vec<String> {
        self.by_table.keys().cloned().collect()
    }

    /// All bound entity names.
    pub fn entity_names(&self) -> Vec<String> {
        self.by_entity.keys().cloned().collect()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}

fn require_attribute(
    entity: &EntityDescription,
    name: &str,
    expected: AttributeType,
) -> SyncResult<()> {
    match entity.attribute(name) {
        Some(attribute) if attribute.attribute_type == expected && !attribute.transient => Ok(()),
        Some(attribute) => Err(SyncError::configuration(
            entity.name(),
            format!(
                "attribute {name} must be a persisted {expected:?} attribute, found {:?}",
                attribute.attribute_type
            ),
        )),
        None => Err(SyncError::configuration(
            entity.name(),
            format!("missing {expected:?} attribute {name}"),
        )),
    }
}
