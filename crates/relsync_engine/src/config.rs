//! Configuration for the sync engine.

/// Default local attribute holding the sync ID.
pub const DEFAULT_SYNC_ATTRIBUTE_NAME: &str = "syncID";
/// Default local attribute holding the synced flag.
pub const DEFAULT_IS_SYNCED_ATTRIBUTE_NAME: &str = "isSynced";
/// Default remote field holding the ID of the last writing device.
pub const DEFAULT_LAST_DEVICE_ID_ATTRIBUTE_NAME: &str = "lastDeviceID";
/// Default remote field marking a tombstone.
pub const DEFAULT_TOMBSTONE_FIELD: &str = "isDeleted";

/// Names of the bookkeeping attributes used for sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAttributes {
    /// Local string attribute holding the sync ID.
    pub sync_id: String,
    /// Local boolean attribute set once a record has a remote counterpart.
    pub is_synced: String,
    /// Remote field holding the device that last wrote a record.
    pub last_device_id: String,
}

impl Default for SyncAttributes {
    fn default() -> Self {
        Self {
            sync_id: DEFAULT_SYNC_ATTRIBUTE_NAME.to_string(),
            is_synced: DEFAULT_IS_SYNCED_ATTRIBUTE_NAME.to_string(),
            last_device_id: DEFAULT_LAST_DEVICE_ID_ATTRIBUTE_NAME.to_string(),
        }
    }
}

/// How local deletions are written to the remote database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteDeletePolicy {
    /// Merge `{field: true}` into the remote record, keeping the node.
    Tombstone {
        /// The tombstone field name.
        field: String,
    },
    /// Remove the remote node.
    Remove,
}

impl Default for RemoteDeletePolicy {
    fn default() -> Self {
        RemoteDeletePolicy::Tombstone {
            field: DEFAULT_TOMBSTONE_FIELD.to_string(),
        }
    }
}

/// How remote deletions are applied to the local store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LocalDeletePolicy {
    /// Delete the local object.
    #[default]
    Hard,
    /// Set a boolean attribute to true and keep the object.
    Soft {
        /// The boolean attribute marking deleted objects.
        attribute: String,
    },
}

/// Configuration for a sync manager.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Account identifier; remote tables live under this key.
    pub user_id: String,
    /// Identifier of this installation, used to recognise our own writes.
    pub device_id: String,
    /// Bookkeeping attribute names.
    pub attributes: SyncAttributes,
    /// Remote deletion policy.
    pub remote_delete: RemoteDeletePolicy,
    /// Local deletion policy.
    pub local_delete: LocalDeletePolicy,
    /// Capacity of the notification channel.
    pub notification_capacity: usize,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: device_id.into(),
            attributes: SyncAttributes::default(),
            remote_delete: RemoteDeletePolicy::default(),
            local_delete: LocalDeletePolicy::default(),
            notification_capacity: 256,
        }
    }

    /// Sets the sync ID attribute name.
    pub fn with_sync_attribute_name(mut self, name: impl Into<String>) -> Self {
        self.attributes.sync_id = name.into();
        self
    }

    /// Sets the synced-flag attribute name.
    pub fn with_is_synced_attribute_name(mut self, name: impl Into<String>) -> Self {
        self.attributes.is_synced = name.into();
        self
    }

    /// Sets the remote last-device field name.
    pub fn with_last_device_id_attribute_name(mut self, name: impl Into<String>) -> Self {
        self.attributes.last_device_id = name.into();
        self
    }

    /// Sets the remote deletion policy.
    pub fn with_remote_delete(mut self, policy: RemoteDeletePolicy) -> Self {
        self.remote_delete = policy;
        self
    }

    /// Sets the local deletion policy.
    pub fn with_local_delete(mut self, policy: LocalDeletePolicy) -> Self {
        self.local_delete = policy;
        self
    }

    /// Sets the notification channel capacity.
    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity.max(1);
        self
    }

    /// Author tag on every local commit made by the sync engine.
    pub fn commit_author(&self) -> String {
        format!("relsync:{}", self.device_id)
    }

    /// The remote tombstone field, if tombstones are in use.
    pub fn tombstone_field(&self) -> Option<&str> {
        match &self.remote_delete {
            RemoteDeletePolicy::Tombstone { field } => Some(field),
            RemoteDeletePolicy::Remove => None,
        }
    }
}
