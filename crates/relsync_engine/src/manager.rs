//! The sync manager.
//!
//! A [`SyncManager`] binds local entities to remote tables and, while
//! observing, keeps both sides converged:
//!
//! ```text
//! local commit ──► observer ──► queue ──► translate ──► update_child / tombstone
//! remote event ──► listener ──► queue ──► translate ──► authored local commit
//! ```
//!
//! Every callback is funnelled onto the manager's [`DispatchQueue`] before it
//! touches sync state. Writes made by the manager are tagged so neither side
//! echoes them back: local commits carry [`SyncConfig::commit_author`] and
//! remote payloads carry this device's ID.

use crate::config::{LocalDeletePolicy, RemoteDeletePolicy, SyncConfig};
use crate::delegate::SyncDelegate;
use crate::error::{SyncError, SyncResult};
use crate::listener::RemoteChangeListener;
use crate::queue::DispatchQueue;
use crate::status::{StatusBoard, SyncNotification, SyncStatus};
use crate::sync_id::{self, SyncIdFactory};
use crate::table_map::{EntityTableBinding, EntityTableMap};
use crate::translator::{ChangeTranslator, UnresolvedReference};
use parking_lot::{Mutex, RwLock};
use relsync_remote::{
    Completion, EventCallback, EventKind, RemoteDatabase, RemoteEvent, RemotePath, RemotePayload,
    RemoteResult, SubscriptionEvent, Value,
};
use relsync_store::{
    ChangeObserver, ChangeSet, LocalStore, LocalValue, ObjectId, ObserverToken,
    PropertyDescription, Record, StoreError, WriteBatch,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;

/// Keeps a local store and a remote database in sync.
///
/// The manager is idle until [`start_observing`](Self::start_observing) is
/// called. Dropping it stops observing.
pub struct SyncManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: SyncConfig,
    commit_author: String,
    namespace: RemotePath,
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteDatabase>,
    queue: Arc<dyn DispatchQueue>,
    sync_ids: RwLock<SyncIdFactory>,
    delegate: RwLock<Option<Weak<dyn SyncDelegate>>>,
    tables: RwLock<EntityTableMap>,
    observation: Mutex<Observation>,
    // Keyed by (destination entity, missing sync ID).
    pending_links: Mutex<BTreeMap<(String, String), Vec<PendingLink>>>,
    status: StatusBoard,
}

/// A relationship of a stored record that waits for a target to arrive.
#[derive(Debug, Clone)]
struct PendingLink {
    record: ObjectId,
    relationship: String,
    to_many: bool,
    sync_ids: Vec<String>,
}

#[derive(Default)]
struct Observation {
    observing: bool,
    // Bumped on every stop; completions from an older generation only settle counters.
    generation: u64,
    local_observer: Option<ObserverToken>,
    listeners: BTreeMap<String, RemoteChangeListener>,
    next_token: u64,
}

impl SyncManager {
    /// Creates an idle manager.
    ///
    /// All sync work runs on `queue`. Fails if the user or device ID cannot
    /// be used as a remote key.
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteDatabase>,
        queue: Arc<dyn DispatchQueue>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        if config.device_id.is_empty() {
            return Err(SyncError::configuration("device_id", "must not be empty"));
        }
        let namespace = if config.user_id.is_empty() {
            RemotePath::root()
        } else {
            RemotePath::root().child(&config.user_id).map_err(|err| {
                SyncError::configuration("user_id", format!("invalid user id: {err}"))
            })?
        };

        let status = StatusBoard::new(config.notification_capacity);
        let inner = Inner {
            commit_author: config.commit_author(),
            namespace,
            store,
            remote,
            queue,
            sync_ids: RwLock::new(sync_id::default_factory()),
            delegate: RwLock::new(None),
            tables: RwLock::new(EntityTableMap::new()),
            observation: Mutex::new(Observation::default()),
            pending_links: Mutex::new(BTreeMap::new()),
            status,
            config,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Replaces the sync ID factory.
    pub fn with_sync_id_factory(self, factory: SyncIdFactory) -> Self {
        *self.inner.sync_ids.write() = factory;
        self
    }

    /// Generates a sync ID with the default factory.
    pub fn sync_id() -> String {
        sync_id::sync_id()
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// The local store.
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.inner.store
    }

    /// The remote database.
    pub fn remote(&self) -> &Arc<dyn RemoteDatabase> {
        &self.inner.remote
    }

    /// Sets the delegate. The manager keeps only a weak reference.
    pub fn set_delegate<D: SyncDelegate + 'static>(&self, delegate: &Arc<D>) {
        let weak: Weak<D> = Arc::downgrade(delegate);
        let weak: Weak<dyn SyncDelegate> = weak;
        *self.inner.delegate.write() = Some(weak);
    }

    /// Removes the delegate.
    pub fn clear_delegate(&self) {
        *self.inner.delegate.write() = None;
    }

    /// Binds an entity to a remote table.
    ///
    /// Rebinding an entity releases its previous table. While observing, the
    /// new table is subscribed immediately.
    pub fn set_table(&self, table_id: &str, entity_name: &str) -> SyncResult<()> {
        let previous = self.inner.tables.write().set_table(
            self.inner.store.schema(),
            &self.inner.config,
            table_id,
            entity_name,
        )?;
        tracing::info!(entity_name, table_id, "bound entity to table");

        if let Some(previous) = previous.filter(|previous| previous != table_id) {
            self.inner.release_listener(&previous);
        }
        self.inner.subscribe_table(table_id);
        Ok(())
    }

    /// Replaces every binding with `tables_by_entity_name`.
    ///
    /// All entries are validated before any is applied.
    pub fn set_tables<E, T>(
        &self,
        tables_by_entity_name: impl IntoIterator<Item = (E, T)>,
    ) -> SyncResult<()>
    where
        E: Into<String>,
        T: Into<String>,
    {
        let requested: BTreeMap<String, String> = tables_by_entity_name
            .into_iter()
            .map(|(entity, table)| (entity.into(), table.into()))
            .collect();

        let (released, bound) = {
            let mut tables = self.inner.tables.write();
            let before = tables.table_ids();
            tables.set_tables(self.inner.store.schema(), &self.inner.config, &requested)?;
            let after = tables.table_ids();
            let released: Vec<String> = before
                .into_iter()
                .filter(|table_id| !after.contains(table_id))
                .collect();
            (released, after)
        };
        tracing::info!(tables = bound.len(), "replaced table bindings");

        for table_id in &released {
            self.inner.release_listener(table_id);
        }
        for table_id in &bound {
            self.inner.subscribe_table(table_id);
        }
        Ok(())
    }

    /// Unbinds an entity, returning the table it was bound to.
    pub fn remove_table_for_entity_name(&self, entity_name: &str) -> Option<String> {
        let table_id = self.inner.tables.write().remove_entity(entity_name)?;
        tracing::info!(entity_name, table_id = %table_id, "unbound entity");
        self.inner.release_listener(&table_id);
        Some(table_id)
    }

    /// Entity name to table ID, for every binding.
    pub fn tables_by_entity_name(&self) -> BTreeMap<String, String> {
        self.inner.tables.read().tables_by_entity_name().clone()
    }

    /// All bound table IDs.
    pub fn table_ids(&self) -> Vec<String> {
        self.inner.tables.read().table_ids()
    }

    /// All bound entity names.
    pub fn entity_names(&self) -> Vec<String> {
        self.inner.tables.read().entity_names()
    }

    /// The table bound to an entity.
    pub fn table_for_entity_name(&self, entity_name: &str) -> Option<String> {
        self.inner
            .tables
            .read()
            .table_for_entity(entity_name)
            .map(str::to_string)
    }

    /// Returns true while observing.
    pub fn is_observing(&self) -> bool {
        self.inner.observation.lock().observing
    }

    /// Starts observing local commits and every bound table.
    ///
    /// Calling it again while observing re-subscribes tables whose
    /// subscription was dropped by the database.
    pub fn start_observing(&self) {
        let inner = &self.inner;
        let install_observer = {
            let mut observation = inner.observation.lock();
            let starting = !observation.observing;
            observation.observing = true;
            if starting {
                tracing::info!(device_id = %inner.config.device_id, "starting observation");
            }
            observation.local_observer.is_none()
        };

        if install_observer {
            let token = inner.store.add_observer(inner.local_observer());
            let stale = {
                let mut observation = inner.observation.lock();
                if observation.observing && observation.local_observer.is_none() {
                    observation.local_observer = Some(token);
                    None
                } else {
                    Some(token)
                }
            };
            if let Some(token) = stale {
                inner.store.remove_observer(token);
            }
        }

        let table_ids = inner.tables.read().table_ids();
        for table_id in &table_ids {
            inner.subscribe_table(table_id);
        }
    }

    /// Stops observing and releases every subscription. Idempotent.
    pub fn stop_observing(&self) {
        let (observer, listeners) = {
            let mut observation = self.inner.observation.lock();
            if !observation.observing {
                return;
            }
            observation.observing = false;
            observation.generation += 1;
            let listeners = std::mem::take(&mut observation.listeners);
            (observation.local_observer.take(), listeners)
        };

        if let Some(token) = observer {
            self.inner.store.remove_observer(token);
        }
        let released = listeners.len();
        drop(listeners);
        tracing::info!(released, "stopped observation");
    }

    /// A snapshot of sync progress.
    pub fn current_status(&self) -> SyncStatus {
        self.inner.status.current()
    }

    /// Subscribes to status and incoming-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.inner.status.subscribe()
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        self.stop_observing();
    }
}

impl Inner {
    fn delegate(&self) -> Option<Arc<dyn SyncDelegate>> {
        self.delegate.read().as_ref().and_then(Weak::upgrade)
    }

    fn translator<'a>(&'a self, delegate: Option<&'a dyn SyncDelegate>) -> ChangeTranslator<'a> {
        ChangeTranslator::new(self.store.as_ref(), &self.config).with_delegate(delegate)
    }

    fn authored_batch(&self) -> WriteBatch {
        WriteBatch::new().authored_by(self.commit_author.as_str())
    }

    fn record_path(&self, table_id: &str, sync_id: &str) -> SyncResult<RemotePath> {
        Ok(self.namespace.child(table_id)?.child(sync_id)?)
    }

    // ---- subscriptions ----

    fn subscribe_table(self: &Arc<Self>, table_id: &str) {
        let path = match self.namespace.child(table_id) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(table_id, error = %err, "cannot subscribe to table");
                return;
            }
        };

        // Registered first: the database may deliver initial events inline.
        let token = {
            let mut observation = self.observation.lock();
            if !observation.observing || observation.listeners.contains_key(table_id) {
                return;
            }
            observation.next_token += 1;
            let token = observation.next_token;
            let listener =
                RemoteChangeListener::new(table_id, path.clone(), token, Arc::clone(&self.remote));
            observation.listeners.insert(table_id.to_string(), listener);
            token
        };

        let handle = self.remote.subscribe(&path, self.event_callback(table_id, token));

        let orphan = {
            let mut observation = self.observation.lock();
            match observation.listeners.get_mut(table_id) {
                Some(listener) if listener.token() == token => {
                    listener.attach(handle);
                    None
                }
                _ => Some(handle),
            }
        };
        match orphan {
            Some(handle) => self.remote.unsubscribe(handle),
            None => tracing::debug!(table_id, path = %path, "subscribed to table"),
        }
    }

    fn release_listener(&self, table_id: &str) {
        let listener = self.observation.lock().listeners.remove(table_id);
        drop(listener);
    }

    fn take_listener(&self, table_id: &str, token: u64) -> Option<RemoteChangeListener> {
        let mut observation = self.observation.lock();
        let current = observation
            .listeners
            .get(table_id)
            .is_some_and(|listener| listener.token() == token);
        if current {
            observation.listeners.remove(table_id)
        } else {
            None
        }
    }

    fn is_listener_current(&self, table_id: &str, token: u64) -> bool {
        let observation = self.observation.lock();
        observation.observing
            && observation
                .listeners
                .get(table_id)
                .is_some_and(|listener| listener.token() == token)
    }

    fn event_callback(self: &Arc<Self>, table_id: &str, token: u64) -> EventCallback {
        let weak = Arc::downgrade(self);
        let table_id = table_id.to_string();
        Arc::new(move |event: SubscriptionEvent| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let target = weak.clone();
            let table_id = table_id.clone();
            inner.queue.dispatch(Box::new(move || {
                if let Some(inner) = target.upgrade() {
                    inner.handle_subscription_event(&table_id, token, event);
                }
            }));
        })
    }

    fn local_observer(self: &Arc<Self>) -> ChangeObserver {
        let weak = Arc::downgrade(self);
        let author = self.commit_author.clone();
        Arc::new(move |changes: &ChangeSet| {
            if changes.is_authored_by(&author) {
                return;
            }
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let target = weak.clone();
            let changes = changes.clone();
            inner.queue.dispatch(Box::new(move || {
                if let Some(inner) = target.upgrade() {
                    inner.handle_local_changes(&changes);
                }
            }));
        })
    }

    // ---- remote to local ----

    fn handle_subscription_event(&self, table_id: &str, token: u64, event: SubscriptionEvent) {
        if !self.is_listener_current(table_id, token) {
            tracing::trace!(table_id, "dropping event of a released listener");
            return;
        }
        match event {
            SubscriptionEvent::Child(event) => self.handle_remote_event(table_id, &event),
            SubscriptionEvent::Cancelled(reason) => {
                tracing::warn!(table_id, error = %reason, "remote subscription cancelled");
                drop(self.take_listener(table_id, token));
            }
        }
    }

    fn handle_remote_event(&self, table_id: &str, event: &RemoteEvent) {
        let Some(binding) = self.tables.read().binding_for_table(table_id) else {
            return;
        };
        let payload = event.payload();
        if event.kind != EventKind::ChildRemoved && self.is_own_write(&payload) {
            tracing::trace!(table_id, key = %event.key, "ignoring own write");
            return;
        }
        // Removal events carry no author; one for a record that is already gone
        // is this device's own removal or a no-op.
        if event.kind == EventKind::ChildRemoved
            && matches!(self.find_by_sync_id(&binding.entity_name, &event.key), Ok(None))
        {
            tracing::trace!(table_id, key = %event.key, "ignoring removal of unknown record");
            return;
        }

        self.status.publish_incoming(table_id, event);
        self.status.begin_download();
        let result = match event.kind {
            EventKind::ChildRemoved => self.apply_remote_deletion(&binding, &event.key),
            _ if self.is_tombstone(&payload) => self.apply_remote_deletion(&binding, &event.key),
            _ => self.apply_remote_record(&binding, &event.key, payload),
        };
        let applied = match result {
            Ok(applied) => applied,
            Err(err) => {
                tracing::warn!(table_id, key = %event.key, error = %err, "failed to apply remote change");
                false
            }
        };
        self.status.finish_download(applied);
    }

    fn is_own_write(&self, payload: &RemotePayload) -> bool {
        payload
            .get(&self.config.attributes.last_device_id)
            .and_then(Value::as_text)
            == Some(self.config.device_id.as_str())
    }

    fn is_tombstone(&self, payload: &RemotePayload) -> bool {
        self.config
            .tombstone_field()
            .and_then(|field| payload.get(field))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn find_by_sync_id(&self, entity_name: &str, sync_id: &str) -> SyncResult<Option<Record>> {
        Ok(self.store.fetch_by_attribute(
            entity_name,
            &self.config.attributes.sync_id,
            &LocalValue::from(sync_id),
        )?)
    }

    fn apply_remote_record(
        &self,
        binding: &EntityTableBinding,
        sync_id: &str,
        payload: RemotePayload,
    ) -> SyncResult<bool> {
        let delegate = self.delegate();
        let delegate = delegate.as_deref();
        let payload = match delegate {
            Some(delegate) => delegate.transform_remote_data(payload, &binding.entity_name),
            None => payload,
        };

        let attributes = &binding.attributes;
        let existing = self.find_by_sync_id(&binding.entity_name, sync_id)?;
        let inserting = existing.is_none();
        let mut record = existing.unwrap_or_else(|| {
            Record::new(binding.entity_name.as_str()).with(attributes.sync_id.clone(), sync_id)
        });

        let applied = self.translator(delegate).apply_remote(&mut record, &payload)?;
        record.set(attributes.is_synced.clone(), true);

        if inserting {
            if let Err(source) = self.store.validate(&record) {
                self.report_invalid_insert(binding, &record, source, delegate);
                return Ok(false);
            }
        }

        let mut batch = self.authored_batch();
        for related in applied.related {
            batch = batch.insert(related);
        }
        let unresolved = applied.unresolved;
        batch = if inserting {
            batch.insert(record.clone())
        } else {
            batch.update(record.clone())
        };

        match self.store.commit(batch) {
            Ok(_) => {}
            Err(source) if source.is_validation() && inserting => {
                self.report_invalid_insert(binding, &record, source, delegate);
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        }

        tracing::debug!(
            entity = %binding.entity_name,
            sync_id,
            inserting,
            skipped = applied.mismatches.len(),
            deferred = unresolved.len(),
            "applied remote record"
        );
        if let Some(delegate) = delegate {
            delegate.record_synced_from_remote(&record);
        }

        self.forget_links(record.id());
        self.defer_links(record.id(), unresolved);
        if let Err(err) = self.relink(&binding.entity_name, sync_id, delegate) {
            tracing::warn!(entity = %binding.entity_name, sync_id, error = %err, "failed to link waiting records");
        }
        Ok(true)
    }

    /// Remembers relationships whose targets could not be stored yet.
    fn defer_links(&self, record: ObjectId, unresolved: Vec<UnresolvedReference>) {
        if unresolved.is_empty() {
            return;
        }
        let mut pending = self.pending_links.lock();
        for reference in unresolved {
            let link = PendingLink {
                record,
                relationship: reference.relationship,
                to_many: reference.to_many,
                sync_ids: reference.sync_ids,
            };
            for missing in reference.missing {
                pending
                    .entry((reference.destination.clone(), missing))
                    .or_default()
                    .push(link.clone());
            }
        }
    }

    /// Drops every pending link of `record`; a newer payload supersedes them.
    fn forget_links(&self, record: ObjectId) {
        let mut pending = self.pending_links.lock();
        pending.retain(|_, links| {
            links.retain(|link| link.record != record);
            !links.is_empty()
        });
    }

    /// Re-resolves relationships that were waiting for `entity_name`/`sync_id`.
    fn relink(
        &self,
        entity_name: &str,
        sync_id: &str,
        delegate: Option<&dyn SyncDelegate>,
    ) -> SyncResult<()> {
        let links = self
            .pending_links
            .lock()
            .remove(&(entity_name.to_string(), sync_id.to_string()))
            .unwrap_or_default();

        for link in links {
            let Some(mut record) = self.store.fetch(link.record)? else {
                continue;
            };
            let mut targets = Vec::with_capacity(link.sync_ids.len());
            for target_sync_id in &link.sync_ids {
                if let Some(target) = self.find_by_sync_id(entity_name, target_sync_id)? {
                    if !targets.contains(&target.id()) {
                        targets.push(target.id());
                    }
                }
            }
            let value = match (link.to_many, targets.first()) {
                (_, None) => LocalValue::Null,
                (true, Some(_)) => LocalValue::ToMany(targets),
                (false, Some(target)) => LocalValue::ToOne(*target),
            };
            record.set(link.relationship.clone(), value);
            self.store.commit(self.authored_batch().update(record.clone()))?;
            tracing::debug!(
                entity = %record.entity(),
                relationship = %link.relationship,
                sync_id,
                "linked late relationship target"
            );
            if let Some(delegate) = delegate {
                delegate.record_synced_from_remote(&record);
            }
        }
        Ok(())
    }

    fn report_invalid_insert(
        &self,
        binding: &EntityTableBinding,
        record: &Record,
        source: StoreError,
        delegate: Option<&dyn SyncDelegate>,
    ) {
        let error = SyncError::Validation {
            entity: binding.entity_name.clone(),
            source,
        };
        tracing::warn!(error = %error, "remote record failed validation, not saved");
        if let Some(delegate) = delegate {
            delegate.insert_validation_failed(record, &error, self.store.as_ref());
        }
    }

    fn apply_remote_deletion(&self, binding: &EntityTableBinding, sync_id: &str) -> SyncResult<bool> {
        let Some(mut record) = self.find_by_sync_id(&binding.entity_name, sync_id)? else {
            tracing::trace!(entity = %binding.entity_name, sync_id, "deleted record unknown locally");
            return Ok(true);
        };

        let batch = match &self.config.local_delete {
            LocalDeletePolicy::Hard => {
                self.forget_links(record.id());
                self.authored_batch().delete(record.id())
            }
            LocalDeletePolicy::Soft { attribute } => {
                if record.get(attribute).as_bool() == Some(true) {
                    return Ok(true);
                }
                record.set(attribute.clone(), true);
                self.authored_batch().update(record.clone())
            }
        };
        self.store.commit(batch)?;
        tracing::debug!(entity = %binding.entity_name, sync_id, "applied remote deletion");

        if let Some(delegate) = self.delegate() {
            delegate.record_synced_from_remote(&record);
        }
        Ok(true)
    }

    // ---- local to remote ----

    fn handle_local_changes(self: &Arc<Self>, changes: &ChangeSet) {
        let generation = {
            let observation = self.observation.lock();
            if !observation.observing {
                return;
            }
            observation.generation
        };
        let tables = self.tables.read().clone();
        let delegate = self.delegate();
        let delegate = delegate.as_deref();
        let syncable =
            |record: &Record| delegate.map_or(true, |delegate| delegate.is_record_syncable(record));

        let mut upserts = Vec::new();
        let mut deletions = Vec::new();
        for (entity_name, group) in changes.partition_by_entity() {
            let Some(binding) = tables.binding_for_entity(&entity_name) else {
                continue;
            };
            for record in group.inserted.iter().chain(&group.updated) {
                if syncable(record) {
                    upserts.push((binding.clone(), record.id()));
                }
            }
            for record in group.deleted {
                if !syncable(&record) {
                    continue;
                }
                let sync_id = record
                    .get_str(&self.config.attributes.sync_id)
                    .filter(|sync_id| !sync_id.is_empty())
                    .map(str::to_string);
                match sync_id {
                    Some(sync_id) => deletions.push((binding.clone(), sync_id)),
                    None => tracing::debug!(entity = %entity_name, "deleted record was never synced"),
                }
            }
        }

        let mut uploads = Vec::with_capacity(upserts.len());
        for (binding, id) in upserts {
            match self.prepare_upload(id) {
                Ok(Some(record)) => uploads.push((binding, record)),
                Ok(None) => tracing::trace!(%id, "record gone before upload"),
                Err(err) => tracing::warn!(%id, error = %err, "cannot prepare record for upload"),
            }
        }

        let total = uploads.len() + deletions.len();
        if total == 0 {
            return;
        }
        tracing::debug!(uploads = uploads.len(), deletions = deletions.len(), "uploading local changes");
        self.status.begin_uploads(total as u64);
        for (binding, record) in &uploads {
            self.upload_record(binding, record, generation, delegate);
        }
        for (binding, sync_id) in &deletions {
            self.upload_deletion(binding, sync_id, generation);
        }
    }

    /// Re-reads a changed record and makes sure it and its relationship
    /// targets have sync IDs.
    fn prepare_upload(&self, id: ObjectId) -> SyncResult<Option<Record>> {
        let Some(record) = self.store.fetch(id)? else {
            return Ok(None);
        };
        let record = self.ensure_sync_id(record)?;

        let entity = self.store.entity(record.entity())?;
        for (name, property) in entity.properties() {
            if !matches!(property, PropertyDescription::Relationship(_)) {
                continue;
            }
            for target in record.get(name).object_ids().unwrap_or_default() {
                if target == record.id() {
                    continue;
                }
                let Some(related) = self.store.fetch(target)? else {
                    continue;
                };
                let has_sync_attribute = self
                    .store
                    .entity(related.entity())?
                    .attribute(&self.config.attributes.sync_id)
                    .is_some();
                if has_sync_attribute {
                    self.ensure_sync_id(related)?;
                }
            }
        }
        Ok(Some(record))
    }

    fn ensure_sync_id(&self, mut record: Record) -> SyncResult<Record> {
        let attribute = &self.config.attributes.sync_id;
        if record.get_str(attribute).is_some_and(|sync_id| !sync_id.is_empty()) {
            return Ok(record);
        }
        let factory = Arc::clone(&*self.sync_ids.read());
        let sync_id = factory();
        tracing::debug!(entity = %record.entity(), sync_id = %sync_id, "assigning sync id");
        record.set(attribute.clone(), sync_id);
        self.store.commit(self.authored_batch().update(record.clone()))?;
        Ok(record)
    }

    fn upload_record(
        self: &Arc<Self>,
        binding: &EntityTableBinding,
        record: &Record,
        generation: u64,
        delegate: Option<&dyn SyncDelegate>,
    ) {
        let sync_id = record
            .get_str(&self.config.attributes.sync_id)
            .unwrap_or_default();
        let prepared = self
            .record_path(&binding.table_id, sync_id)
            .and_then(|path| Ok((path, self.translator(delegate).to_remote(record)?)));

        match prepared {
            Ok((path, payload)) => {
                tracing::trace!(path = %path, fields = payload.len(), "writing record");
                let completion = self.completion(generation, Some(record.id()));
                self.remote.update_child(&path, payload, completion);
            }
            Err(err) => {
                tracing::warn!(entity = %binding.entity_name, sync_id, error = %err, "cannot upload record");
                self.status.finish_upload(false);
            }
        }
    }

    fn upload_deletion(self: &Arc<Self>, binding: &EntityTableBinding, sync_id: &str, generation: u64) {
        let path = match self.record_path(&binding.table_id, sync_id) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(entity = %binding.entity_name, sync_id, error = %err, "cannot upload deletion");
                self.status.finish_upload(false);
                return;
            }
        };

        let completion = self.completion(generation, None);
        match &self.config.remote_delete {
            RemoteDeletePolicy::Tombstone { field } => {
                let mut payload = RemotePayload::new();
                payload.insert(field.clone(), Value::Bool(true));
                payload.insert(
                    self.config.attributes.last_device_id.clone(),
                    Value::from(self.config.device_id.as_str()),
                );
                tracing::trace!(path = %path, "writing tombstone");
                self.remote.update_child(&path, payload, completion);
            }
            RemoteDeletePolicy::Remove => {
                tracing::trace!(path = %path, "removing record");
                self.remote.remove(&path, completion);
            }
        }
    }

    fn completion(self: &Arc<Self>, generation: u64, uploaded: Option<ObjectId>) -> Completion {
        let weak = Arc::downgrade(self);
        Box::new(move |result: RemoteResult<()>| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let target = weak.clone();
            inner.queue.dispatch(Box::new(move || {
                if let Some(inner) = target.upgrade() {
                    inner.finish_upload(generation, uploaded, result);
                }
            }));
        })
    }

    fn finish_upload(&self, generation: u64, uploaded: Option<ObjectId>, result: RemoteResult<()>) {
        self.status.finish_upload(result.is_ok());
        if let Err(err) = result {
            tracing::warn!(error = %err, "remote write failed");
            return;
        }

        let current = {
            let observation = self.observation.lock();
            observation.observing && observation.generation == generation
        };
        let Some(id) = uploaded.filter(|_| current) else {
            return;
        };
        match self.mark_synced(id) {
            Ok(Some(record)) => {
                if let Some(delegate) = self.delegate() {
                    delegate.record_synced_to_remote(&record);
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(%id, error = %err, "cannot mark record as synced"),
        }
    }

    fn mark_synced(&self, id: ObjectId) -> SyncResult<Option<Record>> {
        let Some(mut record) = self.store.fetch(id)? else {
            return Ok(None);
        };
        let attribute = &self.config.attributes.is_synced;
        if record.get(attribute).as_bool() != Some(true) {
            record.set(attribute.clone(), true);
            self.store.commit(self.authored_batch().update(record.clone()))?;
        }
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SerialQueue;
    use relsync_remote::MemoryDatabase;
    use relsync_store::{AttributeType, EntityDescription, MemoryStore, Schema};

    fn schema() -> Schema {
        Schema::new().with_entity(
            EntityDescription::new("Task")
                .with_attribute("syncID", AttributeType::String)
                .with_attribute("isSynced", AttributeType::Boolean)
                .with_attribute("title", AttributeType::String),
        )
    }

    fn manager() -> (SyncManager, Arc<MemoryStore>, Arc<MemoryDatabase>) {
        let store = Arc::new(MemoryStore::new(schema()));
        let remote = Arc::new(MemoryDatabase::new());
        let manager = SyncManager::new(
            store.clone(),
            remote.clone(),
            Arc::new(SerialQueue::new()),
            SyncConfig::new("u1", "device-a"),
        )
        .unwrap();
        (manager, store, remote)
    }

    #[test]
    fn rejects_bad_identity() {
        let store = Arc::new(MemoryStore::new(schema()));
        let remote = Arc::new(MemoryDatabase::new());
        for config in [SyncConfig::new("u1", ""), SyncConfig::new("a/b", "device-a")] {
            let result = SyncManager::new(
                store.clone(),
                remote.clone(),
                Arc::new(SerialQueue::new()),
                config,
            );
            assert!(matches!(result, Err(SyncError::Configuration { .. })));
        }
    }

    #[test]
    fn observation_lifecycle() {
        let (manager, _store, remote) = manager();
        manager.set_table("tasks", "Task").unwrap();
        assert!(!manager.is_observing());
        assert_eq!(remote.total_subscriptions(), 0);

        manager.start_observing();
        manager.start_observing();
        assert!(manager.is_observing());
        assert_eq!(remote.total_subscriptions(), 1);

        manager.stop_observing();
        manager.stop_observing();
        assert!(!manager.is_observing());
        assert_eq!(remote.total_subscriptions(), 0);
    }

    #[test]
    fn drop_releases_subscriptions() {
        let (manager, _store, remote) = manager();
        manager.set_table("tasks", "Task").unwrap();
        manager.start_observing();
        drop(manager);
        assert_eq!(remote.total_subscriptions(), 0);
    }

    #[test]
    fn custom_sync_id_factory() {
        let (manager, store, _remote) = manager();
        let manager = manager.with_sync_id_factory(Arc::new(|| "fixed".to_string()));
        manager.set_table("tasks", "Task").unwrap();
        manager.start_observing();

        let task = Record::new("Task").with("title", "A");
        store.commit(WriteBatch::new().insert(task.clone())).unwrap();

        let stored = store.fetch(task.id()).unwrap().unwrap();
        assert_eq!(stored.get_str("syncID"), Some("fixed"));
        assert_eq!(SyncManager::sync_id().len(), 32);
    }

    #[test]
    fn user_id_namespaces_tables() {
        let (manager, store, remote) = manager();
        manager.set_table("tasks", "Task").unwrap();
        manager.start_observing();

        let task = Record::new("Task").with("syncID", "t1").with("title", "A");
        store.commit(WriteBatch::new().insert(task)).unwrap();

        let path = RemotePath::parse("u1/tasks/t1").unwrap();
        assert_eq!(
            remote.get(&path).and_then(|value| value.get("title").cloned()),
            Some(Value::from("A"))
        );
    }
}
