//! Generic store shared by tasks and lists.
//!
//! # Invariants
//! - `order` mirrors the key set of `entries` and records insertion order,
//!   which is the store iteration order.
//! - Generated local ids are checked against live ids before use.

use super::{Entity, StoreError, StoreResult};
use crate::events::{ChangeEvent, ChangeNotifier, EventEmitter};
use crate::model::{EpochMs, LocalId, ServerId};
use crate::storage::{load_json, save_json, KeyValueStorage};
use crate::sync::{OutboundQueue, SyncVerb};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

const MAX_ID_ATTEMPTS: usize = 8;

/// Local-id keyed entity map with write-through persistence.
pub struct EntityStore<E: Entity> {
    pub(super) entries: HashMap<LocalId, E>,
    pub(super) order: Vec<LocalId>,
    pub(super) storage: Arc<dyn KeyValueStorage>,
    pub(super) queue: Arc<dyn OutboundQueue>,
    pub(super) emitter: EventEmitter,
    save_lock: Mutex<()>,
}

impl<E: Entity> EntityStore<E> {
    /// Creates an empty store. Call [`EntityStore::load`] to read persisted
    /// state.
    pub fn new(storage: Arc<dyn KeyValueStorage>, queue: Arc<dyn OutboundQueue>) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            storage,
            queue,
            emitter: EventEmitter::new(),
            save_lock: Mutex::new(()),
        }
    }

    /// Replaces in-memory state with the persisted collection.
    ///
    /// Returns `false` when nothing was persisted yet.
    ///
    /// # Errors
    /// - `InvalidData` when two persisted records share a local id or a
    ///   server id.
    pub fn load(&mut self) -> StoreResult<bool> {
        let Some(items) = load_json::<Vec<E>>(self.storage.as_ref(), E::STORAGE_KEY)? else {
            info!(
                "event=store_load module=store status=empty key={}",
                E::STORAGE_KEY
            );
            return Ok(false);
        };

        let mut entries = HashMap::with_capacity(items.len());
        let mut order = Vec::with_capacity(items.len());
        let mut server_ids = HashSet::new();
        for item in items {
            let id = item.local_id().to_string();
            if let Some(server_id) = item.server_id() {
                if !server_ids.insert(server_id.to_string()) {
                    return Err(StoreError::InvalidData(format!(
                        "duplicate server id `{server_id}` in `{}`",
                        E::STORAGE_KEY
                    )));
                }
            }
            if entries.contains_key(&id) {
                return Err(StoreError::InvalidData(format!(
                    "duplicate local id `{id}` in `{}`",
                    E::STORAGE_KEY
                )));
            }
            order.push(id.clone());
            entries.insert(id, item);
        }

        info!(
            "event=store_load module=store status=ok key={} count={}",
            E::STORAGE_KEY,
            order.len()
        );
        self.entries = entries;
        self.order = order;
        Ok(true)
    }

    /// Inserts records with fixed ids without queuing intents.
    ///
    /// Records whose id already exists are left untouched.
    pub fn seed(&mut self, items: impl IntoIterator<Item = E>) -> StoreResult<usize> {
        let mut inserted = 0;
        for item in items {
            if self.entries.contains_key(item.local_id()) {
                continue;
            }
            self.insert(item);
            inserted += 1;
        }
        if inserted > 0 {
            self.save()?;
            self.emit_update(None);
        }
        Ok(inserted)
    }

    /// Creates an entity and queues its `post` intent.
    ///
    /// Returns the new local id; the server id is unknown at this point.
    /// When the save fails the entity is dropped again and nothing is
    /// queued.
    pub fn add(&mut self, draft: E::Draft) -> StoreResult<LocalId> {
        let id = self.generate_id()?;
        let entity = E::from_draft(id.clone(), draft);
        let partition = entity.partition().map(str::to_string);
        let key = entity.intent_key();
        self.insert(entity);

        if let Err(err) = self.save() {
            self.remove_entry(&id);
            return Err(err);
        }
        self.emit_update(partition);
        self.queue.add_to_queue(key, SyncVerb::Post);
        Ok(id)
    }

    /// Merges `patch` into the entity with local id `id`.
    ///
    /// Returns `Ok(None)` when no such entity exists. With `sync`, a `patch`
    /// intent is queued. A failed save restores the previous record.
    pub fn update(&mut self, id: &str, patch: E::Patch, sync: bool) -> StoreResult<Option<E>> {
        let Some(entity) = self.entries.get_mut(id) else {
            return Ok(None);
        };
        let previous = entity.clone();
        entity.apply_patch(patch);
        let updated = entity.clone();

        if let Err(err) = self.save() {
            self.entries.insert(id.to_string(), previous);
            return Err(err);
        }
        self.emit_update(updated.partition().map(str::to_string));
        self.emitter.emit(ChangeEvent::EntityUpdated {
            source: E::SOURCE,
            id: id.to_string(),
        });
        if sync {
            self.queue.add_to_queue(updated.intent_key(), SyncVerb::Patch);
        }
        Ok(Some(updated))
    }

    /// Removes the entity and queues its `delete` intent.
    ///
    /// Idempotent: returns `Ok(None)` when the entity is already gone. A
    /// failed save puts the entity back at its position and queues nothing.
    pub fn delete(&mut self, id: &str) -> StoreResult<Option<E>> {
        let Some(position) = self.order.iter().position(|existing| existing == id) else {
            return Ok(None);
        };
        let Some(removed) = self.remove_entry(id) else {
            return Ok(None);
        };

        if let Err(err) = self.save() {
            self.order.insert(position, id.to_string());
            self.entries.insert(id.to_string(), removed);
            return Err(err);
        }
        self.queue
            .add_to_queue(removed.intent_key(), SyncVerb::Delete);
        self.emit_update(removed.partition().map(str::to_string));
        Ok(Some(removed))
    }

    pub fn find_by_local_id(&self, id: &str) -> Option<&E> {
        self.entries.get(id)
    }

    /// Reverse lookup used by merges. Linear scan: server ids are not indexed.
    pub fn find_by_server_id(&self, server_id: &str) -> Option<&E> {
        self.iter()
            .find(|entity| entity.server_id() == Some(server_id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Iterates entities in store order.
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates fresh local entities from server payloads.
    ///
    /// Payloads whose server id is already present are skipped so the
    /// server id stays unique.
    pub fn add_from_server(
        &mut self,
        items: Vec<E::Remote>,
        partition: Option<&str>,
    ) -> StoreResult<Vec<LocalId>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut created = Vec::with_capacity(items.len());
        for remote in items {
            if self.find_by_server_id(E::remote_id(&remote)).is_some() {
                warn!(
                    "event=ingest_add module=store status=skip key={} reason=duplicate_server_id",
                    E::STORAGE_KEY
                );
                continue;
            }
            let id = self.generate_id()?;
            self.insert(E::from_remote(id.clone(), partition, remote));
            created.push(id);
        }

        self.save()?;
        self.emit_update(partition.map(str::to_string));
        debug!(
            "event=ingest_add module=store status=ok key={} count={}",
            E::STORAGE_KEY,
            created.len()
        );
        Ok(created)
    }

    /// Merges server payloads into existing entities of `partition`,
    /// matched by server id. Unmatched payloads are skipped.
    pub fn patch_from_server(
        &mut self,
        items: Vec<E::Remote>,
        partition: Option<&str>,
    ) -> StoreResult<Vec<LocalId>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut patched = Vec::with_capacity(items.len());
        for remote in items {
            let target = self
                .iter()
                .filter(|entity| partition.is_none() || entity.partition() == partition)
                .find(|entity| entity.server_id() == Some(E::remote_id(&remote)))
                .map(|entity| entity.local_id().to_string());
            let Some(id) = target else {
                warn!(
                    "event=ingest_patch module=store status=skip key={} reason=unknown_server_id",
                    E::STORAGE_KEY
                );
                continue;
            };
            if let Some(entity) = self.entries.get_mut(&id) {
                entity.merge_remote(remote);
            }
            self.emitter.emit(ChangeEvent::EntityUpdated {
                source: E::SOURCE,
                id: id.clone(),
            });
            patched.push(id);
        }

        self.save()?;
        self.emit_update(partition.map(str::to_string));
        Ok(patched)
    }

    /// Records the server identity assigned on creation round-trip.
    ///
    /// The server id is written once; later calls with a different id are
    /// ignored and logged. Returns `Ok(None)` when the entity is gone.
    ///
    /// # Errors
    /// - `InvalidData` when another entity already owns `server_id`.
    pub fn mark_synced(
        &mut self,
        id: &str,
        server_id: ServerId,
        synced_at: EpochMs,
    ) -> StoreResult<Option<E>> {
        if let Some(owner) = self.find_by_server_id(&server_id) {
            if owner.local_id() != id {
                return Err(StoreError::InvalidData(format!(
                    "server id `{server_id}` already bound to `{}`",
                    owner.local_id()
                )));
            }
        }
        let Some(entity) = self.entries.get_mut(id) else {
            return Ok(None);
        };
        let existing = entity.server_id().map(str::to_string);
        match existing {
            None => entity.set_server_identity(server_id, synced_at),
            Some(existing) if existing == server_id => {}
            Some(_) => {
                warn!(
                    "event=mark_synced module=store status=skip key={} id={id} reason=server_id_already_set",
                    E::STORAGE_KEY
                );
                return Ok(Some(entity.clone()));
            }
        }
        let updated = entity.clone();

        self.save()?;
        self.emitter.emit(ChangeEvent::EntityUpdated {
            source: E::SOURCE,
            id: id.to_string(),
        });
        Ok(Some(updated))
    }

    /// Serializes the whole collection in store order.
    pub fn save(&self) -> StoreResult<()> {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let items: Vec<&E> = self.iter().collect();
        save_json(self.storage.as_ref(), E::STORAGE_KEY, &items)?;
        Ok(())
    }

    pub(super) fn insert(&mut self, entity: E) {
        let id = entity.local_id().to_string();
        if self.entries.insert(id.clone(), entity).is_none() {
            self.order.push(id);
        }
    }

    pub(super) fn remove_entry(&mut self, id: &str) -> Option<E> {
        let removed = self.entries.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    pub(super) fn emit_update(&self, partition: Option<String>) {
        self.emitter.emit(ChangeEvent::Update {
            source: E::SOURCE,
            partition,
        });
    }

    fn generate_id(&self) -> StoreResult<LocalId> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let candidate = Uuid::new_v4().simple().to_string();
            if !self.entries.contains_key(&candidate) {
                return Ok(candidate);
            }
            warn!(
                "event=id_collision module=store status=retry key={} attempt={attempt}",
                E::STORAGE_KEY
            );
        }
        Err(StoreError::IdExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }
}

impl<E: Entity> ChangeNotifier for EntityStore<E> {
    fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }
}

#[cfg(test)]
mod tests {
    use super::EntityStore;
    use crate::model::list::{ListPatch, NewList, RemoteList, TaskList};
    use crate::storage::{KeyValueStorage, MemoryStorage, StorageError, StorageResult, LISTS_KEY};
    use crate::store::StoreError;
    use crate::sync::{MemoryOutboundQueue, SyncVerb};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Memory storage whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        failing: AtomicBool,
    }

    impl FlakyStorage {
        fn fail_writes(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl KeyValueStorage for FlakyStorage {
        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            self.inner.remove(key)
        }
    }

    fn flaky_store() -> (EntityStore<TaskList>, Arc<FlakyStorage>, Arc<MemoryOutboundQueue>) {
        let storage = Arc::new(FlakyStorage::default());
        let queue = Arc::new(MemoryOutboundQueue::new());
        (
            EntityStore::new(storage.clone(), queue.clone()),
            storage,
            queue,
        )
    }

    fn store() -> (EntityStore<TaskList>, Arc<MemoryStorage>, Arc<MemoryOutboundQueue>) {
        let storage = Arc::new(MemoryStorage::new());
        let queue = Arc::new(MemoryOutboundQueue::new());
        (
            EntityStore::new(storage.clone(), queue.clone()),
            storage,
            queue,
        )
    }

    #[test]
    fn add_persists_before_returning_and_queues_post() {
        let (mut lists, storage, queue) = store();
        let id = lists.add(NewList::new("Work")).expect("add should succeed");

        let raw = storage.get(LISTS_KEY).expect("get").expect("document");
        assert!(raw.contains(&id));
        let pending = queue.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].verb, SyncVerb::Post);
        assert_eq!(pending[0].key.ids, vec![id]);
    }

    #[test]
    fn generated_ids_are_unique() {
        let (mut lists, _, _) = store();
        let mut ids = std::collections::HashSet::new();
        for n in 0..200 {
            ids.insert(lists.add(NewList::new(format!("l{n}"))).expect("add"));
        }
        assert_eq!(ids.len(), 200);
        assert_eq!(lists.len(), 200);
    }

    #[test]
    fn update_missing_returns_none() {
        let (mut lists, _, queue) = store();
        let result = lists
            .update("nope", ListPatch::default(), true)
            .expect("update should not fail");
        assert!(result.is_none());
        assert!(queue.pending().is_empty());
    }

    #[test]
    fn update_without_sync_skips_queue() {
        let (mut lists, _, queue) = store();
        let id = lists.add(NewList::new("Work")).expect("add");
        queue.drain();
        let patch = ListPatch {
            name: Some("Home".to_string()),
            ..ListPatch::default()
        };
        let updated = lists.update(&id, patch, false).expect("update").expect("found");
        assert_eq!(updated.name, "Home");
        assert!(queue.pending().is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let (mut lists, _, queue) = store();
        let id = lists.add(NewList::new("Work")).expect("add");
        assert!(lists.delete(&id).expect("delete").is_some());
        assert!(lists.delete(&id).expect("second delete").is_none());
        let deletes = queue
            .pending()
            .into_iter()
            .filter(|intent| intent.verb == SyncVerb::Delete)
            .count();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn load_restores_store_order() {
        let (mut lists, storage, queue) = store();
        let first = lists.add(NewList::new("a")).expect("add");
        let second = lists.add(NewList::new("b")).expect("add");

        let mut reloaded: EntityStore<TaskList> = EntityStore::new(storage, queue);
        assert!(reloaded.load().expect("load"));
        let ids: Vec<_> = reloaded.iter().map(|list| list.id.clone()).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn load_rejects_duplicate_local_ids() {
        let (_, storage, queue) = store();
        storage
            .set(
                LISTS_KEY,
                r#"[{"id":"x","serverId":null,"lastSyncedAt":null,"name":"a","notes":null},
                    {"id":"x","serverId":null,"lastSyncedAt":null,"name":"b","notes":null}]"#,
            )
            .expect("set");
        let mut lists: EntityStore<TaskList> = EntityStore::new(storage, queue);
        assert!(matches!(lists.load(), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn add_from_server_skips_known_server_ids() {
        let (mut lists, _, _) = store();
        let remote = RemoteList {
            id: "s1".to_string(),
            name: Some("Work".to_string()),
            ..RemoteList::default()
        };
        let first = lists
            .add_from_server(vec![remote.clone()], None)
            .expect("ingest");
        let second = lists.add_from_server(vec![remote], None).expect("ingest");
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(lists.len(), 1);
    }

    #[test]
    fn mark_synced_sets_server_id_once() {
        let (mut lists, _, _) = store();
        let id = lists.add(NewList::new("Work")).expect("add");
        lists
            .mark_synced(&id, "s1".to_string(), 10)
            .expect("mark")
            .expect("found");
        let again = lists
            .mark_synced(&id, "s2".to_string(), 20)
            .expect("mark")
            .expect("found");
        assert_eq!(again.server_id.as_deref(), Some("s1"));
        assert_eq!(again.last_synced_at, Some(10));

        let other = lists.add(NewList::new("Home")).expect("add");
        let conflict = lists.mark_synced(&other, "s1".to_string(), 30);
        assert!(matches!(conflict, Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn failed_add_leaves_no_entity_and_no_intent() {
        let (mut lists, storage, queue) = flaky_store();
        storage.fail_writes(true);

        let result = lists.add(NewList::new("Work"));
        assert!(matches!(result, Err(StoreError::Storage(_))));
        assert!(lists.is_empty());
        assert!(queue.pending().is_empty());

        storage.fail_writes(false);
        let id = lists.add(NewList::new("Home")).expect("add after recovery");
        assert_eq!(lists.len(), 1);
        let pending = queue.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key.ids, vec![id]);
    }

    #[test]
    fn failed_update_restores_previous_record() {
        let (mut lists, storage, queue) = flaky_store();
        let id = lists.add(NewList::new("Work")).expect("add");
        queue.drain();
        storage.fail_writes(true);

        let patch = ListPatch {
            name: Some("Home".to_string()),
            ..ListPatch::default()
        };
        assert!(lists.update(&id, patch, true).is_err());
        assert_eq!(lists.find_by_local_id(&id).expect("still there").name, "Work");
        assert!(queue.pending().is_empty());
    }

    #[test]
    fn failed_delete_keeps_entity_in_place_and_queues_nothing() {
        let (mut lists, storage, queue) = flaky_store();
        let first = lists.add(NewList::new("a")).expect("add");
        let second = lists.add(NewList::new("b")).expect("add");
        queue.drain();
        storage.fail_writes(true);

        assert!(lists.delete(&first).is_err());
        let ids: Vec<_> = lists.iter().map(|list| list.id.clone()).collect();
        assert_eq!(ids, vec![first.clone(), second]);
        assert!(queue.pending().is_empty());

        storage.fail_writes(false);
        assert!(lists.delete(&first).expect("delete").is_some());
        assert_eq!(queue.pending()[0].verb, SyncVerb::Delete);
    }
}
