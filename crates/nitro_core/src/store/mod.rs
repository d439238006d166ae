//! In-memory entity stores with write-through persistence.
//!
//! # Responsibility
//! - Own the local-id keyed maps for tasks and lists.
//! - Persist the whole collection after every mutation.
//! - Emit change events and hand outbound intents to the queue.
//!
//! # Invariants
//! - Exactly one entity per local id; at most one per server id.
//! - Entity fields are only written through store methods.
//! - Every mutating call has saved the store before it returns.

use crate::events::ChangeSource;
use crate::model::list::{ListPatch, NewList, RemoteList, TaskList};
use crate::model::task::{NewTask, RemoteTask, Task, TaskPatch};
use crate::model::{EpochMs, LocalId, ServerId};
use crate::storage::{StorageError, LISTS_KEY, TASKS_KEY};
use crate::sync::IntentKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod entity_store;
mod list_store;
mod task_store;

pub use entity_store::EntityStore;
pub use list_store::ListStore;
pub use task_store::{ArchiveOutcome, TaskStore};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Storage(StorageError),
    /// Id generation kept colliding with live ids.
    IdExhausted { attempts: usize },
    /// Persisted collection violates a store invariant.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::IdExhausted { attempts } => {
                write!(f, "could not generate a unique id after {attempts} attempts")
            }
            Self::InvalidData(message) => write!(f, "invalid stored collection: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::IdExhausted { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Record kind managed by an [`EntityStore`].
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + 'static {
    /// Creation input.
    type Draft;
    /// Local partial update.
    type Patch;
    /// Server payload.
    type Remote;

    const STORAGE_KEY: &'static str;
    const SOURCE: ChangeSource;

    fn local_id(&self) -> &str;
    fn server_id(&self) -> Option<&str>;
    /// Parent partition (a task's list). `None` for top-level entities.
    fn partition(&self) -> Option<&str>;

    fn from_draft(id: LocalId, draft: Self::Draft) -> Self;
    fn from_remote(id: LocalId, partition: Option<&str>, remote: Self::Remote) -> Self;
    fn apply_patch(&mut self, patch: Self::Patch);
    fn merge_remote(&mut self, remote: Self::Remote);
    fn remote_id(remote: &Self::Remote) -> &str;
    fn set_server_identity(&mut self, server_id: ServerId, synced_at: EpochMs);

    /// Key used for outbound intents about this entity.
    fn intent_key(&self) -> IntentKey {
        match self.partition() {
            Some(parent) => IntentKey::child(parent, self.local_id()),
            None => IntentKey::root(self.local_id()),
        }
    }
}

impl Entity for Task {
    type Draft = NewTask;
    type Patch = TaskPatch;
    type Remote = RemoteTask;

    const STORAGE_KEY: &'static str = TASKS_KEY;
    const SOURCE: ChangeSource = ChangeSource::Tasks;

    fn local_id(&self) -> &str {
        &self.id
    }

    fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    fn partition(&self) -> Option<&str> {
        Some(&self.list)
    }

    fn from_draft(id: LocalId, draft: NewTask) -> Self {
        Task::from_draft(id, draft)
    }

    fn from_remote(id: LocalId, partition: Option<&str>, remote: RemoteTask) -> Self {
        let list = partition
            .unwrap_or(crate::model::list::DEFAULT_LIST_ID)
            .to_string();
        Task::from_remote(id, list, remote)
    }

    fn apply_patch(&mut self, patch: TaskPatch) {
        Task::apply_patch(self, patch);
    }

    fn merge_remote(&mut self, remote: RemoteTask) {
        Task::merge_remote(self, remote);
    }

    fn remote_id(remote: &RemoteTask) -> &str {
        &remote.id
    }

    fn set_server_identity(&mut self, server_id: ServerId, synced_at: EpochMs) {
        self.server_id = Some(server_id);
        self.last_synced_at = Some(synced_at);
    }
}

impl Entity for TaskList {
    type Draft = NewList;
    type Patch = ListPatch;
    type Remote = RemoteList;

    const STORAGE_KEY: &'static str = LISTS_KEY;
    const SOURCE: ChangeSource = ChangeSource::Lists;

    fn local_id(&self) -> &str {
        &self.id
    }

    fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    fn partition(&self) -> Option<&str> {
        None
    }

    fn from_draft(id: LocalId, draft: NewList) -> Self {
        TaskList::from_draft(id, draft)
    }

    fn from_remote(id: LocalId, _partition: Option<&str>, remote: RemoteList) -> Self {
        TaskList::from_remote(id, remote)
    }

    fn apply_patch(&mut self, patch: ListPatch) {
        TaskList::apply_patch(self, patch);
    }

    fn merge_remote(&mut self, remote: RemoteList) {
        TaskList::merge_remote(self, remote);
    }

    fn remote_id(remote: &RemoteList) -> &str {
        &remote.id
    }

    fn set_server_identity(&mut self, server_id: ServerId, synced_at: EpochMs) {
        self.server_id = Some(server_id);
        self.last_synced_at = Some(synced_at);
    }
}
