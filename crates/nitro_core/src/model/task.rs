//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record owned by the task store.
//! - Define local patch and server payload shapes and their merge rules.
//!
//! # Invariants
//! - `list` always references a persisted list id, never a virtual list.
//! - Merges never touch `id`; `server_id` is only written by ingestion or
//!   creation acknowledgement.
//! - A server patch with a `null` date keeps the prior local value.

use super::serde_ext::double_option;
use super::{EpochMs, LocalId, ServerId};
use serde::{Deserialize, Serialize};

/// Explicit type tag carried by every task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Plain actionable task.
    #[default]
    Task,
    /// Section heading rendered inside a list.
    Header,
    /// Task flagged for the "next" view instead of being dated.
    Next,
    /// Task moved to the archive and awaiting server-side removal.
    Archived,
}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: LocalId,
    pub server_id: Option<ServerId>,
    pub last_synced_at: Option<EpochMs>,
    /// Parent list local id.
    pub list: LocalId,
    pub name: String,
    pub notes: Option<String>,
    /// Serialized as `type` to match the server schema.
    #[serde(rename = "type")]
    pub kind: TaskType,
    pub date: Option<EpochMs>,
    pub deadline: Option<EpochMs>,
    pub completed: Option<EpochMs>,
}

impl Task {
    /// Builds a local-only task from creation input.
    pub fn from_draft(id: LocalId, draft: NewTask) -> Self {
        Self {
            id,
            server_id: None,
            last_synced_at: None,
            list: draft.list,
            name: draft.name,
            notes: draft.notes,
            kind: draft.kind,
            date: draft.date,
            deadline: draft.deadline,
            completed: None,
        }
    }

    /// Builds a task from a server payload under an existing local list.
    pub fn from_remote(id: LocalId, list: LocalId, remote: RemoteTask) -> Self {
        Self {
            id,
            server_id: Some(remote.id),
            last_synced_at: remote.updated_at,
            list,
            name: remote.name.unwrap_or_default(),
            notes: remote.notes.flatten(),
            kind: remote.kind.unwrap_or_default(),
            date: remote.date,
            deadline: remote.deadline,
            completed: remote.completed,
        }
    }

    /// Applies a local edit. Every provided field overwrites.
    pub fn apply_patch(&mut self, patch: TaskPatch) {
        if let Some(list) = patch.list {
            self.list = list;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }

    /// Merges a server patch.
    ///
    /// Plain fields overwrite when present. Date fields overwrite only with
    /// a non-null value; `null` keeps whatever is stored locally.
    pub fn merge_remote(&mut self, remote: RemoteTask) {
        if let Some(name) = remote.name {
            self.name = name;
        }
        if let Some(notes) = remote.notes {
            self.notes = notes;
        }
        if let Some(kind) = remote.kind {
            self.kind = kind;
        }
        if remote.date.is_some() {
            self.date = remote.date;
        }
        if remote.deadline.is_some() {
            self.deadline = remote.deadline;
        }
        if remote.completed.is_some() {
            self.completed = remote.completed;
        }
        if remote.updated_at.is_some() {
            self.last_synced_at = remote.updated_at;
        }
    }

    /// Whether the task counts towards a list's open-task badge.
    pub fn is_open(&self) -> bool {
        self.completed.is_none() && !matches!(self.kind, TaskType::Header | TaskType::Archived)
    }
}

/// Creation input for a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    /// Target list id; may be a virtual list before the façade rewrites it.
    pub list: LocalId,
    pub name: String,
    pub notes: Option<String>,
    pub kind: TaskType,
    pub date: Option<EpochMs>,
    pub deadline: Option<EpochMs>,
}

impl NewTask {
    pub fn new(list: impl Into<LocalId>, name: impl Into<String>) -> Self {
        Self {
            list: list.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Local partial update. `None` leaves a field untouched; for nullable
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub list: Option<LocalId>,
    pub name: Option<String>,
    pub notes: Option<Option<String>>,
    pub kind: Option<TaskType>,
    pub date: Option<Option<EpochMs>>,
    pub deadline: Option<Option<EpochMs>>,
    pub completed: Option<Option<EpochMs>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Task payload as delivered by the server.
///
/// Date fields collapse absent and `null` into `None`; both mean "keep".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    pub id: ServerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TaskType>,
    #[serde(default)]
    pub date: Option<EpochMs>,
    #[serde(default)]
    pub deadline: Option<EpochMs>,
    #[serde(default)]
    pub completed: Option<EpochMs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<EpochMs>,
}

impl RemoteTask {
    pub fn new(id: impl Into<ServerId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Denormalized archived copy; the list name is captured at archive time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedTask {
    #[serde(flatten)]
    pub task: Task,
    pub list_name: String,
    pub archived_at: EpochMs,
}
