//! List domain model and reserved list names.
//!
//! # Responsibility
//! - Define the list record, including the two order sequences it owns.
//! - Define system lists, virtual lists and the reserved name prefix.
//!
//! # Invariants
//! - `local_order` holds task local ids; `order` holds the same sequence
//!   translated to server ids with unresolved entries dropped.
//! - `order` is only ever derived from `local_order`, never edited directly.
//! - System lists can never be deleted.

use super::serde_ext::double_option;
use super::{EpochMs, LocalId, ServerId};
use serde::{Deserialize, Serialize};

/// List that receives tasks created in a virtual list.
pub const DEFAULT_LIST_ID: &str = "inbox";

/// Prefix reserved for system list names.
pub const RESERVED_NAME_PREFIX: &str = "nitrosys-";

/// Fixed lists that exist on every installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemList {
    Inbox,
    Today,
    Next,
    All,
}

impl SystemList {
    pub const ALL: [SystemList; 4] = [Self::Inbox, Self::Today, Self::Next, Self::All];

    /// Stable local id of the list.
    pub fn id(self) -> &'static str {
        match self {
            Self::Inbox => DEFAULT_LIST_ID,
            Self::Today => "today",
            Self::Next => "next",
            Self::All => "all",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|list| list.id() == id)
    }

    /// Persisted name; carries the reserved prefix.
    pub fn stored_name(self) -> String {
        format!("{RESERVED_NAME_PREFIX}{}", self.id())
    }

    /// Returns the derived view backing this list, if it has no storage of
    /// its own.
    pub fn virtual_view(self) -> Option<VirtualList> {
        match self {
            Self::Inbox => None,
            Self::Today => Some(VirtualList::Today),
            Self::Next => Some(VirtualList::Next),
            Self::All => Some(VirtualList::All),
        }
    }
}

/// Returns whether `id` names a protected system list.
pub fn is_system_list(id: &str) -> bool {
    SystemList::from_id(id).is_some()
}

/// List name resolved to a real list plus filtering rules at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualList {
    Today,
    Next,
    All,
}

impl VirtualList {
    pub fn from_id(id: &str) -> Option<Self> {
        SystemList::from_id(id).and_then(SystemList::virtual_view)
    }
}

/// Strips the reserved prefix from a user supplied name.
pub fn strip_reserved_prefix(name: &str) -> &str {
    name.strip_prefix(RESERVED_NAME_PREFIX).unwrap_or(name)
}

/// Canonical list record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: LocalId,
    pub server_id: Option<ServerId>,
    pub last_synced_at: Option<EpochMs>,
    pub name: String,
    pub notes: Option<String>,
    /// Task local ids in display order.
    #[serde(default)]
    pub local_order: Vec<LocalId>,
    /// `local_order` translated to server ids, for outbound payloads only.
    #[serde(default)]
    pub order: Vec<ServerId>,
}

impl TaskList {
    pub fn from_draft(id: LocalId, draft: NewList) -> Self {
        Self {
            id,
            server_id: None,
            last_synced_at: None,
            name: draft.name,
            notes: draft.notes,
            local_order: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Seed record for a system list.
    pub fn system(list: SystemList) -> Self {
        Self::from_draft(
            list.id().to_string(),
            NewList {
                name: list.stored_name(),
                notes: None,
            },
        )
    }

    /// Builds a list from a server payload. Order is rebuilt by the façade
    /// once the list's tasks are ingested.
    pub fn from_remote(id: LocalId, remote: RemoteList) -> Self {
        Self {
            id,
            server_id: Some(remote.id),
            last_synced_at: remote.updated_at,
            name: remote.name.unwrap_or_default(),
            notes: remote.notes.flatten(),
            local_order: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn apply_patch(&mut self, patch: ListPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }

    pub fn merge_remote(&mut self, remote: RemoteList) {
        if let Some(name) = remote.name {
            self.name = name;
        }
        if let Some(notes) = remote.notes {
            self.notes = notes;
        }
        if remote.updated_at.is_some() {
            self.last_synced_at = remote.updated_at;
        }
    }

    /// Name as shown to consumers: system lists lose the reserved prefix.
    pub fn display_name(&self) -> &str {
        strip_reserved_prefix(&self.name)
    }
}

/// Creation input for a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewList {
    pub name: String,
    pub notes: Option<String>,
}

impl NewList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notes: None,
        }
    }
}

/// Local partial update for a list. Order is changed through the façade's
/// order update, never through a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPatch {
    pub name: Option<String>,
    pub notes: Option<Option<String>>,
}

/// List payload as delivered by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteList {
    pub id: ServerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<ServerId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<EpochMs>,
}

/// Consumer-facing list projection with a live open-task count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSummary {
    pub list: TaskList,
    pub count: usize,
}
