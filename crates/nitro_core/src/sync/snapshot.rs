//! Full snapshot payload and the downloader contract.

use crate::model::list::RemoteList;
use crate::model::task::RemoteTask;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};

pub type SyncResult<T> = Result<T, SyncError>;

/// Failure reported by a remote collaborator.
///
/// `retryable` is informational; retries belong to the collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl SyncError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sync failed [{}]: {}", self.code, self.message)
    }
}

impl Error for SyncError {}

/// Authoritative server state for lists and their tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub lists: Vec<SnapshotList>,
}

/// One server list together with its tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotList {
    #[serde(flatten)]
    pub list: RemoteList,
    #[serde(default)]
    pub tasks: Vec<RemoteTask>,
}

/// Bulk downloader.
pub trait SnapshotSource: Send + Sync {
    fn download_lists(&self) -> SyncResult<Snapshot>;
}

/// Source returning a preset snapshot, used offline and in tests.
#[derive(Debug, Default)]
pub struct StaticSnapshotSource {
    snapshot: Mutex<Option<Snapshot>>,
}

impl StaticSnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// Source that reports the server as unreachable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn replace(&self, snapshot: Snapshot) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }
}

impl SnapshotSource for StaticSnapshotSource {
    fn download_lists(&self) -> SyncResult<Snapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| SyncError::new("unavailable", "no snapshot available", true))
    }
}

#[cfg(test)]
mod tests {
    use super::Snapshot;

    #[test]
    fn snapshot_parses_nested_tasks() {
        let raw = r#"{"lists":[{"id":"s-l1","name":"Work","order":["s-t1"],
            "tasks":[{"id":"s-t1","name":"Ship","completed":null}]}]}"#;
        let snapshot: Snapshot = serde_json::from_str(raw).expect("snapshot should parse");
        let list = &snapshot.lists[0];
        assert_eq!(list.list.id, "s-l1");
        assert_eq!(list.list.order.as_deref(), Some(&["s-t1".to_string()][..]));
        assert_eq!(list.tasks[0].completed, None);
    }
}
