//! Task-specific store operations: partitions, bulk delete, archive.

use super::{EntityStore, StoreResult};
use crate::model::list::VirtualList;
use crate::model::task::{ArchivedTask, Task, TaskType};
use crate::model::{EpochMs, LocalId};
use crate::storage::{archive_key, load_json, save_json};
use crate::sync::{IntentKey, SyncVerb};
use crate::view::DerivedViews;
use log::info;

/// Task store.
pub type TaskStore = EntityStore<Task>;

/// Result of archiving a batch of tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveOutcome {
    /// Found task ids, in request order.
    pub archived: Vec<LocalId>,
    /// Ids removed from the store right away (signed-out archive).
    pub removed: Vec<LocalId>,
}

impl EntityStore<Task> {
    /// Returns the tasks of a partition.
    ///
    /// Real lists are scanned in store order; virtual lists are delegated
    /// to `views`.
    pub fn find_by_partition(
        &self,
        partition: &str,
        views: &dyn DerivedViews,
        now: EpochMs,
    ) -> Vec<Task> {
        match VirtualList::from_id(partition) {
            Some(view) => {
                let all: Vec<&Task> = self.iter().collect();
                views.resolve(view, &all, now)
            }
            None => self
                .iter()
                .filter(|task| task.list == partition)
                .cloned()
                .collect(),
        }
    }

    /// Counts open tasks (not completed, not header, not archived).
    pub fn open_count(&self, partition: &str, views: &dyn DerivedViews, now: EpochMs) -> usize {
        self.find_by_partition(partition, views, now)
            .iter()
            .filter(|task| task.is_open())
            .count()
    }

    /// Removes every task of a list.
    ///
    /// Tasks unknown to the server get a `delete` intent; server-known tasks
    /// are left to the server-side cascade of the list delete.
    pub fn delete_all_from_partition(&mut self, list_id: &str) -> StoreResult<Vec<LocalId>> {
        let doomed: Vec<LocalId> = self
            .iter()
            .filter(|task| task.list == list_id)
            .map(|task| task.id.clone())
            .collect();

        for id in &doomed {
            if let Some(task) = self.remove_entry(id) {
                if task.server_id.is_none() {
                    self.queue
                        .add_to_queue(IntentKey::child(list_id, id.as_str()), SyncVerb::Delete);
                }
            }
        }

        self.save()?;
        self.emit_update(Some(list_id.to_string()));
        info!(
            "event=delete_partition module=store status=ok list={list_id} count={}",
            doomed.len()
        );
        Ok(doomed)
    }

    /// Archives a batch of tasks of one list.
    ///
    /// Missing ids are skipped. Signed in: server-known tasks are retagged
    /// `archived` and one `archive` intent carries their server ids, while
    /// server-unknown tasks are left alone until they sync. Signed out:
    /// every found task is archived and removed locally. Archived copies
    /// embed `list_name` and are appended to `archive-<list_id>`.
    pub fn archive_multiple(
        &mut self,
        task_ids: &[LocalId],
        list_id: &str,
        list_name: &str,
        signed_in: bool,
        now: EpochMs,
    ) -> StoreResult<ArchiveOutcome> {
        let mut outcome = ArchiveOutcome::default();
        let mut server_ids = Vec::new();
        let mut copies = Vec::new();

        for id in task_ids {
            let Some(task) = self.entries.get_mut(id) else {
                continue;
            };
            outcome.archived.push(id.clone());
            if signed_in && task.server_id.is_none() {
                continue;
            }
            task.kind = TaskType::Archived;
            if let Some(server_id) = &task.server_id {
                server_ids.push(server_id.clone());
            }
            copies.push(ArchivedTask {
                task: task.clone(),
                list_name: list_name.to_string(),
                archived_at: now,
            });
        }

        if signed_in && !server_ids.is_empty() {
            self.queue
                .add_to_queue(IntentKey::batch(list_id, server_ids), SyncVerb::Archive);
        }

        let key = archive_key(list_id);
        let mut archive: Vec<ArchivedTask> =
            load_json(self.storage.as_ref(), &key)?.unwrap_or_default();
        archive.extend(copies);
        save_json(self.storage.as_ref(), &key, &archive)?;

        if !signed_in {
            for id in &outcome.archived {
                if self.remove_entry(id).is_some() {
                    outcome.removed.push(id.clone());
                }
            }
        }

        self.save()?;
        self.emit_update(Some(list_id.to_string()));
        Ok(outcome)
    }

    /// Reads the archive document of a list.
    pub fn archived(&self, list_id: &str) -> StoreResult<Vec<ArchivedTask>> {
        Ok(load_json(self.storage.as_ref(), &archive_key(list_id))?.unwrap_or_default())
    }
}
