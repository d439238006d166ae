//! Reconciliation façade over the task and list stores.
//!
//! # Responsibility
//! - Apply virtual-list and reserved-name rules before anything is stored.
//! - Run store write, order update and outbound intent as one operation.
//! - Ingest snapshots and server patches into the stores.
//!
//! # Invariants
//! - Persisted tasks never belong to a virtual list.
//! - `local_order` changes in the same operation as the membership change
//!   that caused it; notifications are held until both are done.
//! - System lists are never deleted.
//! - Lookup misses in mutation paths are errors; bulk paths skip and go on.

use crate::clock::Clock;
use crate::events::{ChangeNotifier, EventEmitter, EventHold};
use crate::model::list::{
    is_system_list, strip_reserved_prefix, ListPatch, ListSummary, NewList, RemoteList, SystemList,
    TaskList, VirtualList, RESERVED_NAME_PREFIX,
};
use crate::model::task::{ArchivedTask, NewTask, RemoteTask, Task, TaskPatch, TaskType};
use crate::model::{EpochMs, LocalId, ServerId};
use crate::service::magic_list::{rewrite_draft, rewrite_patch};
use crate::service::ordering::{
    from_server_order, needs_heal, prepend, to_server_order, without, without_all,
};
use crate::store::{ArchiveOutcome, ListStore, StoreError, TaskStore};
use crate::sync::{OutboundQueue, SessionStore, Snapshot, SnapshotList, SnapshotSource, SyncError};
use crate::view::DerivedViews;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced to callers of the façade.
#[derive(Debug)]
pub enum ServiceError {
    /// No task with this local id.
    TaskNotFound(LocalId),
    /// No list with this local id.
    ListNotFound(LocalId),
    /// System lists cannot be deleted.
    ProtectedList(LocalId),
    /// Persistence failure.
    Store(StoreError),
    /// Snapshot download failure reported by the collaborator.
    Sync(SyncError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(id) => write!(f, "task could not be found: {id}"),
            Self::ListNotFound(id) => write!(f, "list could not be found: {id}"),
            Self::ProtectedList(id) => write!(f, "not allowed to delete system list: {id}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Sync(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<SyncError> for ServiceError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

/// Collaborators injected into the façade.
#[derive(Clone)]
pub struct ServiceDeps {
    pub list_queue: Arc<dyn OutboundQueue>,
    pub task_queue: Arc<dyn OutboundQueue>,
    pub session: Arc<dyn SessionStore>,
    pub snapshots: Arc<dyn SnapshotSource>,
    pub views: Arc<dyn DerivedViews>,
    pub clock: Arc<dyn Clock>,
}

/// Tasks of one list with the order to render them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTasks {
    pub tasks: Vec<Task>,
    pub order: Vec<LocalId>,
}

/// Counters from one snapshot application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub lists_added: usize,
    pub lists_patched: usize,
    pub tasks_added: usize,
    pub tasks_patched: usize,
}

/// Single entry point for task/list mutations and queries.
pub struct ReconcileService {
    tasks: TaskStore,
    lists: ListStore,
    deps: ServiceDeps,
    emitter: EventEmitter,
}

impl ReconcileService {
    /// Wires the façade over loaded stores and forwards their events.
    pub fn new(tasks: TaskStore, lists: ListStore, deps: ServiceDeps) -> Self {
        let emitter = EventEmitter::new();
        for source in [tasks.emitter(), lists.emitter()] {
            let forward = emitter.clone();
            source.subscribe(move |event| forward.emit(event.clone()));
        }
        Self {
            tasks,
            lists,
            deps,
            emitter,
        }
    }

    // ---- tasks -------------------------------------------------------

    /// Creates a task and puts it first in its list.
    ///
    /// Virtual targets are rewritten before the id is assigned.
    pub fn add_task(&mut self, mut draft: NewTask) -> ServiceResult<Task> {
        self.require_list(&draft.list)?;
        rewrite_draft(&mut draft, self.now());
        let list_id = draft.list.clone();
        self.require_list(&list_id)?;

        let _hold = self.hold_events();
        let id = self.tasks.add(draft)?;
        let order = prepend(self.local_order(&list_id), &id);
        self.write_order(&list_id, order, false)?;
        self.require_task(&id).cloned()
    }

    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.tasks.find_by_local_id(id).cloned()
    }

    pub fn get_task_by_server_id(&self, server_id: &str) -> Option<Task> {
        self.tasks.find_by_server_id(server_id).cloned()
    }

    /// Returns a list's tasks and its order.
    ///
    /// When the stored order drifted from live membership, a fresh order in
    /// store iteration order is returned instead.
    pub fn get_tasks(&self, list_id: &str) -> Option<ListTasks> {
        let list = self.lists.find_by_local_id(list_id)?;
        let tasks = self
            .tasks
            .find_by_partition(list_id, self.deps.views.as_ref(), self.now());
        let members: Vec<LocalId> = tasks.iter().map(|task| task.id.clone()).collect();
        let order = if needs_heal(&list.local_order, &members) {
            members
        } else {
            list.local_order.clone()
        };
        Some(ListTasks { tasks, order })
    }

    /// Merges `patch` into a task. A changed `list` moves the task.
    pub fn update_task(&mut self, id: &str, mut patch: TaskPatch) -> ServiceResult<Task> {
        let current_list = self.require_task(id)?.list.clone();
        let Some(target) = patch.list.clone() else {
            return self
                .tasks
                .update(id, patch, true)?
                .ok_or_else(|| ServiceError::TaskNotFound(id.to_string()));
        };

        self.require_list(&target)?;
        rewrite_patch(&mut patch, self.now());
        let target = patch.list.clone().unwrap_or(target);

        let _hold = self.hold_events();
        let task = self
            .tasks
            .update(id, patch, true)?
            .ok_or_else(|| ServiceError::TaskNotFound(id.to_string()))?;
        if target != current_list {
            if self.lists.contains(&current_list) {
                let source_order = without(self.local_order(&current_list), id);
                self.write_order(&current_list, source_order, true)?;
            }
            let target_order = prepend(self.local_order(&target), id);
            self.write_order(&target, target_order, true)?;
        }
        Ok(task)
    }

    /// Toggles completion: stamps now when open, clears when completed.
    pub fn complete_task(&mut self, id: &str) -> ServiceResult<Task> {
        let completed = match self.require_task(id)?.completed {
            Some(_) => None,
            None => Some(self.now()),
        };
        let patch = TaskPatch {
            completed: Some(completed),
            ..TaskPatch::default()
        };
        self.tasks
            .update(id, patch, true)?
            .ok_or_else(|| ServiceError::TaskNotFound(id.to_string()))
    }

    /// Deletes a task, removing it from its list order first.
    pub fn delete_task(&mut self, id: &str) -> ServiceResult<()> {
        let list_id = self.require_task(id)?.list.clone();

        let _hold = self.hold_events();
        if self.lists.contains(&list_id) {
            let order = without(self.local_order(&list_id), id);
            self.write_order(&list_id, order, false)?;
        }
        self.tasks.delete(id)?;
        Ok(())
    }

    /// Archives the given tasks of a list; missing ids are skipped.
    pub fn archive_tasks(
        &mut self,
        list_id: &str,
        task_ids: &[LocalId],
    ) -> ServiceResult<ArchiveOutcome> {
        let list_name = self.require_list(list_id)?.display_name().to_string();
        let signed_in = self.deps.session.is_signed_in();
        let now = self.now();

        let _hold = self.hold_events();
        let outcome = self
            .tasks
            .archive_multiple(task_ids, list_id, &list_name, signed_in, now)?;
        if !outcome.removed.is_empty() {
            let order = without_all(self.local_order(list_id), &outcome.removed);
            self.write_order(list_id, order, false)?;
        }
        info!(
            "event=archive module=service status=ok list={list_id} archived={} removed={}",
            outcome.archived.len(),
            outcome.removed.len()
        );
        Ok(outcome)
    }

    /// Archives every completed task of a real list.
    pub fn archive_completed(&mut self, list_id: &str) -> ServiceResult<ArchiveOutcome> {
        self.require_list(list_id)?;
        if VirtualList::from_id(list_id).is_some() {
            return Ok(ArchiveOutcome::default());
        }
        let completed: Vec<LocalId> = self
            .tasks
            .iter()
            .filter(|task| task.list == list_id && task.completed.is_some())
            .filter(|task| task.kind != TaskType::Archived)
            .map(|task| task.id.clone())
            .collect();
        self.archive_tasks(list_id, &completed)
    }

    /// Reads the archive of a list.
    pub fn archived_tasks(&self, list_id: &str) -> ServiceResult<Vec<ArchivedTask>> {
        Ok(self.tasks.archived(list_id)?)
    }

    // ---- order -------------------------------------------------------

    /// Replaces a list's order verbatim and derives its server order.
    ///
    /// With `sync`, the list's order patch is flushed to the queue.
    pub fn update_order(
        &mut self,
        list_id: &str,
        order: Vec<LocalId>,
        sync: bool,
    ) -> ServiceResult<()> {
        self.require_list(list_id)?;
        self.write_order(list_id, order, sync)
    }

    // ---- lists -------------------------------------------------------

    pub fn add_list(&mut self, mut draft: NewList) -> ServiceResult<TaskList> {
        draft.name = normalize_list_name(&draft.name);
        let id = self.lists.add(draft)?;
        self.get_list(&id)
            .ok_or_else(|| ServiceError::ListNotFound(id))
    }

    /// Returns a list with its consumer-facing name.
    pub fn get_list(&self, id: &str) -> Option<TaskList> {
        self.lists.find_by_local_id(id).map(present_list)
    }

    pub fn get_list_by_server_id(&self, server_id: &str) -> Option<TaskList> {
        self.lists.find_by_server_id(server_id).map(present_list)
    }

    /// Returns every list with its live open-task count.
    pub fn get_lists(&self) -> Vec<ListSummary> {
        let now = self.now();
        self.lists
            .iter()
            .map(|list| ListSummary {
                count: self
                    .tasks
                    .open_count(&list.id, self.deps.views.as_ref(), now),
                list: present_list(list),
            })
            .collect()
    }

    /// Updates list fields. A name carrying the reserved prefix loses it.
    pub fn update_list(&mut self, id: &str, mut patch: ListPatch) -> ServiceResult<TaskList> {
        if let Some(name) = patch.name.take() {
            patch.name = Some(normalize_list_name(&name));
        }
        self.lists
            .update(id, patch, true)?
            .map(|list| present_list(&list))
            .ok_or_else(|| ServiceError::ListNotFound(id.to_string()))
    }

    /// Deletes a list and, before it, every task it holds.
    pub fn delete_list(&mut self, id: &str) -> ServiceResult<()> {
        if is_system_list(id) {
            return Err(ServiceError::ProtectedList(id.to_string()));
        }
        self.require_list(id)?;

        let _hold = self.hold_events();
        let removed = self.tasks.delete_all_from_partition(id)?;
        self.lists.delete(id)?;
        info!(
            "event=delete_list module=service status=ok list={id} tasks_removed={}",
            removed.len()
        );
        Ok(())
    }

    // ---- inbound -----------------------------------------------------

    /// Binds the server id assigned to a created task and refreshes the
    /// server order of its list.
    pub fn acknowledge_task(
        &mut self,
        id: &str,
        server_id: ServerId,
        synced_at: EpochMs,
    ) -> ServiceResult<Task> {
        let _hold = self.hold_events();
        let task = self
            .tasks
            .mark_synced(id, server_id, synced_at)?
            .ok_or_else(|| ServiceError::TaskNotFound(id.to_string()))?;
        if self.lists.contains(&task.list) {
            let order = self.local_order(&task.list);
            self.write_order(&task.list, order, false)?;
        }
        Ok(task)
    }

    /// Binds the server id assigned to a created list.
    pub fn acknowledge_list(
        &mut self,
        id: &str,
        server_id: ServerId,
        synced_at: EpochMs,
    ) -> ServiceResult<TaskList> {
        self.lists
            .mark_synced(id, server_id, synced_at)?
            .map(|list| present_list(&list))
            .ok_or_else(|| ServiceError::ListNotFound(id.to_string()))
    }

    /// Applies partial task payloads to tasks of one list.
    ///
    /// Payloads for unknown server ids are skipped.
    pub fn apply_task_patches(
        &mut self,
        list_id: &str,
        items: Vec<RemoteTask>,
    ) -> ServiceResult<Vec<LocalId>> {
        self.require_list(list_id)?;
        Ok(self.tasks.patch_from_server(items, Some(list_id))?)
    }

    /// Applies partial list payloads. Unknown server ids are skipped.
    ///
    /// A payload carrying `order` rebuilds the local order from it.
    pub fn apply_list_patches(&mut self, items: Vec<RemoteList>) -> ServiceResult<Vec<LocalId>> {
        let _hold = self.hold_events();
        let orders: Vec<(String, Vec<String>)> = items
            .iter()
            .filter_map(|item| Some((item.id.clone(), item.order.clone()?)))
            .collect();
        let patched = self.lists.patch_from_server(items, None)?;

        for (server_id, server_order) in orders {
            let Some(list_id) = self
                .lists
                .find_by_server_id(&server_id)
                .map(|list| list.id.clone())
            else {
                continue;
            };
            let order = from_server_order(&server_order, &list_id, &self.tasks);
            self.write_order(&list_id, order, false)?;
        }
        Ok(patched)
    }

    /// Downloads and applies a full snapshot.
    pub fn on_token_acquired(&mut self) -> ServiceResult<SnapshotReport> {
        let snapshot = self.deps.snapshots.download_lists().map_err(|err| {
            warn!(
                "event=snapshot_download module=service status=error code={} retryable={}",
                err.code, err.retryable
            );
            ServiceError::Sync(err)
        })?;
        self.apply_snapshot(snapshot)
    }

    /// Seeds or refreshes local state from a snapshot, lists first.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> ServiceResult<SnapshotReport> {
        let _hold = self.hold_events();
        let mut report = SnapshotReport::default();
        for entry in snapshot.lists {
            self.apply_snapshot_list(entry, &mut report)?;
        }
        info!(
            "event=snapshot_apply module=service status=ok lists_added={} lists_patched={} tasks_added={} tasks_patched={}",
            report.lists_added, report.lists_patched, report.tasks_added, report.tasks_patched
        );
        Ok(report)
    }

    /// Lets the queues flush, only while a session is active.
    pub fn handle_process_request(&self) -> bool {
        if !self.deps.session.is_signed_in() {
            return false;
        }
        self.deps.list_queue.process();
        self.deps.task_queue.process();
        true
    }

    /// Writes both stores again.
    pub fn flush(&self) -> ServiceResult<()> {
        self.lists.save()?;
        self.tasks.save()?;
        Ok(())
    }

    pub fn task_store(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn list_store(&self) -> &ListStore {
        &self.lists
    }

    // ---- internals ---------------------------------------------------

    fn apply_snapshot_list(
        &mut self,
        entry: SnapshotList,
        report: &mut SnapshotReport,
    ) -> ServiceResult<()> {
        let SnapshotList { list: remote, tasks } = entry;
        let server_order = remote.order.clone().unwrap_or_default();

        let list_id = match self.match_remote_list(&remote)? {
            Some(local_id) => {
                self.lists.patch_from_server(vec![remote], None)?;
                report.lists_patched += 1;
                local_id
            }
            None => {
                let Some(local_id) = self.lists.add_from_server(vec![remote], None)?.pop() else {
                    return Ok(());
                };
                report.lists_added += 1;
                local_id
            }
        };

        // A known task may arrive under a list that is new locally.
        let (existing, fresh): (Vec<RemoteTask>, Vec<RemoteTask>) = tasks
            .into_iter()
            .partition(|task| self.tasks.find_by_server_id(&task.id).is_some());

        for remote_task in &existing {
            self.adopt_into_list(&remote_task.id, &list_id)?;
        }
        report.tasks_patched += self
            .tasks
            .patch_from_server(existing, Some(list_id.as_str()))?
            .len();
        report.tasks_added += self.tasks.add_from_server(fresh, Some(list_id.as_str()))?.len();

        let order = from_server_order(&server_order, &list_id, &self.tasks);
        self.write_order(&list_id, order, false)
    }

    /// Finds the local list a server list refers to, binding system lists
    /// by their reserved name on first contact.
    fn match_remote_list(&mut self, remote: &RemoteList) -> ServiceResult<Option<LocalId>> {
        if let Some(list) = self.lists.find_by_server_id(&remote.id) {
            return Ok(Some(list.id.clone()));
        }
        let Some(system) = remote
            .name
            .as_deref()
            .filter(|name| name.starts_with(RESERVED_NAME_PREFIX))
            .and_then(|name| SystemList::from_id(strip_reserved_prefix(name)))
        else {
            return Ok(None);
        };
        let bindable = self
            .lists
            .find_by_local_id(system.id())
            .is_some_and(|list| list.server_id.is_none());
        if !bindable {
            return Ok(None);
        }
        let synced_at = remote.updated_at.unwrap_or_else(|| self.now());
        self.lists
            .mark_synced(system.id(), remote.id.clone(), synced_at)?;
        Ok(Some(system.id().to_string()))
    }

    /// Moves a server-known task into `list_id` when the server placed it
    /// there, keeping the source list's order coherent.
    fn adopt_into_list(&mut self, server_id: &str, list_id: &str) -> ServiceResult<()> {
        let Some(task) = self.tasks.find_by_server_id(server_id) else {
            return Ok(());
        };
        if task.list == list_id {
            return Ok(());
        }
        let (task_id, source) = (task.id.clone(), task.list.clone());
        let patch = TaskPatch {
            list: Some(list_id.to_string()),
            ..TaskPatch::default()
        };
        self.tasks.update(&task_id, patch, false)?;
        if self.lists.contains(&source) {
            let order = without(self.local_order(&source), &task_id);
            self.write_order(&source, order, false)?;
        }
        Ok(())
    }

    fn write_order(&mut self, list_id: &str, order: Vec<LocalId>, sync: bool) -> ServiceResult<()> {
        let server_order = to_server_order(&order, &self.tasks);
        if !self.lists.write_order(list_id, order, server_order)? {
            return Err(ServiceError::ListNotFound(list_id.to_string()));
        }
        if sync {
            self.deps.list_queue.patch(list_id);
        }
        Ok(())
    }

    fn local_order(&self, list_id: &str) -> Vec<LocalId> {
        self.lists
            .find_by_local_id(list_id)
            .map(|list| list.local_order.clone())
            .unwrap_or_default()
    }

    fn require_task(&self, id: &str) -> ServiceResult<&Task> {
        self.tasks
            .find_by_local_id(id)
            .ok_or_else(|| ServiceError::TaskNotFound(id.to_string()))
    }

    fn require_list(&self, id: &str) -> ServiceResult<&TaskList> {
        self.lists
            .find_by_local_id(id)
            .ok_or_else(|| ServiceError::ListNotFound(id.to_string()))
    }

    fn hold_events(&self) -> (EventHold, EventHold) {
        (self.tasks.emitter().hold(), self.lists.emitter().hold())
    }

    fn now(&self) -> EpochMs {
        self.deps.clock.now_ms()
    }
}

impl ChangeNotifier for ReconcileService {
    fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }
}

fn present_list(list: &TaskList) -> TaskList {
    let mut presented = list.clone();
    presented.name = list.display_name().to_string();
    presented
}

/// Collapses whitespace and strips the reserved prefix.
fn normalize_list_name(name: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(name.trim(), " ");
    strip_reserved_prefix(&collapsed).to_string()
}
