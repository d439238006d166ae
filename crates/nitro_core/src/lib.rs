//! Core domain logic for Nitro task lists.
//! This crate is the single source of truth for list and task invariants.

pub mod clock;
pub mod config;
pub mod context;
pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod service;
pub mod storage;
pub mod store;
pub mod sync;
pub mod view;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::CoreConfig;
pub use context::{AppContext, Collaborators, ContextError, ContextResult};
pub use events::{ChangeEvent, ChangeNotifier, ChangeSource, EventEmitter, SubscriptionId};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::list::{ListPatch, ListSummary, NewList, RemoteList, SystemList, TaskList};
pub use model::task::{ArchivedTask, NewTask, RemoteTask, Task, TaskPatch, TaskType};
pub use model::{EpochMs, LocalId, ServerId};
pub use service::reconcile_service::{
    ListTasks, ReconcileService, ServiceDeps, ServiceError, ServiceResult, SnapshotReport,
};
pub use storage::{KeyValueStorage, MemoryStorage, SqliteStorage, StorageError};
pub use store::{ArchiveOutcome, ListStore, StoreError, TaskStore};
pub use sync::{
    MemoryOutboundQueue, OutboundQueue, SessionFlag, SessionStore, Snapshot, SnapshotList,
    SnapshotSource, StaticSnapshotSource, SyncError, SyncVerb,
};
pub use view::{DateViews, DerivedViews};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
