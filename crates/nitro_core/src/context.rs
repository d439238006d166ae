//! Application context: storage, stores and façade wired together.
//!
//! # Responsibility
//! - Open storage from [`CoreConfig`] and start logging when configured.
//! - Load both stores and seed the system lists before first use.
//!
//! # Invariants
//! - Lists are loaded and seeded before tasks, so every loaded task can
//!   resolve its list on first read.

use crate::clock::{Clock, SystemClock};
use crate::config::CoreConfig;
use crate::logging::init_logging;
use crate::service::reconcile_service::{ReconcileService, ServiceDeps, ServiceError};
use crate::storage::{KeyValueStorage, SqliteStorage, StorageError};
use crate::store::{ListStore, StoreError, TaskStore};
use crate::sync::{
    MemoryOutboundQueue, OutboundQueue, SessionFlag, SessionStore, SnapshotSource,
    StaticSnapshotSource,
};
use crate::view::{DateViews, DerivedViews};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type ContextResult<T> = Result<T, ContextError>;

#[derive(Debug)]
pub enum ContextError {
    /// Logger bootstrap rejected the configuration.
    Logging(String),
    Storage(StorageError),
    Store(StoreError),
    Service(ServiceError),
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(message) => write!(f, "logging init failed: {message}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(_) => None,
            Self::Storage(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Service(err) => Some(err),
        }
    }
}

impl From<StorageError> for ContextError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<StoreError> for ContextError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ServiceError> for ContextError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

/// External collaborators handed to the façade.
#[derive(Clone)]
pub struct Collaborators {
    pub list_queue: Arc<dyn OutboundQueue>,
    pub task_queue: Arc<dyn OutboundQueue>,
    pub session: Arc<dyn SessionStore>,
    pub snapshots: Arc<dyn SnapshotSource>,
    pub views: Arc<dyn DerivedViews>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Signed-out wiring: in-memory queues, no snapshot source, wall clock.
    pub fn offline() -> Self {
        Self {
            list_queue: Arc::new(MemoryOutboundQueue::new()),
            task_queue: Arc::new(MemoryOutboundQueue::new()),
            session: Arc::new(SessionFlag::new(false)),
            snapshots: Arc::new(StaticSnapshotSource::unavailable()),
            views: Arc::new(DateViews),
            clock: Arc::new(SystemClock),
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::offline()
    }
}

pub struct AppContext {
    service: ReconcileService,
}

impl AppContext {
    /// Opens storage described by `config` and builds the façade.
    pub fn open(config: &CoreConfig, collaborators: Collaborators) -> ContextResult<Self> {
        if let Some(log_dir) = &config.log_dir {
            init_logging(&config.log_level, log_dir).map_err(ContextError::Logging)?;
        }

        let storage: Arc<dyn KeyValueStorage> = match &config.db_path {
            Some(path) => Arc::new(SqliteStorage::open(path)?),
            None => Arc::new(SqliteStorage::open_in_memory()?),
        };
        Self::with_storage(storage, collaborators)
    }

    /// Builds the façade over an existing storage backend.
    pub fn with_storage(
        storage: Arc<dyn KeyValueStorage>,
        collaborators: Collaborators,
    ) -> ContextResult<Self> {
        let mut lists = ListStore::new(Arc::clone(&storage), collaborators.list_queue.clone());
        let lists_found = lists.load()?;
        let seeded = lists.seed_system_lists()?;

        let mut tasks = TaskStore::new(storage, collaborators.task_queue.clone());
        let tasks_found = tasks.load()?;

        info!(
            "event=context_open module=context status=ok lists={} tasks={} seeded={seeded} restored={}",
            lists.len(),
            tasks.len(),
            lists_found || tasks_found
        );

        let deps = ServiceDeps {
            list_queue: collaborators.list_queue,
            task_queue: collaborators.task_queue,
            session: collaborators.session,
            snapshots: collaborators.snapshots,
            views: collaborators.views,
            clock: collaborators.clock,
        };
        Ok(Self {
            service: ReconcileService::new(tasks, lists, deps),
        })
    }

    pub fn service(&self) -> &ReconcileService {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut ReconcileService {
        &mut self.service
    }

    /// Writes both stores one last time and releases storage.
    pub fn close(self) -> ContextResult<()> {
        self.service.flush()?;
        info!("event=context_close module=context status=ok");
        Ok(())
    }
}
