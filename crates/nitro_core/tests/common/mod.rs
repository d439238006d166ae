#![allow(dead_code)]

use nitro_core::{
    AppContext, Collaborators, DateViews, FixedClock, MemoryOutboundQueue, MemoryStorage,
    ReconcileService, SessionFlag, StaticSnapshotSource,
};
use std::sync::Arc;

/// 2023-11-14T22:13:20Z
pub const NOW: i64 = 1_700_000_000_000;

pub struct Harness {
    pub context: AppContext,
    pub list_queue: Arc<MemoryOutboundQueue>,
    pub task_queue: Arc<MemoryOutboundQueue>,
    pub session: Arc<SessionFlag>,
    pub snapshots: Arc<StaticSnapshotSource>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        let list_queue = Arc::new(MemoryOutboundQueue::new());
        let task_queue = Arc::new(MemoryOutboundQueue::new());
        let session = Arc::new(SessionFlag::new(false));
        let snapshots = Arc::new(StaticSnapshotSource::unavailable());
        let clock = Arc::new(FixedClock::new(NOW));

        let collaborators = Collaborators {
            list_queue: list_queue.clone(),
            task_queue: task_queue.clone(),
            session: session.clone(),
            snapshots: snapshots.clone(),
            views: Arc::new(DateViews),
            clock: clock.clone(),
        };
        let context =
            AppContext::with_storage(Arc::new(MemoryStorage::new()), collaborators).unwrap();

        Self {
            context,
            list_queue,
            task_queue,
            session,
            snapshots,
            clock,
        }
    }

    pub fn service(&mut self) -> &mut ReconcileService {
        self.context.service_mut()
    }

    pub fn order_of(&mut self, list_id: &str) -> Vec<String> {
        self.service().get_tasks(list_id).unwrap().order
    }
}
