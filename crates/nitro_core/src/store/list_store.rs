//! List-specific store operations: system list seeding and order writes.

use super::{EntityStore, StoreResult};
use crate::events::ChangeEvent;
use crate::model::list::{SystemList, TaskList};
use crate::model::{LocalId, ServerId};

/// List store.
pub type ListStore = EntityStore<TaskList>;

impl EntityStore<TaskList> {
    /// Inserts any missing system list. Returns how many were created.
    pub fn seed_system_lists(&mut self) -> StoreResult<usize> {
        self.seed(SystemList::ALL.into_iter().map(TaskList::system))
    }

    /// Replaces both order sequences of a list, persists and emits `order`.
    ///
    /// Returns `false` when the list does not exist.
    pub fn write_order(
        &mut self,
        list_id: &str,
        local_order: Vec<LocalId>,
        order: Vec<ServerId>,
    ) -> StoreResult<bool> {
        let Some(list) = self.entries.get_mut(list_id) else {
            return Ok(false);
        };
        list.local_order = local_order;
        list.order = order;

        self.save()?;
        self.emitter.emit(ChangeEvent::Order {
            list_id: list_id.to_string(),
        });
        Ok(true)
    }
}
