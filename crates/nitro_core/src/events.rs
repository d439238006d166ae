//! Change notification fan-out.
//!
//! # Responsibility
//! - Hold an explicit observer list per store (composition, no mixin).
//! - Support holding notifications until a multi-step operation completes.
//!
//! # Invariants
//! - Listeners are invoked without the registry lock held, so a listener may
//!   subscribe, unsubscribe or emit on another emitter.
//! - While held, events are queued in emission order and flushed once the
//!   last hold is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Invalidation signal. Consumers re-query instead of trusting payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Store contents changed, optionally scoped to one partition.
    Update {
        source: ChangeSource,
        partition: Option<String>,
    },
    /// One entity changed.
    EntityUpdated {
        source: ChangeSource,
        id: String,
    },
    /// A list's order changed.
    Order { list_id: String },
}

/// Store that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    Tasks,
    Lists,
}

/// Handle returned by [`EventEmitter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct EmitterState {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    hold_depth: usize,
    pending: Vec<ChangeEvent>,
}

/// Capability shared by everything that broadcasts change events.
pub trait ChangeNotifier {
    fn emitter(&self) -> &EventEmitter;

    fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.emitter().subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.emitter().unsubscribe(id)
    }
}

/// Cloneable observer list. Clones share listeners.
#[derive(Clone, Default)]
pub struct EventEmitter {
    state: Arc<Mutex<EmitterState>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(existing, _)| *existing != id);
        state.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Broadcasts `event`, or queues it while a hold is active.
    pub fn emit(&self, event: ChangeEvent) {
        let listeners = {
            let mut state = self.lock();
            if state.hold_depth > 0 {
                state.pending.push(event);
                return;
            }
            snapshot_listeners(&state)
        };
        for listener in listeners {
            listener(&event);
        }
    }

    /// Queues events until the returned guard is dropped.
    pub fn hold(&self) -> EventHold {
        self.lock().hold_depth += 1;
        EventHold {
            emitter: self.clone(),
        }
    }

    fn release(&self) {
        let (events, listeners) = {
            let mut state = self.lock();
            state.hold_depth = state.hold_depth.saturating_sub(1);
            if state.hold_depth > 0 || state.pending.is_empty() {
                return;
            }
            let events = std::mem::take(&mut state.pending);
            (events, snapshot_listeners(&state))
        };
        for event in &events {
            for listener in &listeners {
                listener(event);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, EmitterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn snapshot_listeners(state: &EmitterState) -> Vec<Listener> {
    state
        .listeners
        .iter()
        .map(|(_, listener)| Arc::clone(listener))
        .collect()
}

/// Releases a hold on drop, flushing queued events.
#[must_use = "events are flushed when the hold is dropped"]
pub struct EventHold {
    emitter: EventEmitter,
}

impl Drop for EventHold {
    fn drop(&mut self) {
        self.emitter.release();
    }
}
