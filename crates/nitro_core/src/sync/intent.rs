//! Outbound mutation intents and the queue contract.

use crate::model::LocalId;
use log::debug;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Operation requested from the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncVerb {
    Post,
    Patch,
    Delete,
    Archive,
}

impl SyncVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Archive => "archive",
        }
    }
}

/// Composite key of an intent: optional parent plus one or more ids.
///
/// Tasks are keyed by `(list, task)`, lists by their own id, archive
/// intents by `(list, [server ids])`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntentKey {
    pub parent: Option<LocalId>,
    pub ids: Vec<String>,
}

impl IntentKey {
    pub fn child(parent: impl Into<LocalId>, id: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ids: vec![id.into()],
        }
    }

    pub fn root(id: impl Into<String>) -> Self {
        Self {
            parent: None,
            ids: vec![id.into()],
        }
    }

    pub fn batch(parent: impl Into<LocalId>, ids: Vec<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ids,
        }
    }
}

impl Display for IntentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{parent}/")?;
        }
        write!(f, "{}", self.ids.join(","))
    }
}

/// One queued instruction destined for the remote system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundIntent {
    pub key: IntentKey,
    pub verb: SyncVerb,
}

/// Outbound mutation queue.
///
/// Implementations own batching, retry and per-key ordering.
pub trait OutboundQueue: Send + Sync {
    /// Records one intent.
    fn add_to_queue(&self, key: IntentKey, verb: SyncVerb);
    /// Forces the pending order patch of one resource to flush.
    fn patch(&self, resource_id: &str);
    /// Dispatches pending intents. Only called while a session is active.
    fn process(&self);
}

#[derive(Debug, Default)]
struct QueueState {
    pending: Vec<OutboundIntent>,
    dispatched: Vec<OutboundIntent>,
    order_patches: Vec<String>,
    process_calls: usize,
}

/// In-process queue that records intents instead of sending them.
#[derive(Debug, Default)]
pub struct MemoryOutboundQueue {
    state: Mutex<QueueState>,
}

impl MemoryOutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intents recorded and not yet processed, in append order.
    pub fn pending(&self) -> Vec<OutboundIntent> {
        self.state().pending.clone()
    }

    /// Intents moved out by `process`.
    pub fn dispatched(&self) -> Vec<OutboundIntent> {
        self.state().dispatched.clone()
    }

    /// Resource ids whose order patch was force-flushed.
    pub fn order_patches(&self) -> Vec<String> {
        self.state().order_patches.clone()
    }

    pub fn process_calls(&self) -> usize {
        self.state().process_calls
    }

    /// Removes and returns pending intents.
    pub fn drain(&self) -> Vec<OutboundIntent> {
        std::mem::take(&mut self.state().pending)
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutboundQueue for MemoryOutboundQueue {
    fn add_to_queue(&self, key: IntentKey, verb: SyncVerb) {
        debug!(
            "event=queue_add module=sync status=ok verb={} key={}",
            verb.as_str(),
            key
        );
        self.state().pending.push(OutboundIntent { key, verb });
    }

    fn patch(&self, resource_id: &str) {
        self.state().order_patches.push(resource_id.to_string());
    }

    fn process(&self) {
        let mut state = self.state();
        state.process_calls += 1;
        let pending = std::mem::take(&mut state.pending);
        state.dispatched.extend(pending);
    }
}
