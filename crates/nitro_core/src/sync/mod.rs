//! Contracts for the collaborators that talk to the remote system.
//!
//! # Responsibility
//! - Describe outbound intents handed to the mutation queue.
//! - Describe the snapshot download and session queries.
//!
//! # Invariants
//! - Core never performs or retries network calls itself; it only hands
//!   intents to the queue and applies what the downloader returns.

pub mod intent;
pub mod session;
pub mod snapshot;

pub use intent::{IntentKey, MemoryOutboundQueue, OutboundIntent, OutboundQueue, SyncVerb};
pub use session::{SessionFlag, SessionStore};
pub use snapshot::{Snapshot, SnapshotList, SnapshotSource, StaticSnapshotSource, SyncError, SyncResult};
