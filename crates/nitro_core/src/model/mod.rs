//! Domain records for tasks and lists.
//!
//! # Responsibility
//! - Define the fixed-schema records persisted by the entity stores.
//! - Define the partial-update shapes used by local edits and server patches.
//!
//! # Invariants
//! - `id` (local id) is generated client-side and never changes.
//! - `server_id` stays `None` until the server accepted the entity, then is
//!   set exactly once.
//! - Dates are Unix epoch milliseconds.

pub mod list;
pub mod serde_ext;
pub mod task;

/// Client-generated primary key used by every in-core operation.
pub type LocalId = String;

/// Identifier assigned by the remote system once an entity is accepted.
pub type ServerId = String;

/// Unix epoch milliseconds.
pub type EpochMs = i64;
