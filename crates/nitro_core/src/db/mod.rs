//! Schema bootstrap behind [`crate::storage::SqliteStorage`].
//!
//! Connections handed out here are migrated; failures surface as
//! [`crate::storage::StorageError`].

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
