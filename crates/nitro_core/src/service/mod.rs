//! Use-case layer over the entity stores.
//!
//! # Responsibility
//! - Single entry point for every task/list mutation and query.
//! - Keep store writes, order updates and outbound intents in step.

pub mod magic_list;
pub mod ordering;
pub mod reconcile_service;
