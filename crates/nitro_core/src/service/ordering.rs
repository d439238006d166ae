//! Order sequence helpers.
//!
//! # Invariants
//! - Helpers never reorder ids they keep; they only add, drop or translate.

use crate::model::{LocalId, ServerId};
use crate::store::TaskStore;
use std::collections::HashSet;

/// Translates local ids to server ids, dropping tasks the server does not
/// know yet (and ids with no live task).
pub fn to_server_order(local_order: &[LocalId], tasks: &TaskStore) -> Vec<ServerId> {
    local_order
        .iter()
        .filter_map(|id| tasks.find_by_local_id(id))
        .filter_map(|task| task.server_id.clone())
        .collect()
}

/// Whether a stored order is not a permutation of live membership.
///
/// A length mismatch is the primary signal; a repeated id or an id outside
/// the membership (with equal length) is treated the same way.
pub fn needs_heal(order: &[LocalId], members: &[LocalId]) -> bool {
    if order.len() != members.len() {
        return true;
    }
    let live: HashSet<&str> = members.iter().map(String::as_str).collect();
    let mut seen = HashSet::with_capacity(order.len());
    order
        .iter()
        .any(|id| !live.contains(id.as_str()) || !seen.insert(id.as_str()))
}

/// Puts `id` first, removing any earlier occurrence.
pub fn prepend(mut order: Vec<LocalId>, id: &str) -> Vec<LocalId> {
    order.retain(|existing| existing != id);
    order.insert(0, id.to_string());
    order
}

/// Drops every occurrence of `id`.
pub fn without(mut order: Vec<LocalId>, id: &str) -> Vec<LocalId> {
    order.retain(|existing| existing != id);
    order
}

/// Drops every id contained in `ids`.
pub fn without_all(mut order: Vec<LocalId>, ids: &[LocalId]) -> Vec<LocalId> {
    let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
    order.retain(|existing| !doomed.contains(existing.as_str()));
    order
}

/// Builds a local order from a server order: server ids are mapped back to
/// members of `list_id`, unresolved ids are dropped, then members missing
/// from the server order follow in store order.
pub fn from_server_order(server_order: &[ServerId], list_id: &str, tasks: &TaskStore) -> Vec<LocalId> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for server_id in server_order {
        let Some(task) = tasks.find_by_server_id(server_id) else {
            continue;
        };
        if task.list == list_id && seen.insert(task.id.clone()) {
            order.push(task.id.clone());
        }
    }
    for task in tasks.iter().filter(|task| task.list == list_id) {
        if seen.insert(task.id.clone()) {
            order.push(task.id.clone());
        }
    }
    order
}
