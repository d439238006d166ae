//! Derived views backing the virtual lists.
//!
//! # Responsibility
//! - Compute the members of `today`, `next` and `all` from live tasks.
//!
//! # Invariants
//! - Views never mutate tasks; they return copies.
//! - Archived tasks never appear in a view.

use crate::model::list::VirtualList;
use crate::model::task::{Task, TaskType};
use crate::model::EpochMs;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Resolver for virtual list membership.
pub trait DerivedViews: Send + Sync {
    fn resolve(&self, view: VirtualList, tasks: &[&Task], now: EpochMs) -> Vec<Task>;
}

/// Date-driven views using UTC day boundaries.
///
/// - `today`: dated tasks due by the end of the current day, oldest first.
/// - `next`: tasks tagged `next`.
/// - `all`: every task.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateViews;

impl DerivedViews for DateViews {
    fn resolve(&self, view: VirtualList, tasks: &[&Task], now: EpochMs) -> Vec<Task> {
        let visible = tasks.iter().filter(|task| task.kind != TaskType::Archived);
        match view {
            VirtualList::Today => {
                let cutoff = end_of_day(now);
                let mut due: Vec<Task> = visible
                    .filter(|task| task.date.is_some_and(|date| date <= cutoff))
                    .map(|task| (*task).clone())
                    .collect();
                due.sort_by_key(|task| task.date);
                due
            }
            VirtualList::Next => visible
                .filter(|task| task.kind == TaskType::Next)
                .map(|task| (*task).clone())
                .collect(),
            VirtualList::All => visible.map(|task| (*task).clone()).collect(),
        }
    }
}

fn end_of_day(now: EpochMs) -> EpochMs {
    now - now.rem_euclid(DAY_MS) + DAY_MS - 1
}
