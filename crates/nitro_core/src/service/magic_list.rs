//! Creation rules for virtual list targets.
//!
//! Tasks are never stored under a virtual list: the target is rewritten to
//! the default list and the view membership is expressed through the task
//! itself (a date for `today`, the `next` tag for `next`).

use crate::model::list::{VirtualList, DEFAULT_LIST_ID};
use crate::model::task::{NewTask, TaskPatch, TaskType};
use crate::model::EpochMs;

/// Offset placing a `today` task before other tasks of the same day.
const TODAY_OFFSET_MS: i64 = 1_000;

/// Rewrite derived from a virtual target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualRewrite {
    pub list: &'static str,
    pub date: Option<EpochMs>,
    pub kind: Option<TaskType>,
}

/// Returns the rewrite for `target`, or `None` when it is a real list.
pub fn rewrite_for(target: &str, now: EpochMs) -> Option<VirtualRewrite> {
    let view = VirtualList::from_id(target)?;
    let rewrite = match view {
        VirtualList::Today => VirtualRewrite {
            list: DEFAULT_LIST_ID,
            date: Some(now - TODAY_OFFSET_MS),
            kind: None,
        },
        VirtualList::Next => VirtualRewrite {
            list: DEFAULT_LIST_ID,
            date: None,
            kind: Some(TaskType::Next),
        },
        VirtualList::All => VirtualRewrite {
            list: DEFAULT_LIST_ID,
            date: None,
            kind: None,
        },
    };
    Some(rewrite)
}

/// Rewrites a creation draft in place.
pub fn rewrite_draft(draft: &mut NewTask, now: EpochMs) {
    let Some(rewrite) = rewrite_for(&draft.list, now) else {
        return;
    };
    draft.list = rewrite.list.to_string();
    if rewrite.date.is_some() {
        draft.date = rewrite.date;
    }
    if let Some(kind) = rewrite.kind {
        draft.kind = kind;
    }
}

/// Rewrites the target of a move in place.
pub fn rewrite_patch(patch: &mut TaskPatch, now: EpochMs) {
    let Some(target) = patch.list.as_deref() else {
        return;
    };
    let Some(rewrite) = rewrite_for(target, now) else {
        return;
    };
    patch.list = Some(rewrite.list.to_string());
    if rewrite.date.is_some() {
        patch.date = Some(rewrite.date);
    }
    if let Some(kind) = rewrite.kind {
        patch.kind = Some(kind);
    }
}
