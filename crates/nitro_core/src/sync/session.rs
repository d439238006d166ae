//! Session state consumed by the façade.

use std::sync::atomic::{AtomicBool, Ordering};

/// Authentication/session query.
pub trait SessionStore: Send + Sync {
    fn is_signed_in(&self) -> bool;
}

/// Session backed by a single flag.
#[derive(Debug, Default)]
pub struct SessionFlag {
    signed_in: AtomicBool,
}

impl SessionFlag {
    pub fn new(signed_in: bool) -> Self {
        Self {
            signed_in: AtomicBool::new(signed_in),
        }
    }

    pub fn set_signed_in(&self, signed_in: bool) {
        self.signed_in.store(signed_in, Ordering::SeqCst);
    }
}

impl SessionStore for SessionFlag {
    fn is_signed_in(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }
}
