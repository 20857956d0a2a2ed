//! Per-protocol connection counters, exposed as structured log fields on
//! accept/close rather than wired to a metrics endpoint. No metrics
//! surface is exported here, but every accept loop still tracks
//! current/total/errors the way a production listener does.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct ConnectionCount {
    current: AtomicUsize,
    total: AtomicUsize,
    errors: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionSnapshot {
    pub current: usize,
    pub total: usize,
    pub errors: usize,
}

impl ConnectionCount {
    pub fn increment(&self) {
        self.current.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
            .ok();
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            current: self.current.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
