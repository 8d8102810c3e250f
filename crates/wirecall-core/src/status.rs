//! Sink for the last observed HTTP status code.

use std::sync::atomic::{AtomicU16, Ordering};

/// Receives the status code of every response that arrives.
pub trait StatusSink: Send + Sync {
    fn record_status(&self, status: u16);
}

/// Keeps only the most recent status code.
#[derive(Debug, Default)]
pub struct PageStatus {
    // 0 until the first response arrives
    last: AtomicU16,
}

impl PageStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded status, if any response has arrived yet.
    pub fn status(&self) -> Option<u16> {
        match self.last.load(Ordering::SeqCst) {
            0 => None,
            status => Some(status),
        }
    }
}

impl StatusSink for PageStatus {
    fn record_status(&self, status: u16) {
        self.last.store(status, Ordering::SeqCst);
    }
}
