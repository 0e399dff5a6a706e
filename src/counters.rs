use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running tally of completed uploads.
///
/// Every upload invocation ends in exactly one call to either
/// [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure). The counts are never reset.
#[derive(Debug, Default)]
pub struct ProcessedCounters {
    success: AtomicU64,
    fail: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessedSnapshot {
    pub success: u64,
    pub fail: u64,
}

impl ProcessedSnapshot {
    pub fn total(&self) -> u64 {
        self.success + self.fail
    }
}

impl ProcessedCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.fail.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProcessedSnapshot {
        ProcessedSnapshot {
            success: self.success.load(Ordering::Relaxed),
            fail: self.fail.load(Ordering::Relaxed),
        }
    }
}
