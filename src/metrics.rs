use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Operational counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub entries_created: Arc<AtomicU64>,
    pub entries_updated: Arc<AtomicU64>,
    pub entries_deleted: Arc<AtomicU64>,
    pub stock_adjustments: Arc<AtomicU64>,
    pub exports_generated: Arc<AtomicU64>,
    pub logins_succeeded: Arc<AtomicU64>,
    pub logins_failed: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            entries_created: Arc::new(AtomicU64::new(0)),
            entries_updated: Arc::new(AtomicU64::new(0)),
            entries_deleted: Arc::new(AtomicU64::new(0)),
            stock_adjustments: Arc::new(AtomicU64::new(0)),
            exports_generated: Arc::new(AtomicU64::new(0)),
            logins_succeeded: Arc::new(AtomicU64::new(0)),
            logins_failed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_entries_created(&self) {
        self.entries_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_entries_updated(&self) {
        self.entries_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_entries_deleted(&self) {
        self.entries_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_stock_adjustments(&self, count: u64) {
        self.stock_adjustments.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_exports(&self) {
        self.exports_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_login(&self, success: bool) {
        if success {
            self.logins_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.logins_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries_created: self.entries_created.load(Ordering::Relaxed),
            entries_updated: self.entries_updated.load(Ordering::Relaxed),
            entries_deleted: self.entries_deleted.load(Ordering::Relaxed),
            stock_adjustments: self.stock_adjustments.load(Ordering::Relaxed),
            exports_generated: self.exports_generated.load(Ordering::Relaxed),
            logins_succeeded: self.logins_succeeded.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub entries_created: u64,
    pub entries_updated: u64,
    pub entries_deleted: u64,
    pub stock_adjustments: u64,
    pub exports_generated: u64,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub uptime_seconds: u64,
}
