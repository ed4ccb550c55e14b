use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free aggregator counters.
#[derive(Debug, Default)]
pub struct AggregatorStats {
    received: AtomicU64,
    rows_flushed: AtomicU64,
    flushes: AtomicU64,
    failed_groups: AtomicU64,
}

/// Point-in-time copy of [`AggregatorStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    /// Rows handed to the writer, including those in failed groups.
    pub rows_flushed: u64,
    /// Flush calls, including empty ones.
    pub flushes: u64,
    pub failed_groups: u64,
}

impl AggregatorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, rows: usize, failed_groups: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.rows_flushed.fetch_add(rows as u64, Ordering::Relaxed);
        self.failed_groups
            .fetch_add(failed_groups as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rows_flushed: self.rows_flushed.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            failed_groups: self.failed_groups.load(Ordering::Relaxed),
        }
    }
}
