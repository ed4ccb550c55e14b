use std::time::Duration;

use tokio::time::Instant;

use crate::row::Row;

/// Upper bound on rows preallocated per window.
const MAX_PREALLOC: usize = 4096;

/// Rows awaiting the next flush, plus the start of the current window.
pub struct BatchBuffer {
    rows: Vec<Row>,
    batch: usize,
    period: Duration,
    window_start: Instant,
}

impl BatchBuffer {
    pub fn new(batch: usize, period: Duration) -> Self {
        Self {
            rows: Vec::with_capacity(batch.min(MAX_PREALLOC)),
            batch,
            period,
            window_start: Instant::now(),
        }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Count trigger.
    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.batch
    }

    /// Instant at which the elapsed-time trigger fires.
    pub fn deadline(&self) -> Instant {
        self.window_start + self.period
    }

    /// Elapsed-time trigger.
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline()
    }

    /// Takes the buffered rows. The window is left as is.
    pub fn take(&mut self) -> Vec<Row> {
        std::mem::replace(&mut self.rows, Vec::with_capacity(self.batch.min(MAX_PREALLOC)))
    }

    /// Starts a new window at the current instant.
    pub fn reset_window(&mut self) {
        self.window_start = Instant::now();
    }
}
