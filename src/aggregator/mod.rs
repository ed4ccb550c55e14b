//! Single-consumer batching of ingestion records.
//!
//! Producers push [`IngestionRecord`]s into a bounded queue. One task drains
//! the queue, turns each record into a [`Row`](crate::row::Row) and flushes
//! the buffer through the [`BatchWriter`] when it reaches the batch size or
//! when the period has elapsed, whichever comes first. An idle queue still
//! gets an (empty) flush once per period.

mod buffer;
mod stats;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::extract::Extractor;
use crate::partition::PartitionManager;
use crate::record::IngestionRecord;
use crate::store::Store;
use crate::writer::BatchWriter;

pub use self::buffer::BatchBuffer;
pub use self::stats::{AggregatorStats, StatsSnapshot};

/// Batching parameters.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    /// Flush once this many rows are buffered.
    pub batch: usize,
    /// Flush at least this often.
    pub period: Duration,
    /// Bound of the input queue; producers wait when it is full.
    pub queue_capacity: usize,
}

/// Batching engine with a single lifecycle: `start` once, `stop` once.
pub struct Aggregator<S: Store> {
    settings: AggregatorSettings,
    extractor: Option<Extractor>,
    writer: Option<BatchWriter<S>>,
    partitions: Option<PartitionManager<S>>,

    tx: Option<mpsc::Sender<IngestionRecord>>,
    rx: Option<mpsc::Receiver<IngestionRecord>>,

    /// Fired by `stop` to close the queue and drain it.
    closing: CancellationToken,
    /// Stops the partition manager.
    partitions_cancel: CancellationToken,

    run_task: Option<JoinHandle<()>>,
    partition_task: Option<JoinHandle<()>>,
    stats: Arc<AggregatorStats>,
}

impl<S: Store> Aggregator<S> {
    pub fn new(
        settings: AggregatorSettings,
        extractor: Extractor,
        writer: BatchWriter<S>,
        partitions: PartitionManager<S>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));

        Self {
            settings,
            extractor: Some(extractor),
            writer: Some(writer),
            partitions: Some(partitions),
            tx: Some(tx),
            rx: Some(rx),
            closing: CancellationToken::new(),
            partitions_cancel: CancellationToken::new(),
            run_task: None,
            partition_task: None,
            stats: Arc::new(AggregatorStats::new()),
        }
    }

    /// Producer handle for the input queue.
    ///
    /// Returns `None` once the aggregator has been stopped.
    pub fn sender(&self) -> Option<mpsc::Sender<IngestionRecord>> {
        self.tx.clone()
    }

    pub fn stats(&self) -> Arc<AggregatorStats> {
        Arc::clone(&self.stats)
    }

    /// Spawns the consuming task and the partition manager. Does not wait
    /// for either.
    pub fn start(&mut self) -> Result<()> {
        let (Some(rx), Some(extractor), Some(writer), Some(partitions)) = (
            self.rx.take(),
            self.extractor.take(),
            self.writer.take(),
            self.partitions.take(),
        ) else {
            bail!("aggregator already started");
        };

        let consumer = Consumer {
            rx,
            extractor,
            writer,
            buffer: BatchBuffer::new(self.settings.batch, self.settings.period),
            stats: Arc::clone(&self.stats),
        };
        self.run_task = Some(tokio::spawn(consumer.run(self.closing.clone())));
        self.partition_task = Some(tokio::spawn(partitions.run(self.partitions_cancel.clone())));

        info!(
            batch = self.settings.batch,
            period = ?self.settings.period,
            queue_capacity = self.settings.queue_capacity,
            "aggregator started"
        );

        Ok(())
    }

    /// Closes the queue and waits until every queued record has been
    /// flushed, then stops the partition manager.
    pub async fn stop(&mut self) {
        info!("stopping aggregator");

        self.tx.take();
        self.closing.cancel();

        if let Some(run_task) = self.run_task.take() {
            if let Err(e) = run_task.await {
                warn!(error = %e, "aggregator task join failed");
            }
        }

        self.partitions_cancel.cancel();
        if let Some(partition_task) = self.partition_task.take() {
            if let Err(e) = partition_task.await {
                warn!(error = %e, "partition manager join failed");
            }
        }

        info!("aggregator stopped");
    }
}

/// State owned by the consuming task.
struct Consumer<S> {
    rx: mpsc::Receiver<IngestionRecord>,
    extractor: Extractor,
    writer: BatchWriter<S>,
    buffer: BatchBuffer,
    stats: Arc<AggregatorStats>,
}

impl<S: Store> Consumer<S> {
    async fn run(mut self, closing: CancellationToken) {
        self.buffer.reset_window();

        loop {
            tokio::select! {
                biased;

                _ = closing.cancelled() => {
                    self.drain().await;
                    break;
                }

                received = self.rx.recv() => match received {
                    Some(record) => self.accept(&record),
                    None => break,
                },

                _ = tokio::time::sleep_until(self.buffer.deadline()) => {}
            }

            if self.buffer.is_full() || self.buffer.is_due(Instant::now()) {
                self.flush().await;
            }
        }

        // Terminal flush of whatever is left.
        self.flush().await;
    }

    fn accept(&mut self, record: &IngestionRecord) {
        self.stats.record_received();
        self.buffer.push(self.extractor.extract(record));
    }

    /// Rejects further sends and consumes everything already queued.
    async fn drain(&mut self) {
        self.rx.close();

        while let Some(record) = self.rx.recv().await {
            self.accept(&record);
            if self.buffer.is_full() {
                self.flush().await;
            }
        }
    }

    async fn flush(&mut self) {
        let rows = self.buffer.take();
        let errors = self.writer.send(&rows).await;

        for e in &errors {
            error!(partition = %e.partition(), error = %e, "write failed");
        }
        self.stats.record_flush(rows.len(), errors.len());

        info!(rows = rows.len(), "rows sent");

        self.buffer.reset_window();
    }
}
