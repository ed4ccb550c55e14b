use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::extract::Extractor;
use crate::health::HealthServer;
use crate::listener::Listener;
use crate::partition::PartitionManager;
use crate::store::Store;
use crate::writer::BatchWriter;

/// Acceptor wires the listener, aggregator, partition manager and
/// healthcheck together around one store.
pub struct Acceptor<S: Store + Clone> {
    cfg: Config,
    store: S,
    aggregator: Option<Aggregator<S>>,
    health: Option<HealthServer>,
    listener_task: Option<JoinHandle<()>>,
    listener_addr: Option<SocketAddr>,
    cancel: CancellationToken,
}

impl<S: Store + Clone> Acceptor<S> {
    pub fn new(cfg: Config, store: S) -> Self {
        Self {
            cfg,
            store,
            aggregator: None,
            health: None,
            listener_task: None,
            listener_addr: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Address the syslog listener is bound to, once started.
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener_addr
    }

    /// Start all components. The listener comes up last so nothing is
    /// accepted before the aggregator consumes.
    pub async fn start(&mut self) -> Result<()> {
        let scheme = self.cfg.partition_scheme()?;

        let partitions = PartitionManager::new(
            self.store.clone(),
            scheme.clone(),
            self.cfg.partition_settings()?,
        );
        let writer = BatchWriter::new(self.store.clone(), self.cfg.insert_template()?);

        let mut aggregator = Aggregator::new(
            self.cfg.aggregator_settings(),
            Extractor::new(scheme),
            writer,
            partitions,
        );
        aggregator.start().context("starting aggregator")?;
        let queue = aggregator
            .sender()
            .context("aggregator queue already closed")?;
        self.aggregator = Some(aggregator);

        if self.cfg.healthcheck.enabled {
            let health = HealthServer::new(&self.cfg.healthcheck);
            health
                .start(self.store.clone())
                .await
                .context("starting healthcheck server")?;
            self.health = Some(health);
        }

        let listener = Listener::bind(&self.cfg.listener.addr, self.cfg.listener.read_timeout)
            .await?;
        self.listener_addr = Some(listener.local_addr()?);
        self.listener_task = Some(tokio::spawn(listener.run(queue, self.cancel.clone())));

        info!("acceptor fully started");

        Ok(())
    }

    /// Gracefully stop all components, flushing everything accepted so far.
    pub async fn stop(&mut self) {
        if let Some(health) = self.health.take() {
            health.stop();
        }

        // Closing the listener releases every producer handle.
        self.cancel.cancel();
        if let Some(task) = self.listener_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "listener task join failed");
            }
        }

        if let Some(mut aggregator) = self.aggregator.take() {
            let stats = aggregator.stats();
            aggregator.stop().await;

            let snapshot = stats.snapshot();
            info!(
                received = snapshot.received,
                rows_flushed = snapshot.rows_flushed,
                flushes = snapshot.flushes,
                failed_groups = snapshot.failed_groups,
                "acceptor stopped"
            );
        }
    }
}
