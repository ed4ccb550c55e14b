//! Partition lifecycle: creates destination tables around the current time.

mod scheme;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::store::Store;
use crate::writer::PARTITION_PLACEHOLDER;

pub use self::scheme::{Granularity, PartitionScheme};

/// Schedule and window of the partition manager.
#[derive(Debug, Clone)]
pub struct PartitionSettings {
    /// Prefix joined with the key to form the table name.
    pub table_prefix: String,
    /// DDL templates run, in order, for each missing partition.
    pub ddl: Vec<String>,
    pub check_interval: Duration,
    pub max_jitter: Duration,
    pub lookback: Duration,
    pub lookahead: Duration,
}

/// A destination table derived from one partition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDescriptor {
    pub key: String,
    pub table: String,
    pub ddl: Vec<String>,
}

/// Outcome counts of one check cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub created: usize,
    pub failed: usize,
}

/// Periodically makes sure every partition in a rolling window exists.
pub struct PartitionManager<S> {
    store: S,
    scheme: PartitionScheme,
    settings: PartitionSettings,
}

impl<S: Store> PartitionManager<S> {
    pub fn new(store: S, scheme: PartitionScheme, settings: PartitionSettings) -> Self {
        Self {
            store,
            scheme,
            settings,
        }
    }

    pub fn descriptor(&self, key: &str) -> PartitionDescriptor {
        PartitionDescriptor {
            key: key.to_string(),
            table: format!("{}{}", self.settings.table_prefix, key),
            ddl: self
                .settings
                .ddl
                .iter()
                .map(|t| t.replace(PARTITION_PLACEHOLDER, key))
                .collect(),
        }
    }

    /// Descriptors for `[now - lookback, now + lookahead)`.
    pub fn window(&self, now: DateTime<Utc>) -> Vec<PartitionDescriptor> {
        let from = now
            .checked_sub_signed(to_chrono(self.settings.lookback))
            .unwrap_or(now);
        let to = now
            .checked_add_signed(to_chrono(self.settings.lookahead))
            .unwrap_or(now);

        self.scheme
            .keys_between(from, to)
            .iter()
            .map(|key| self.descriptor(key))
            .collect()
    }

    /// Creates the partition if it is missing. Returns true if it was created.
    pub async fn ensure(&self, partition: &PartitionDescriptor) -> Result<bool> {
        let exists = self
            .store
            .table_exists(&partition.table)
            .await
            .with_context(|| format!("checking partition {}", partition.key))?;
        if exists {
            return Ok(false);
        }

        info!(partition = %partition.key, table = %partition.table, "creating partition");

        for ddl in &partition.ddl {
            self.store
                .execute(ddl)
                .await
                .with_context(|| format!("creating partition {}", partition.key))?;
        }

        Ok(true)
    }

    /// Checks every partition in the window. Failures are logged per key.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        info!("checking partitions");

        let mut report = CycleReport::default();
        for partition in self.window(now) {
            report.checked += 1;
            match self.ensure(&partition).await {
                Ok(true) => report.created += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    let reason = format!("{e:#}");
                    error!(partition = %partition.key, error = %reason, "partition check failed");
                }
            }
        }

        debug!(
            checked = report.checked,
            created = report.created,
            failed = report.failed,
            "partition cycle complete"
        );

        report
    }

    /// Runs a cycle immediately, then every check interval plus jitter until
    /// cancelled. Cancellation also abandons a cycle in progress; creation
    /// is idempotent so the next start picks up where it stopped.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("partition check interrupted");
                    break;
                }
                _ = self.run_cycle(Utc::now()) => {}
            }

            let delay = self.settings.check_interval + self.jitter();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("partition manager stopped");
    }

    /// Uniform jitter in `(0, max_jitter]` at millisecond resolution.
    fn jitter(&self) -> Duration {
        let max = self.settings.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(1..=max))
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::store::memory::MemoryTransaction;
    use crate::store::{Failure, MemoryStore};

    fn settings() -> PartitionSettings {
        PartitionSettings {
            table_prefix: "logs".to_string(),
            ddl: vec![
                "CREATE TABLE logs.logs{partition}_local (a UInt8) ENGINE = Log".to_string(),
                "CREATE TABLE logs.logs{partition} (a UInt8) ENGINE = Log".to_string(),
            ],
            check_interval: Duration::from_secs(3600),
            max_jitter: Duration::from_secs(100),
            lookback: Duration::from_secs(3 * 3600),
            lookahead: Duration::from_secs(2 * 3600),
        }
    }

    fn hourly_manager(store: MemoryStore) -> PartitionManager<MemoryStore> {
        let scheme = PartitionScheme::new(Granularity::Hourly, "%Y%m%d%H").expect("scheme");
        PartitionManager::new(store, scheme, settings())
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0)
            .single()
            .expect("valid time")
    }

    #[test]
    fn test_descriptor_substitutes_key() {
        let manager = hourly_manager(MemoryStore::new());
        let d = manager.descriptor("2024060112");
        assert_eq!(d.table, "logs2024060112");
        assert_eq!(d.ddl.len(), 2);
        assert!(d.ddl[0].contains("logs.logs2024060112_local"));
        assert!(d.ddl[1].contains("logs.logs2024060112 "));
    }

    #[test]
    fn test_window_hourly() {
        let manager = hourly_manager(MemoryStore::new());
        let keys: Vec<String> = manager.window(noon()).into_iter().map(|d| d.key).collect();
        assert_eq!(
            keys,
            vec!["2024060109", "2024060110", "2024060111", "2024060112", "2024060113"]
        );
    }

    #[test]
    fn test_window_daily() {
        let scheme = PartitionScheme::new(Granularity::Daily, "%Y%m%d").expect("scheme");
        let mut s = settings();
        s.lookback = Duration::from_secs(7 * 86400);
        s.lookahead = Duration::from_secs(7 * 86400);
        let manager = PartitionManager::new(MemoryStore::new(), scheme, s);

        let window = manager.window(noon());
        assert_eq!(window.len(), 14);
        assert_eq!(window[0].key, "20240525");
        assert_eq!(window[13].key, "20240607");
    }

    #[tokio::test]
    async fn test_cycle_creates_missing_partitions() {
        let store = MemoryStore::new().with_tables(["logs2024060110"]);
        let manager = hourly_manager(store.clone());

        let report = manager.run_cycle(noon()).await;
        assert_eq!(
            report,
            CycleReport {
                checked: 5,
                created: 4,
                failed: 0
            }
        );
        assert_eq!(store.ddl().len(), 8);

        // Second cycle finds everything in place.
        let report = manager.run_cycle(noon()).await;
        assert_eq!(report.created, 0);
        assert_eq!(store.ddl().len(), 8);
    }

    #[tokio::test]
    async fn test_cycle_continues_after_failures() {
        let store = MemoryStore::new();
        store.inject(Failure::Exists("2024060110".to_string()));
        store.inject(Failure::Ddl("logs.logs2024060112_local".to_string()));
        let manager = hourly_manager(store.clone());

        let report = manager.run_cycle(noon()).await;
        assert_eq!(report.checked, 5);
        assert_eq!(report.failed, 2);
        assert_eq!(report.created, 3);

        let tables = store.tables();
        assert!(tables.contains(&"logs2024060113".to_string()));
        assert!(!tables.contains(&"logs2024060112".to_string()));
    }

    #[test]
    fn test_jitter_bounds() {
        let manager = hourly_manager(MemoryStore::new());
        for _ in 0..100 {
            let j = manager.jitter();
            assert!(j > Duration::ZERO && j <= Duration::from_secs(100));
        }

        let mut s = settings();
        s.max_jitter = Duration::ZERO;
        let scheme = PartitionScheme::new(Granularity::Hourly, "%Y%m%d%H").expect("scheme");
        let manager = PartitionManager::new(MemoryStore::new(), scheme, s);
        assert_eq!(manager.jitter(), Duration::ZERO);
    }

    /// Store whose existence checks take `delay` each.
    #[derive(Clone)]
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    impl Store for SlowStore {
        type Tx = MemoryTransaction;

        async fn table_exists(&self, table: &str) -> Result<bool> {
            tokio::time::sleep(self.delay).await;
            self.inner.table_exists(table).await
        }

        async fn execute(&self, sql: &str) -> Result<()> {
            self.inner.execute(sql).await
        }

        async fn begin(&self) -> Result<MemoryTransaction> {
            self.inner.begin().await
        }

        async fn ping(&self) -> Result<()> {
            self.inner.ping().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_slow_cycle() {
        let store = SlowStore {
            inner: MemoryStore::new(),
            delay: Duration::from_secs(5),
        };
        let scheme = PartitionScheme::new(Granularity::Hourly, "%Y%m%d%H").expect("scheme");
        let mut s = settings();
        s.lookback = Duration::from_secs(7 * 86400);
        s.lookahead = Duration::from_secs(7 * 86400);
        let manager = PartitionManager::new(store.clone(), scheme, s);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(manager.run(cancel.clone()));

        // Two keys checked, the third is in flight.
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(store.inner.ddl().len(), 4);

        let started = tokio::time::Instant::now();
        cancel.cancel();
        handle.await.expect("manager task");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(store.inner.ddl().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_checks_immediately_and_stops_on_cancel() {
        let store = MemoryStore::new();
        let manager = hourly_manager(store.clone());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(manager.run(cancel.clone()));
        tokio::task::yield_now().await;
        while store.ddl().is_empty() {
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        handle.await.expect("manager task");
        assert!(!store.ddl().is_empty());
    }
}
