use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::aggregator::AggregatorSettings;
use crate::partition::{Granularity, PartitionScheme, PartitionSettings};
use crate::row::INSERT_COLUMNS;
use crate::store::PreparedInsert;
use crate::writer::PARTITION_PLACEHOLDER;

/// Replaced with `clickhouse.database` in insert and DDL templates.
pub const DATABASE_PLACEHOLDER: &str = "{database}";

/// Replaced with `clickhouse.table_prefix` in insert and DDL templates.
pub const TABLE_PREFIX_PLACEHOLDER: &str = "{table_prefix}";

/// Longest accepted partition lookback or lookahead.
const MAX_WINDOW: Duration = Duration::from_secs(366 * 24 * 3600);

/// Top-level configuration for the acceptor.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity used when `--log-level` is not given. Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Syslog listener configuration.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Batching and statement template configuration.
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// ClickHouse connection and partition DDL configuration.
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,

    /// Partition lifecycle schedule.
    #[serde(default)]
    pub partitions: PartitionsConfig,

    /// HTTP healthcheck configuration.
    #[serde(default)]
    pub healthcheck: HealthcheckConfig,
}

/// Syslog listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    /// TCP address to accept syslog connections on. Default: "0.0.0.0:3333".
    #[serde(default = "default_listener_addr")]
    pub addr: String,

    /// Aggregator queue bound. Default: 1000000.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Idle connections are closed after this long. Default: 60s.
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
}

/// Batching and statement template configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Rows per flush. Default: 10000.
    #[serde(default = "default_batch")]
    pub batch: usize,

    /// Maximum time between flushes. Default: 60s.
    #[serde(default = "default_period", with = "humantime_serde")]
    pub period: Duration,

    /// Selector into `partition_types`. Default: "hourly".
    #[serde(default = "default_partition_type")]
    pub partition_type: String,

    /// Extra partition key formats (strftime), merged over the built-ins.
    #[serde(default)]
    pub partition_types: HashMap<String, String>,

    /// Selector into `insert_queries`. Default: "default".
    #[serde(default = "default_insert_query_type")]
    pub insert_query_type: String,

    /// Extra insert templates, merged over the built-ins.
    #[serde(default)]
    pub insert_queries: HashMap<String, String>,
}

/// ClickHouse connection and partition DDL configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    /// Native protocol endpoint (host:port). Required.
    #[serde(default)]
    pub endpoint: String,

    /// Database holding the partition tables. Default: "logs".
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Partition table name prefix; the table for key K is `<prefix>K`.
    /// Default: "logs".
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Selector into `partition_queries`. Default: "single".
    #[serde(default = "default_shard_type")]
    pub shard_type: String,

    /// Extra partition DDL lists, merged over the built-ins.
    #[serde(default)]
    pub partition_queries: HashMap<String, Vec<String>>,
}

/// Partition lifecycle schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionsConfig {
    /// Base interval between checks. Default: 1h.
    #[serde(default = "default_check_interval", with = "humantime_serde")]
    pub check_interval: Duration,

    /// Upper bound of the random delay added to each interval. Default: 100s.
    #[serde(default = "default_max_jitter", with = "humantime_serde")]
    pub max_jitter: Duration,

    /// How far back partitions are ensured. Default: 7d.
    #[serde(default = "default_window", with = "humantime_serde")]
    pub lookback: Duration,

    /// How far ahead partitions are ensured. Default: 7d.
    #[serde(default = "default_window", with = "humantime_serde")]
    pub lookahead: Duration,
}

/// HTTP healthcheck configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthcheckConfig {
    /// Serve the healthcheck. Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Listen address, ":port" binds all interfaces. Default: ":9001".
    #[serde(default = "default_health_addr")]
    pub addr: String,

    /// Store pings per request before reporting failure. Default: 10.
    #[serde(default = "default_health_attempts")]
    pub attempts: u32,

    /// Delay between failed pings. Default: 1s.
    #[serde(default = "default_health_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,
}

// --- Built-in templates ---

const DDL_COLUMNS: &str = "date Date, timestamp DateTime, nsec UInt32, namespace String, \
     level String, tag String, host String, pid String, caller String, msg String, \
     labels Nested(names String, values String), \
     string_fields Nested(names String, values String), \
     number_fields Nested(names String, values Float64), \
     boolean_fields Nested(names String, values UInt8), \
     `null_fields.names` Array(String), phone UInt64, request_id String, \
     order_id String, subscription_id String";

const DDL_ORDER: &str = "PARTITION BY date \
     ORDER BY (timestamp, nsec, level, tag, host, phone, request_id, order_id, subscription_id)";

fn builtin_partition_types() -> HashMap<String, String> {
    HashMap::from([
        ("hourly".to_string(), "%Y%m%d%H".to_string()),
        ("daily".to_string(), "%Y%m%d".to_string()),
    ])
}

fn builtin_insert_queries() -> HashMap<String, String> {
    let placeholders = vec!["?"; INSERT_COLUMNS.len()].join(",");
    HashMap::from([(
        "default".to_string(),
        format!(
            "INSERT INTO {{database}}.{{table_prefix}}{{partition}} ({}) VALUES ({placeholders})",
            INSERT_COLUMNS.join(",")
        ),
    )])
}

fn builtin_partition_queries() -> HashMap<String, Vec<String>> {
    HashMap::from([
        (
            "single".to_string(),
            vec![format!(
                "CREATE TABLE IF NOT EXISTS {{database}}.{{table_prefix}}{{partition}} ({DDL_COLUMNS}) \
                 ENGINE = MergeTree() {DDL_ORDER}"
            )],
        ),
        (
            "sharded".to_string(),
            vec![
                format!(
                    "CREATE TABLE IF NOT EXISTS {{database}}.{{table_prefix}}{{partition}}_local \
                     ON CLUSTER logs ({DDL_COLUMNS}) ENGINE = ReplicatedMergeTree(\
                     '/clickhouse/tables/{{shard}}/{{database}}.{{table_prefix}}{{partition}}_local', \
                     '{{replica}}') \
                     {DDL_ORDER}"
                ),
                "CREATE TABLE IF NOT EXISTS {database}.{table_prefix}{partition} ON CLUSTER logs \
                 AS {database}.{table_prefix}{partition}_local \
                 ENGINE = Distributed(logs, {database}, {table_prefix}{partition}_local, rand())"
                    .to_string(),
            ],
        ),
    ])
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listener_addr() -> String {
    "0.0.0.0:3333".to_string()
}

fn default_queue_capacity() -> usize {
    1_000_000
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_batch() -> usize {
    10_000
}

fn default_period() -> Duration {
    Duration::from_secs(60)
}

fn default_partition_type() -> String {
    "hourly".to_string()
}

fn default_insert_query_type() -> String {
    "default".to_string()
}

fn default_database() -> String {
    "logs".to_string()
}

fn default_table_prefix() -> String {
    "logs".to_string()
}

fn default_shard_type() -> String {
    "single".to_string()
}

fn default_check_interval() -> Duration {
    Duration::from_secs(3600)
}

fn default_max_jitter() -> Duration {
    Duration::from_secs(100)
}

fn default_window() -> Duration {
    Duration::from_secs(7 * 24 * 3600)
}

fn default_true() -> bool {
    true
}

fn default_health_addr() -> String {
    ":9001".to_string()
}

fn default_health_attempts() -> u32 {
    10
}

fn default_health_retry_delay() -> Duration {
    Duration::from_secs(1)
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            listener: ListenerConfig::default(),
            aggregator: AggregatorConfig::default(),
            clickhouse: ClickHouseConfig::default(),
            partitions: PartitionsConfig::default(),
            healthcheck: HealthcheckConfig::default(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            addr: default_listener_addr(),
            queue_capacity: default_queue_capacity(),
            read_timeout: default_read_timeout(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            batch: default_batch(),
            period: default_period(),
            partition_type: default_partition_type(),
            partition_types: HashMap::new(),
            insert_query_type: default_insert_query_type(),
            insert_queries: HashMap::new(),
        }
    }
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            database: default_database(),
            username: String::new(),
            password: String::new(),
            table_prefix: default_table_prefix(),
            shard_type: default_shard_type(),
            partition_queries: HashMap::new(),
        }
    }
}

impl Default for PartitionsConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            max_jitter: default_max_jitter(),
            lookback: default_window(),
            lookahead: default_window(),
        }
    }
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_health_addr(),
            attempts: default_health_attempts(),
            retry_delay: default_health_retry_delay(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.clickhouse.endpoint.is_empty() {
            bail!("clickhouse.endpoint is required");
        }

        if self.clickhouse.database.is_empty() {
            bail!("clickhouse.database is required");
        }

        if self.clickhouse.table_prefix.is_empty() {
            bail!("clickhouse.table_prefix is required");
        }

        if self.listener.queue_capacity == 0 {
            bail!("listener.queue_capacity must be positive");
        }

        if self.listener.read_timeout.is_zero() {
            bail!("listener.read_timeout must be positive");
        }

        if self.aggregator.batch == 0 {
            bail!("aggregator.batch must be positive");
        }

        if self.aggregator.period.is_zero() {
            bail!("aggregator.period must be positive");
        }

        if self.partitions.check_interval.is_zero() {
            bail!("partitions.check_interval must be positive");
        }

        if self.partitions.lookback > MAX_WINDOW || self.partitions.lookahead > MAX_WINDOW {
            bail!("partitions.lookback and partitions.lookahead must not exceed 366d");
        }

        if self.healthcheck.enabled && self.healthcheck.attempts == 0 {
            bail!("healthcheck.attempts must be positive");
        }

        self.partition_scheme()?;

        // Partition existence is checked as <database>.<prefix><key>, so
        // every template must write to that table.
        let target = format!(
            "{}.{}{PARTITION_PLACEHOLDER}",
            self.clickhouse.database, self.clickhouse.table_prefix
        );

        let ddl = self.partition_ddl()?;
        if !ddl.iter().any(|statement| statement.contains(&target)) {
            bail!(
                "clickhouse.partition_queries.{} does not create {target}",
                self.clickhouse.shard_type
            );
        }

        let template = self.insert_template()?;
        if !template.contains(&target) {
            bail!(
                "aggregator.insert_queries.{} does not insert into {target}",
                self.aggregator.insert_query_type
            );
        }

        let prepared = PreparedInsert::parse(&template).with_context(|| {
            format!(
                "aggregator.insert_queries.{} is not a valid insert",
                self.aggregator.insert_query_type
            )
        })?;
        if prepared.placeholders() != INSERT_COLUMNS.len() {
            bail!(
                "aggregator.insert_queries.{} has {} placeholders, rows carry {} columns",
                self.aggregator.insert_query_type,
                prepared.placeholders(),
                INSERT_COLUMNS.len()
            );
        }

        Ok(())
    }

    /// Resolves `aggregator.partition_type` to a partition scheme.
    pub fn partition_scheme(&self) -> Result<PartitionScheme> {
        let name = &self.aggregator.partition_type;
        let format = self
            .aggregator
            .partition_types
            .get(name)
            .cloned()
            .or_else(|| builtin_partition_types().remove(name))
            .with_context(|| format!("unsupported partition type: {name}"))?;

        PartitionScheme::new(Granularity::from_format(&format), format)
            .with_context(|| format!("aggregator.partition_types.{name}"))
    }

    /// Resolves `aggregator.insert_query_type` to an insert template with
    /// the database and table prefix filled in.
    pub fn insert_template(&self) -> Result<String> {
        let name = &self.aggregator.insert_query_type;
        let template = self
            .aggregator
            .insert_queries
            .get(name)
            .cloned()
            .or_else(|| builtin_insert_queries().remove(name))
            .with_context(|| format!("unsupported insert query type: {name}"))?;

        Ok(self.render_names(&template))
    }

    /// Resolves `clickhouse.shard_type` to the partition DDL list.
    pub fn partition_ddl(&self) -> Result<Vec<String>> {
        let name = &self.clickhouse.shard_type;
        let ddl = self
            .clickhouse
            .partition_queries
            .get(name)
            .cloned()
            .or_else(|| builtin_partition_queries().remove(name))
            .with_context(|| format!("unsupported shard type: {name}"))?;

        if ddl.is_empty() {
            bail!("clickhouse.partition_queries.{name} is empty");
        }

        Ok(ddl.iter().map(|statement| self.render_names(statement)).collect())
    }

    /// Fills `{database}` and `{table_prefix}`; `{partition}` is left for
    /// the writer and the partition manager.
    fn render_names(&self, template: &str) -> String {
        template
            .replace(DATABASE_PLACEHOLDER, &self.clickhouse.database)
            .replace(TABLE_PREFIX_PLACEHOLDER, &self.clickhouse.table_prefix)
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            batch: self.aggregator.batch,
            period: self.aggregator.period,
            queue_capacity: self.listener.queue_capacity,
        }
    }

    pub fn partition_settings(&self) -> Result<PartitionSettings> {
        Ok(PartitionSettings {
            table_prefix: self.clickhouse.table_prefix.clone(),
            ddl: self.partition_ddl()?,
            check_interval: self.partitions.check_interval,
            max_jitter: self.partitions.max_jitter,
            lookback: self.partitions.lookback,
            lookahead: self.partitions.lookahead,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            clickhouse: ClickHouseConfig {
                endpoint: "localhost:9000".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.listener.addr, "0.0.0.0:3333");
        assert_eq!(cfg.listener.queue_capacity, 1_000_000);
        assert_eq!(cfg.aggregator.batch, 10_000);
        assert_eq!(cfg.aggregator.period, Duration::from_secs(60));
        assert_eq!(cfg.partitions.check_interval, Duration::from_secs(3600));
        assert_eq!(cfg.partitions.lookback, Duration::from_secs(7 * 86400));
        assert_eq!(cfg.healthcheck.addr, ":9001");
        assert_eq!(cfg.healthcheck.attempts, 10);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validation_missing_endpoint() {
        let err = Config::default().validate().expect_err("missing endpoint");
        assert!(err.to_string().contains("clickhouse.endpoint"));
    }

    #[test]
    fn test_validation_zero_batch_and_period() {
        let mut cfg = valid_config();
        cfg.aggregator.batch = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid_config();
        cfg.aggregator.period = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_unknown_selectors() {
        let mut cfg = valid_config();
        cfg.aggregator.partition_type = "weekly".to_string();
        let err = cfg.validate().expect_err("unknown partition type");
        assert!(format!("{err:#}").contains("unsupported partition type: weekly"));

        let mut cfg = valid_config();
        cfg.aggregator.insert_query_type = "custom".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = valid_config();
        cfg.clickhouse.shard_type = "triple".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_insert_arity() {
        let mut cfg = valid_config();
        cfg.aggregator.insert_query_type = "short".to_string();
        cfg.aggregator.insert_queries.insert(
            "short".to_string(),
            "INSERT INTO logs.logs{partition} (date) VALUES (?)".to_string(),
        );
        let err = cfg.validate().expect_err("arity mismatch");
        assert!(err.to_string().contains("1 placeholders"));
    }

    #[test]
    fn test_builtin_templates() {
        let cfg = valid_config();

        let insert = cfg.insert_template().expect("insert");
        assert!(insert.starts_with(
            "INSERT INTO logs.logs{partition} (date,timestamp,nsec,host,level,tag,pid,caller,msg,"
        ));
        assert!(insert.ends_with("phone,request_id,order_id,subscription_id) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)"));

        let scheme = cfg.partition_scheme().expect("scheme");
        assert_eq!(scheme.granularity(), Granularity::Hourly);
        assert_eq!(scheme.format(), "%Y%m%d%H");

        let single = cfg.partition_ddl().expect("ddl");
        assert_eq!(single.len(), 1);
        assert!(single[0].contains("ENGINE = MergeTree()"));

        let mut sharded = valid_config();
        sharded.clickhouse.shard_type = "sharded".to_string();
        let ddl = sharded.partition_ddl().expect("ddl");
        assert_eq!(ddl.len(), 2);
        assert!(ddl[0].contains("ReplicatedMergeTree"));
        assert!(ddl[0].contains("{shard}"));
        assert!(ddl[1].contains("Distributed(logs, logs, logs{partition}_local, rand())"));
    }

    #[test]
    fn test_user_entries_override_builtins() {
        let mut cfg = valid_config();
        cfg.aggregator.partition_type = "daily".to_string();
        cfg.aggregator
            .partition_types
            .insert("daily".to_string(), "%Y_%m_%d".to_string());

        let scheme = cfg.partition_scheme().expect("scheme");
        assert_eq!(scheme.granularity(), Granularity::Daily);
        assert_eq!(scheme.format(), "%Y_%m_%d");
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
log_level: debug
listener:
  addr: "127.0.0.1:5514"
  read_timeout: 30s
aggregator:
  batch: 500
  period: 5s
  partition_type: daily
clickhouse:
  endpoint: "ch:9000"
  shard_type: sharded
partitions:
  lookback: 2d
  lookahead: 1d
healthcheck:
  enabled: false
"#;
        let cfg: Config = serde_yaml::from_str(yaml).expect("parse");
        cfg.validate().expect("valid");

        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.listener.addr, "127.0.0.1:5514");
        assert_eq!(cfg.listener.read_timeout, Duration::from_secs(30));
        assert_eq!(cfg.listener.queue_capacity, 1_000_000);
        assert_eq!(cfg.aggregator.batch, 500);
        assert_eq!(cfg.aggregator.period, Duration::from_secs(5));
        assert_eq!(cfg.partitions.lookback, Duration::from_secs(2 * 86400));
        assert_eq!(cfg.partitions.max_jitter, Duration::from_secs(100));
        assert!(!cfg.healthcheck.enabled);

        let settings = cfg.partition_settings().expect("settings");
        assert_eq!(settings.ddl.len(), 2);
        assert_eq!(settings.table_prefix, "logs");

        let agg = cfg.aggregator_settings();
        assert_eq!(agg.batch, 500);
        assert_eq!(agg.queue_capacity, 1_000_000);
    }

    #[test]
    fn test_templates_follow_database_and_prefix() {
        let mut cfg = valid_config();
        cfg.clickhouse.database = "prod".to_string();
        cfg.clickhouse.table_prefix = "app_".to_string();
        cfg.validate().expect("valid");

        let insert = cfg.insert_template().expect("insert");
        assert!(insert.starts_with("INSERT INTO prod.app_{partition} ("), "{insert}");

        let ddl = cfg.partition_ddl().expect("ddl");
        assert!(ddl[0].starts_with("CREATE TABLE IF NOT EXISTS prod.app_{partition} ("));

        cfg.clickhouse.shard_type = "sharded".to_string();
        let ddl = cfg.partition_ddl().expect("ddl");
        assert!(ddl[0].contains("prod.app_{partition}_local"));
        assert!(ddl[0].contains("'/clickhouse/tables/{shard}/prod.app_{partition}_local'"));
        assert!(ddl[1].contains("Distributed(logs, prod, app_{partition}_local, rand())"));

        let settings = cfg.partition_settings().expect("settings");
        assert_eq!(settings.table_prefix, "app_");
    }

    #[test]
    fn test_validation_template_targets_other_table() {
        let mut cfg = valid_config();
        cfg.clickhouse.database = "prod".to_string();
        cfg.aggregator.insert_query_type = "legacy".to_string();
        cfg.aggregator.insert_queries.insert(
            "legacy".to_string(),
            builtin_insert_queries()["default"].replace("{database}.{table_prefix}", "logs.logs"),
        );
        let err = cfg.validate().expect_err("insert targets logs.logs");
        assert!(err.to_string().contains("does not insert into prod.logs{partition}"));

        let mut cfg = valid_config();
        cfg.clickhouse.table_prefix = "app_".to_string();
        cfg.clickhouse.shard_type = "custom".to_string();
        cfg.clickhouse.partition_queries.insert(
            "custom".to_string(),
            vec!["CREATE TABLE IF NOT EXISTS logs.logs{partition} (a UInt8) ENGINE = Log".to_string()],
        );
        let err = cfg.validate().expect_err("ddl targets logs.logs");
        assert!(err.to_string().contains("does not create logs.app_{partition}"));
    }

    #[test]
    fn test_custom_partition_type_granularity_from_format() {
        let mut cfg = valid_config();
        cfg.aggregator.partition_type = "hourly_v2".to_string();
        cfg.aggregator
            .partition_types
            .insert("hourly_v2".to_string(), "%Y_%m_%d_%H".to_string());
        assert_eq!(
            cfg.partition_scheme().expect("scheme").granularity(),
            Granularity::Hourly
        );

        cfg.aggregator.partition_type = "hourly".to_string();
        cfg.aggregator
            .partition_types
            .insert("hourly".to_string(), "%Y%m%d".to_string());
        assert_eq!(
            cfg.partition_scheme().expect("scheme").granularity(),
            Granularity::Daily
        );
    }

    #[test]
    fn test_window_limit() {
        let mut cfg = valid_config();
        cfg.partitions.lookahead = Duration::from_secs(400 * 86400);
        assert!(cfg.validate().is_err());
    }
}
