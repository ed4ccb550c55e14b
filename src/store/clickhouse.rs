use std::fmt::Write;

use anyhow::{Context, Result};
use clickhouse_rs::Pool;

use crate::config::ClickHouseConfig;
use crate::row::Value;

use super::{PreparedInsert, StatementError, Store, Transaction};

/// ClickHouse store over a native TCP connection pool.
///
/// Uses LZ4 compression and a pool of 2 to 5 connections.
#[derive(Clone)]
pub struct ClickHouseStore {
    pool: Pool,
    database: String,
}

impl ClickHouseStore {
    /// Creates the pool. Connections are opened lazily on first use.
    pub fn new(cfg: &ClickHouseConfig) -> Self {
        Self {
            pool: Pool::new(build_dsn(cfg)),
            database: cfg.database.clone(),
        }
    }

    /// Opens a connection and pings the server.
    pub async fn connect(cfg: &ClickHouseConfig) -> Result<Self> {
        let store = Self::new(cfg);
        store.ping().await?;

        tracing::info!(endpoint = %cfg.endpoint, database = %cfg.database, "ClickHouse connected");

        Ok(store)
    }
}

impl Store for ClickHouseStore {
    type Tx = ClickHouseTransaction;

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let mut handle = self
            .pool
            .get_handle()
            .await
            .context("getting ClickHouse handle for table check")?;

        let sql = format!(
            "SELECT 1 FROM system.tables WHERE database = '{}' AND name = '{}'",
            escape_sql(&self.database),
            escape_sql(table),
        );

        let block = handle
            .query(sql.as_str())
            .fetch_all()
            .await
            .with_context(|| format!("checking table {table}"))?;

        Ok(block.row_count() > 0)
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let mut handle = self
            .pool
            .get_handle()
            .await
            .context("getting ClickHouse handle for statement")?;

        handle.execute(sql).await.with_context(|| {
            let preview: String = sql.chars().take(80).collect();
            format!("executing statement: {preview}...")
        })?;

        Ok(())
    }

    async fn begin(&self) -> Result<ClickHouseTransaction> {
        Ok(ClickHouseTransaction {
            pool: self.pool.clone(),
            prepared: None,
            values: String::new(),
            rows: 0,
        })
    }

    async fn ping(&self) -> Result<()> {
        let mut handle = self
            .pool
            .get_handle()
            .await
            .context("opening ClickHouse connection")?;

        handle.ping().await.context("pinging ClickHouse")?;

        Ok(())
    }
}

/// Client-side insert transaction.
///
/// ClickHouse has no multi-statement transactions, so executed rows are
/// rendered into a pending `VALUES` list and sent as one `INSERT` on commit.
pub struct ClickHouseTransaction {
    pool: Pool,
    prepared: Option<PreparedInsert>,
    values: String,
    rows: usize,
}

impl Transaction for ClickHouseTransaction {
    async fn prepare(&mut self, statement: &str) -> Result<()> {
        let prepared = PreparedInsert::parse(statement)
            .with_context(|| format!("preparing {}", preview(statement)))?;
        self.prepared = Some(prepared);
        self.values.clear();
        self.rows = 0;
        Ok(())
    }

    async fn execute(&mut self, args: Vec<Value>) -> Result<()> {
        let prepared = self.prepared.as_ref().ok_or(StatementError::NotPrepared)?;
        prepared.check_arity(&args)?;

        if self.rows > 0 {
            self.values.push_str(", ");
        }
        format_row(&mut self.values, &args);
        self.rows += 1;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let prepared = self.prepared.ok_or(StatementError::NotPrepared)?;
        if self.rows == 0 {
            return Ok(());
        }

        let mut sql = String::with_capacity(prepared.head().len() + self.values.len() + 8);
        let _ = write!(sql, "{} VALUES {}", prepared.head(), self.values);

        let mut handle = self
            .pool
            .get_handle()
            .await
            .context("getting ClickHouse handle for insert")?;

        handle
            .execute(sql.as_str())
            .await
            .with_context(|| format!("sending {} rows to {}", self.rows, preview(prepared.head())))?;

        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

/// Builds a clickhouse-rs compatible TCP DSN from configuration.
///
/// Format: `tcp://[user[:pass]@]host:port/database?options`
pub fn build_dsn(cfg: &ClickHouseConfig) -> String {
    let mut dsn = "tcp://".to_string();

    if !cfg.username.is_empty() {
        dsn.push_str(&cfg.username);
        if !cfg.password.is_empty() {
            dsn.push(':');
            dsn.push_str(&cfg.password);
        }
        dsn.push('@');
    }

    dsn.push_str(&cfg.endpoint);
    dsn.push('/');
    dsn.push_str(&cfg.database);
    dsn.push_str("?compression=lz4&pool_min=2&pool_max=5");

    dsn
}

fn preview(sql: &str) -> String {
    sql.chars().take(80).collect()
}

// --- SQL formatting helpers ---

fn format_row(out: &mut String, args: &[Value]) {
    out.push('(');
    for (idx, value) in args.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        format_value(out, value);
    }
    out.push(')');
}

fn format_value(out: &mut String, value: &Value) {
    match value {
        Value::Date(d) => {
            let _ = write!(out, "'{}'", d.format("%Y-%m-%d"));
        }
        Value::DateTime(dt) => {
            let _ = write!(out, "'{}'", dt.format("%Y-%m-%d %H:%M:%S"));
        }
        Value::UInt32(v) => {
            let _ = write!(out, "{v}");
        }
        Value::UInt64(v) => {
            let _ = write!(out, "{v}");
        }
        Value::String(s) => {
            let _ = write!(out, "'{}'", escape_sql(s));
        }
        Value::StringArray(values) => format_string_array(out, values),
        // Debug keeps a decimal point on whole numbers.
        Value::Float64Array(values) => format_array(out, values, |out, v| {
            let _ = write!(out, "{v:?}");
        }),
        Value::UInt8Array(values) => format_array(out, values, |out, v| {
            let _ = write!(out, "{v}");
        }),
    }
}

/// Escapes a string value for SQL insertion (single-quote escaping).
fn escape_sql(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn format_string_array(out: &mut String, values: &[String]) {
    format_array(out, values, |out, value| {
        let _ = write!(out, "'{}'", escape_sql(value));
    });
}

fn format_array<T>(out: &mut String, values: &[T], mut item: impl FnMut(&mut String, &T)) {
    out.push('[');
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        item(out, value);
    }
    out.push(']');
}
