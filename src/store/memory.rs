//! In-process store that records DDL and committed inserts.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use crate::row::Value;

use super::{PreparedInsert, StatementError, Store, Transaction};

/// Injected failure, matched against statement text by substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Existence checks for tables whose name contains the pattern fail.
    Exists(String),
    /// DDL containing the pattern fails.
    Ddl(String),
    /// Beginning a transaction fails.
    Begin,
    /// Executing the `row`-th row (0-based) of a matching insert fails.
    Exec { statement: String, row: usize },
    /// Committing a matching insert fails.
    Commit(String),
    /// Pinging fails.
    Ping,
}

/// One committed insert transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub statement: String,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeSet<String>,
    ddl: Vec<String>,
    inserts: Vec<Insert>,
    rollbacks: usize,
    failures: Vec<Failure>,
}

/// Cloneable handle to a shared in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks tables as already existing.
    pub fn with_tables<I, T>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.state
            .lock()
            .tables
            .extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn inject(&self, failure: Failure) {
        self.state.lock().failures.push(failure);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn tables(&self) -> Vec<String> {
        self.state.lock().tables.iter().cloned().collect()
    }

    /// Statements passed to [`Store::execute`], in order.
    pub fn ddl(&self) -> Vec<String> {
        self.state.lock().ddl.clone()
    }

    pub fn inserts(&self) -> Vec<Insert> {
        self.state.lock().inserts.clone()
    }

    /// Total committed rows across all inserts.
    pub fn row_count(&self) -> usize {
        self.state.lock().inserts.iter().map(|i| i.rows.len()).sum()
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().rollbacks
    }

    fn failing(&self, matches: impl Fn(&Failure) -> bool) -> bool {
        self.state.lock().failures.iter().any(matches)
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTransaction;

    async fn table_exists(&self, table: &str) -> Result<bool> {
        if self.failing(|f| matches!(f, Failure::Exists(p) if table.contains(p.as_str()))) {
            return Err(anyhow!("injected existence check failure for {table}"));
        }
        Ok(self.state.lock().tables.contains(table))
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        if self.failing(|f| matches!(f, Failure::Ddl(p) if sql.contains(p.as_str()))) {
            return Err(anyhow!("injected DDL failure"));
        }

        let mut state = self.state.lock();
        state.ddl.push(sql.to_string());
        if let Some(table) = created_table(sql) {
            state.tables.insert(table);
        }
        Ok(())
    }

    async fn begin(&self) -> Result<MemoryTransaction> {
        if self.failing(|f| matches!(f, Failure::Begin)) {
            return Err(anyhow!("injected begin failure"));
        }
        Ok(MemoryTransaction {
            store: self.clone(),
            statement: None,
            rows: Vec::new(),
        })
    }

    async fn ping(&self) -> Result<()> {
        if self.failing(|f| matches!(f, Failure::Ping)) {
            return Err(anyhow!("injected ping failure"));
        }
        Ok(())
    }
}

pub struct MemoryTransaction {
    store: MemoryStore,
    statement: Option<(String, PreparedInsert)>,
    rows: Vec<Vec<Value>>,
}

impl Transaction for MemoryTransaction {
    async fn prepare(&mut self, statement: &str) -> Result<()> {
        let prepared = PreparedInsert::parse(statement)?;
        self.statement = Some((statement.to_string(), prepared));
        self.rows.clear();
        Ok(())
    }

    async fn execute(&mut self, args: Vec<Value>) -> Result<()> {
        let (statement, prepared) = self.statement.as_ref().ok_or(StatementError::NotPrepared)?;
        prepared.check_arity(&args)?;

        let row = self.rows.len();
        if self.store.failing(|f| {
            matches!(f, Failure::Exec { statement: p, row: r } if *r == row && statement.contains(p.as_str()))
        }) {
            return Err(anyhow!("injected failure on row {row}"));
        }

        self.rows.push(args);
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let (statement, _) = self.statement.ok_or(StatementError::NotPrepared)?;
        if self
            .store
            .failing(|f| matches!(f, Failure::Commit(p) if statement.contains(p.as_str())))
        {
            return Err(anyhow!("injected commit failure"));
        }

        self.store.state.lock().inserts.push(Insert {
            statement,
            rows: self.rows,
        });
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.store.state.lock().rollbacks += 1;
        Ok(())
    }
}

/// Table name from a `CREATE TABLE [IF NOT EXISTS] [db.]name ...` statement.
fn created_table(sql: &str) -> Option<String> {
    let mut words = sql.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("CREATE") || !words.next()?.eq_ignore_ascii_case("TABLE") {
        return None;
    }

    let mut name = words.next()?;
    if name.eq_ignore_ascii_case("IF") {
        words.next()?;
        words.next()?;
        name = words.next()?;
    }

    let name = name.split('(').next()?;
    let name = name.rsplit('.').next()?.trim_matches('`');
    (!name.is_empty()).then(|| name.to_string())
}
