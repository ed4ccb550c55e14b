//! Destination store boundary.
//!
//! The aggregator, writer and partition manager only talk to a [`Store`];
//! [`ClickHouseStore`] is the production implementation and [`MemoryStore`]
//! records everything for tests.

pub mod clickhouse;
pub mod memory;

use std::future::Future;

use anyhow::Result;
use thiserror::Error;

use crate::row::Value;

pub use self::clickhouse::ClickHouseStore;
pub use self::memory::{Failure, MemoryStore};

/// Connection to the analytical store.
pub trait Store: Send + Sync + 'static {
    type Tx: Transaction;

    /// Returns true if `table` exists in the configured database.
    fn table_exists(&self, table: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Runs one statement that returns no rows (DDL).
    fn execute(&self, sql: &str) -> impl Future<Output = Result<()>> + Send;

    /// Opens a transaction for a single insert statement.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send;

    /// Checks connectivity.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}

/// An open insert transaction.
///
/// Nothing becomes visible before [`Transaction::commit`]; dropping or
/// rolling back discards every executed row.
pub trait Transaction: Send {
    /// Prepares the insert statement all following rows use.
    fn prepare(&mut self, statement: &str) -> impl Future<Output = Result<()>> + Send;

    /// Queues one row of positional arguments.
    fn execute(&mut self, args: Vec<Value>) -> impl Future<Output = Result<()>> + Send;

    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}

/// Problems with an insert statement or the arguments bound to it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatementError {
    #[error("statement has no VALUES clause")]
    MissingValues,
    #[error("VALUES clause must be a parenthesized list of ? placeholders")]
    InvalidPlaceholders,
    #[error("statement expects {expected} arguments, got {got}")]
    Arity { expected: usize, got: usize },
    #[error("no statement prepared")]
    NotPrepared,
}

/// An `INSERT ... VALUES (?, ...)` statement split into its head and the
/// number of positional placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInsert {
    head: String,
    placeholders: usize,
}

impl PreparedInsert {
    pub fn parse(statement: &str) -> Result<Self, StatementError> {
        let upper = statement.to_ascii_uppercase();
        let values_at = upper.rfind("VALUES").ok_or(StatementError::MissingValues)?;

        let head = statement[..values_at].trim_end().to_string();
        let tail = statement[values_at + "VALUES".len()..]
            .trim()
            .trim_end_matches(';')
            .trim_end();

        let inner = tail
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .ok_or(StatementError::InvalidPlaceholders)?;

        let mut placeholders = 0;
        for token in inner.split(',') {
            if token.trim() != "?" {
                return Err(StatementError::InvalidPlaceholders);
            }
            placeholders += 1;
        }

        if head.is_empty() {
            return Err(StatementError::MissingValues);
        }

        Ok(Self { head, placeholders })
    }

    /// Statement text before the `VALUES` keyword.
    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Checks that a row supplies exactly one argument per placeholder.
    pub fn check_arity(&self, args: &[Value]) -> Result<(), StatementError> {
        if args.len() != self.placeholders {
            return Err(StatementError::Arity {
                expected: self.placeholders,
                got: args.len(),
            });
        }
        Ok(())
    }
}
