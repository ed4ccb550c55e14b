use thiserror::Error;
use tracing::debug;

use crate::row::Row;
use crate::store::{Store, Transaction};

/// Placeholder substituted with the partition key in statement templates.
pub const PARTITION_PLACEHOLDER: &str = "{partition}";

/// Failure of one destination group. All rows of the group are lost.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("partition {partition}: begin transaction: {reason}")]
    Begin { partition: String, reason: String },
    #[error("partition {partition}: prepare: {reason}")]
    Prepare { partition: String, reason: String },
    #[error("partition {partition}: row {position} of {rows}: {reason}")]
    Exec {
        partition: String,
        position: usize,
        rows: usize,
        reason: String,
    },
    #[error("partition {partition}: commit {rows} rows: {reason}")]
    Commit {
        partition: String,
        rows: usize,
        reason: String,
    },
}

impl WriteError {
    pub fn partition(&self) -> &str {
        match self {
            Self::Begin { partition, .. }
            | Self::Prepare { partition, .. }
            | Self::Exec { partition, .. }
            | Self::Commit { partition, .. } => partition,
        }
    }
}

/// Rows sharing one rendered insert statement.
struct Group<'a> {
    statement: String,
    partition: &'a str,
    rows: Vec<&'a Row>,
}

/// Writes batches of rows, one transaction per destination statement.
pub struct BatchWriter<S> {
    store: S,
    insert_template: String,
}

impl<S: Store> BatchWriter<S> {
    pub fn new(store: S, insert_template: impl Into<String>) -> Self {
        Self {
            store,
            insert_template: insert_template.into(),
        }
    }

    /// Insert statement for a partition key.
    pub fn statement(&self, partition: &str) -> String {
        self.insert_template.replace(PARTITION_PLACEHOLDER, partition)
    }

    /// Writes `rows` and returns one error per failed group.
    ///
    /// Groups are committed in order of first appearance and rows keep their
    /// buffer order inside a group. A failing group never affects another.
    pub async fn send(&self, rows: &[Row]) -> Vec<WriteError> {
        let mut errors = Vec::new();

        for group in self.group(rows) {
            if let Err(e) = self.send_group(&group).await {
                errors.push(e);
            }
        }

        errors
    }

    fn group<'a>(&self, rows: &'a [Row]) -> Vec<Group<'a>> {
        let mut groups: Vec<Group<'a>> = Vec::new();

        for row in rows {
            // Consecutive rows usually share a partition.
            if let Some(group) = groups.iter_mut().rev().find(|g| g.partition == row.partition) {
                group.rows.push(row);
                continue;
            }

            let statement = self.statement(&row.partition);
            match groups.iter_mut().find(|g| g.statement == statement) {
                Some(group) => group.rows.push(row),
                None => groups.push(Group {
                    statement,
                    partition: &row.partition,
                    rows: vec![row],
                }),
            }
        }

        groups
    }

    async fn send_group(&self, group: &Group<'_>) -> Result<(), WriteError> {
        let partition = group.partition.to_string();
        let rows = group.rows.len();

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| WriteError::Begin {
                partition: partition.clone(),
                reason: format!("{e:#}"),
            })?;

        if let Err(e) = tx.prepare(&group.statement).await {
            rollback(tx, &partition).await;
            return Err(WriteError::Prepare {
                partition,
                reason: format!("{e:#}"),
            });
        }

        for (position, row) in group.rows.iter().enumerate() {
            if let Err(e) = tx.execute(row.args()).await {
                rollback(tx, &partition).await;
                return Err(WriteError::Exec {
                    partition,
                    position,
                    rows,
                    reason: format!("{e:#}"),
                });
            }
        }

        tx.commit().await.map_err(|e| WriteError::Commit {
            partition: partition.clone(),
            rows,
            reason: format!("{e:#}"),
        })?;

        debug!(partition = %partition, rows, "group committed");

        Ok(())
    }
}

async fn rollback<T: Transaction>(tx: T, partition: &str) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(partition = %partition, error = %e, "rollback failed");
    }
}
