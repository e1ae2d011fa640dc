use std::time::Duration;

use futures::TryStreamExt;
use sqlx::{Column, Executor, SqlitePool, TypeInfo};

use sondar_core::{ColumnType, ExecutionError, RowSet};

use crate::introspect::decode_scalar;

/// Executes vetted SQL against a read-only connection under a hard row cap
/// and wall-clock timeout. Never runs DDL; the pool is opened read-only.
#[derive(Clone, Debug)]
pub struct QueryExecutor {
    pool: SqlitePool,
}

impl QueryExecutor {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn execute(
        &self,
        sql: &str,
        limit_rows: usize,
        timeout: Duration,
    ) -> Result<RowSet, ExecutionError> {
        match tokio::time::timeout(timeout, self.fetch(sql, limit_rows)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Timeout(timeout)),
        }
    }

    async fn fetch(&self, sql: &str, limit_rows: usize) -> Result<RowSet, ExecutionError> {
        let described = self.pool.describe(sql).await.map_err(classify_error)?;
        let columns: Vec<(String, ColumnType)> = described
            .columns()
            .iter()
            .map(|c| {
                (
                    c.name().to_string(),
                    ColumnType::from_declared(c.type_info().name()),
                )
            })
            .collect();

        let mut row_set = RowSet::new(sql, columns);
        let mut stream = sqlx::query(sql).fetch(&self.pool);
        while let Some(row) = stream.try_next().await.map_err(classify_error)? {
            if row_set.rows.len() == limit_rows {
                return Err(ExecutionError::RowCapExceeded { limit: limit_rows });
            }
            let mut cells = Vec::with_capacity(row_set.columns.len());
            for index in 0..row_set.columns.len() {
                cells.push(decode_scalar(&row, index).map_err(classify_error)?);
            }
            row_set.rows.push(cells);
        }
        Ok(row_set)
    }
}

/// Buckets an engine failure into the execution taxonomy by message
/// inspection; SQLite reports these conditions as text only.
fn classify_error(error: sqlx::Error) -> ExecutionError {
    let message = error.to_string();
    let lower = message.to_lowercase();
    if lower.contains("no such table") || lower.contains("no such column") {
        ExecutionError::Reference(message)
    } else if lower.contains("syntax error")
        || lower.contains("unrecognized token")
        || lower.contains("incomplete input")
    {
        ExecutionError::Syntax(message)
    } else if lower.contains("datatype mismatch") {
        ExecutionError::TypeMismatch(message)
    } else {
        ExecutionError::EngineOther(message)
    }
}
