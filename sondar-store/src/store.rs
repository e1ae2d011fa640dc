use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use sondar_core::StoreError;

use crate::executor::QueryExecutor;
use crate::migrations::run_migrations;

/// Handle to the embedded store: a read-write pool for introspection,
/// rebuilds, and record tables, and a read-only pool handed to the query
/// executor.
#[derive(Clone, Debug)]
pub struct Store {
    pub(crate) pool: SqlitePool,
    read_pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct StoreBuilder {
    path: PathBuf,
    max_connections: u32,
    busy_timeout: Duration,
}

impl Store {
    pub fn builder(path: impl AsRef<Path>) -> StoreBuilder {
        StoreBuilder {
            path: path.as_ref().to_path_buf(),
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Read-only executor over the same database file.
    pub fn executor(&self) -> QueryExecutor {
        QueryExecutor::new(self.read_pool.clone())
    }

    /// Read-write pool, the seam for the ingest collaborator that creates
    /// user tables. Core components other than the introspector never write.
    pub fn write_pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Retries `Locked` failures with a short exponential backoff before
    /// giving up; every other error propagates on the first attempt.
    pub(crate) async fn with_locked_retry<T, F, Fut>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let mut delay = Duration::from_millis(50);
        let mut last = None;
        for _ in 0..3 {
            match op().await {
                Err(StoreError::Locked(reason)) => {
                    tracing::debug!(%reason, "store locked, retrying");
                    last = Some(StoreError::Locked(reason));
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                other => return other,
            }
        }
        Err(last.unwrap_or_else(|| StoreError::Locked("lock retries exhausted".into())))
    }
}

impl StoreBuilder {
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub async fn build(self) -> Result<Store, StoreError> {
        let write_options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .busy_timeout(self.busy_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(write_options)
            .await
            .map_err(map_sqlx_error)?;

        run_migrations(&pool).await?;

        let read_options = SqliteConnectOptions::new()
            .filename(&self.path)
            .read_only(true)
            .busy_timeout(self.busy_timeout);
        let read_pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections.max(2))
            .connect_with(read_options)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Store { pool, read_pool })
    }
}

pub(crate) fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    if matches!(error, sqlx::Error::RowNotFound) {
        return StoreError::NotFound("row not found".into());
    }
    let message = error.to_string();
    let lower = message.to_lowercase();
    if lower.contains("locked") || lower.contains("busy") {
        StoreError::Locked(message)
    } else if lower.contains("constraint") {
        StoreError::Constraint(message)
    } else {
        StoreError::Backend(message)
    }
}
