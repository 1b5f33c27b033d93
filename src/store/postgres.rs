//! Postgres-backed row store.

use futures_util::future::BoxFuture;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::{RowStore, StoreError, UserRow};
use crate::config::DatabaseConfig;
use crate::store::redis::redact;

/// Row store over a `sqlx` connection pool.
#[derive(Clone)]
pub struct PgRowStore {
    pool: PgPool,
}

impl PgRowStore {
    /// Open the pool; `connect` establishes and checks one connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        tracing::info!(
            url = %redact(&config.url),
            max_connections = config.max_connections,
            "Database pool connected"
        );
        Ok(Self { pool })
    }
}

impl RowStore for PgRowStore {
    fn get_user<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<UserRow>, StoreError>> {
        Box::pin(async move {
            let row: Option<(String, String)> =
                sqlx::query_as("SELECT id, name FROM users WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| StoreError::Backend(format!("get user {id}: {e}")))?;
            Ok(row.map(|(id, name)| UserRow { id, name }))
        })
    }
}
