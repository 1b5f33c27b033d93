//! Backing store collaborators.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ResourceConnector → connect cache pool (fatal on failure)
//!                       → connect relational pool (fatal on failure)
//!
//! Requests / heartbeat:
//!     handlers  → CacheStore / RowStore (pool handles concurrency)
//!     heartbeat → CacheStore::set (non-fatal on failure)
//! ```
//!
//! # Design Decisions
//! - Traits return boxed futures so stores can be shared as `Arc<dyn _>`
//! - The lifecycle layer never locks a store; pools synchronise themselves
//! - Query semantics stay behind these narrow interfaces

pub mod memory;
pub mod postgres;
pub mod redis;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{CacheConfig, DatabaseConfig};

pub use self::memory::{MemoryCache, MemoryRows};
pub use self::postgres::PgRowStore;
pub use self::redis::RedisCache;

/// Errors from store collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Key-value cache exposing get/set by key.
pub trait CacheStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>>;

    /// Store `value` under `key`, expiring after `ttl` when given.
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub name: String,
}

/// Relational store exposing single-row lookups by id.
pub trait RowStore: Send + Sync {
    fn get_user<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<UserRow>, StoreError>>;
}

/// Shared handles to the acquired backing resources.
#[derive(Clone)]
pub struct Resources {
    pub cache: Arc<dyn CacheStore>,
    pub rows: Arc<dyn RowStore>,
}

/// Acquires the backing resources at startup.
pub trait ResourceConnector: Send + Sync {
    fn connect_cache(&self) -> BoxFuture<'_, Result<Arc<dyn CacheStore>, StoreError>>;

    fn connect_database(&self) -> BoxFuture<'_, Result<Arc<dyn RowStore>, StoreError>>;
}

/// Production connector: Redis cache pool and Postgres pool.
pub struct BackendConnector {
    cache: CacheConfig,
    database: DatabaseConfig,
}

impl BackendConnector {
    pub fn new(cache: CacheConfig, database: DatabaseConfig) -> Self {
        Self { cache, database }
    }
}

impl ResourceConnector for BackendConnector {
    fn connect_cache(&self) -> BoxFuture<'_, Result<Arc<dyn CacheStore>, StoreError>> {
        Box::pin(async move {
            let cache = RedisCache::connect(&self.cache).await?;
            Ok(Arc::new(cache) as Arc<dyn CacheStore>)
        })
    }

    fn connect_database(&self) -> BoxFuture<'_, Result<Arc<dyn RowStore>, StoreError>> {
        Box::pin(async move {
            let rows = PgRowStore::connect(&self.database).await?;
            Ok(Arc::new(rows) as Arc<dyn RowStore>)
        })
    }
}
