//! In-process stores backed by `DashMap`.

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{CacheStore, RowStore, StoreError, UserRow};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| at > Instant::now())
    }
}

/// A thread-safe cache with per-key expiry.
#[derive(Clone, Default)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time-to-live of a key, if it has one and is still live.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.inner.get(key)?;
        entry
            .expires_at
            .and_then(|at| at.checked_duration_since(Instant::now()))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.iter().filter(|e| e.value().is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        Box::pin(async move {
            let value = match self.inner.get(key) {
                Some(entry) if entry.is_live() => Some(entry.value.clone()),
                Some(_) => None,
                None => return Ok(None),
            };
            if value.is_none() {
                self.inner.remove_if(key, |_, e| !e.is_live());
            }
            Ok(value)
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.inner.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: ttl.map(|t| Instant::now() + t),
                },
            );
            Ok(())
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async { Ok(()) })
    }
}

/// A fixed set of user rows.
#[derive(Clone, Default)]
pub struct MemoryRows {
    users: Arc<DashMap<String, UserRow>>,
}

impl MemoryRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: UserRow) {
        self.users.insert(row.id.clone(), row);
    }
}

impl RowStore for MemoryRows {
    fn get_user<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<UserRow>, StoreError>> {
        Box::pin(async move { Ok(self.users.get(id).map(|r| r.value().clone())) })
    }
}
