//! Redis-backed cache pool.
//!
//! `max_idle` multiplexed `ConnectionManager`s are opened up front and handed
//! out round-robin. Each manager reconnects on its own, so the pool never
//! needs an external lock.

use futures_util::future::BoxFuture;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{CacheStore, StoreError};
use crate::config::CacheConfig;

/// Cache store over a small set of Redis connections.
pub struct RedisCache {
    conns: Vec<ConnectionManager>,
    next: AtomicUsize,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl RedisCache {
    /// Open the pool and verify it with a `PING`.
    pub async fn connect(config: &CacheConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| StoreError::Connect(format!("invalid redis url: {e}")))?;

        let mut conns = Vec::with_capacity(config.max_idle.max(1));
        for _ in 0..config.max_idle.max(1) {
            let conn = bounded(config.connect_timeout(), ConnectionManager::new(client.clone()))
                .await
                .map_err(|e| match e {
                    StoreError::Backend(msg) => StoreError::Connect(msg),
                    other => other,
                })?;
            conns.push(conn);
        }

        let cache = Self {
            conns,
            next: AtomicUsize::new(0),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        };
        cache.ping().await?;

        tracing::info!(
            url = %redact(&config.url),
            connections = cache.conns.len(),
            "Cache pool connected"
        );
        Ok(cache)
    }

    fn conn(&self) -> ConnectionManager {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        self.conns[i].clone()
    }
}

impl CacheStore for RedisCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        Box::pin(async move {
            let mut conn = self.conn();
            bounded(self.read_timeout, conn.get::<_, Option<String>>(key)).await
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut conn = self.conn();
            match ttl {
                Some(ttl) => {
                    let secs = ttl.as_secs().max(1);
                    bounded(self.write_timeout, conn.set_ex::<_, _, ()>(key, value, secs)).await
                }
                None => bounded(self.write_timeout, conn.set::<_, _, ()>(key, value)).await,
            }
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut conn = self.conn();
            let pong: String =
                bounded(self.read_timeout, redis::cmd("PING").query_async(&mut conn)).await?;
            if pong == "PONG" {
                Ok(())
            } else {
                Err(StoreError::Backend(format!("unexpected PING reply: {pong}")))
            }
        })
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StoreError::Backend(e.to_string())),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Strip credentials from a connection URL before logging it.
pub(crate) fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***{}", &url[..scheme], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact() {
        assert_eq!(redact("redis://:secret@cache:6379/0"), "redis://***@cache:6379/0");
        assert_eq!(redact("redis://127.0.0.1:6379"), "redis://127.0.0.1:6379");
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let config = CacheConfig {
            url: "redis://127.0.0.1:1/0".into(),
            max_idle: 1,
            connect_timeout_ms: 200,
            ..CacheConfig::default()
        };
        let result = RedisCache::connect(&config).await;
        assert!(matches!(
            result,
            Err(StoreError::Connect(_)) | Err(StoreError::Timeout(_))
        ));
    }
}
