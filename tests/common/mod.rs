//! Shared fixtures for integration tests.
#![allow(dead_code)]

use axum::Router;
use futures_util::future::BoxFuture;
use rest_template::config::ServiceConfig;
use rest_template::lifecycle::{LifecycleError, LifecycleHandle, LifecycleManager, LifecycleState};
use rest_template::store::{
    CacheStore, MemoryCache, MemoryRows, ResourceConnector, Resources, RowStore, StoreError, UserRow,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Config for in-process tests: ephemeral port, no metrics listener,
/// fast heartbeat.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.metrics.enabled = false;
    config.heartbeat.interval_secs = 1;
    config.heartbeat.timeout_ms = 200;
    config.heartbeat.instance_id = "test-node".to_string();
    config.timeouts.shutdown_secs = 5;
    config
}

pub fn alice() -> UserRow {
    UserRow {
        id: "1".to_string(),
        name: "alice".to_string(),
    }
}

/// In-memory resources seeded with user `1`.
pub fn memory_resources() -> (Resources, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let rows = MemoryRows::new();
    rows.insert(alice());
    let resources = Resources {
        cache: cache.clone(),
        rows: Arc::new(rows),
    };
    (resources, cache)
}

/// Hands out pre-built stores, or fails the chosen connection.
pub struct StaticConnector {
    cache: Arc<dyn CacheStore>,
    rows: Arc<dyn RowStore>,
    fail_cache: bool,
    fail_database: bool,
}

impl StaticConnector {
    pub fn new(resources: Resources) -> Self {
        Self {
            cache: resources.cache,
            rows: resources.rows,
            fail_cache: false,
            fail_database: false,
        }
    }

    pub fn failing_cache(mut self) -> Self {
        self.fail_cache = true;
        self
    }

    pub fn failing_database(mut self) -> Self {
        self.fail_database = true;
        self
    }
}

impl ResourceConnector for StaticConnector {
    fn connect_cache(&self) -> BoxFuture<'_, Result<Arc<dyn CacheStore>, StoreError>> {
        Box::pin(async move {
            if self.fail_cache {
                return Err(StoreError::Connect("connection refused".into()));
            }
            Ok(self.cache.clone())
        })
    }

    fn connect_database(&self) -> BoxFuture<'_, Result<Arc<dyn RowStore>, StoreError>> {
        Box::pin(async move {
            if self.fail_database {
                return Err(StoreError::Connect("connection refused".into()));
            }
            Ok(self.rows.clone())
        })
    }
}

/// Cache whose every operation fails, as if the server went away after
/// startup.
pub struct UnreachableCache;

impl CacheStore for UnreachableCache {
    fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        Box::pin(async { Err(StoreError::Connect("connection refused".into())) })
    }

    fn set<'a>(
        &'a self,
        _key: &'a str,
        _value: &'a str,
        _ttl: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async { Err(StoreError::Connect("connection refused".into())) })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async { Err(StoreError::Connect("connection refused".into())) })
    }
}

/// Row store whose lookups always fail.
pub struct FailingRows;

impl RowStore for FailingRows {
    fn get_user<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<Option<UserRow>, StoreError>> {
        Box::pin(async { Err(StoreError::Backend("connection reset".into())) })
    }
}

/// A manager running in the background.
pub struct Running {
    pub handle: LifecycleHandle,
    pub addr: SocketAddr,
    pub stop: oneshot::Sender<()>,
    pub task: JoinHandle<Result<(), LifecycleError>>,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Send the shutdown signal and wait for the manager to finish.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        let _ = self.stop.send(());
        self.task.await.expect("manager task panicked")
    }
}

/// Start a manager and wait until it is serving.
pub async fn start<F>(config: ServiceConfig, connector: StaticConnector, routes: F) -> Running
where
    F: FnOnce(Resources) -> Router + Send + 'static,
{
    let manager = LifecycleManager::new(config);
    let handle = manager.handle();
    let (stop, stopped) = oneshot::channel::<()>();

    let task = tokio::spawn(manager.run(connector, routes, async move {
        let _ = stopped.await;
    }));

    let state = handle.reached(LifecycleState::Running).await;
    assert_eq!(state, LifecycleState::Running, "manager failed to start");
    let addr = handle.local_addr().expect("listener bound");

    Running {
        handle,
        addr,
        stop,
        task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
