//! Lifecycle orchestration.
//!
//! # Responsibilities
//! - Start the metrics/health listener (best effort)
//! - Acquire the cache pool and relational store (fatal on failure)
//! - Bind the main listener and serve the request pipeline
//! - Run the heartbeat while `Running`
//! - On the shutdown signal: mark `Draining`, stop accepting, drain within
//!   the shutdown timeout, stop the heartbeat, release resources
//!
//! # Design Decisions
//! - `Draining` is published before the shutdown broadcast, so neither the
//!   heartbeat nor the accept loop can start new work after it
//! - Fatal failures move straight to `Stopped` and surface as
//!   [`LifecycleError`]

use axum::Router;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ServiceConfig;
use crate::http::middleware;
use crate::http::{DrainOutcome, HttpServer};
use crate::lifecycle::heartbeat::Heartbeat;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::state::{LifecycleState, StateCell};
use crate::observability::metrics;
use crate::store::{ResourceConnector, Resources, StoreError};

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cache pool unavailable: {0}")]
    Cache(StoreError),

    #[error("relational store unavailable: {0}")]
    Database(StoreError),

    #[error("failed to bind listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// Observes a running [`LifecycleManager`].
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    state: StateCell,
    local_addr: Arc<OnceLock<SocketAddr>>,
}

impl LifecycleHandle {
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Wait until the manager reaches `target` or any later state.
    pub async fn reached(&self, target: LifecycleState) -> LifecycleState {
        self.state.reached(target).await
    }

    /// Address of the main listener, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }
}

pub struct LifecycleManager {
    config: ServiceConfig,
    state: StateCell,
    shutdown: Shutdown,
    local_addr: Arc<OnceLock<SocketAddr>>,
}

impl LifecycleManager {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            state: StateCell::new(),
            shutdown: Shutdown::new(),
            local_addr: Arc::new(OnceLock::new()),
        }
    }

    pub fn handle(&self) -> LifecycleHandle {
        LifecycleHandle {
            state: self.state.clone(),
            local_addr: self.local_addr.clone(),
        }
    }

    /// Run to completion.
    ///
    /// `routes` builds the application router from the acquired resources;
    /// `signal` resolves once when shutdown should begin.
    pub async fn run<C, F, S>(self, connector: C, routes: F, signal: S) -> Result<(), LifecycleError>
    where
        C: ResourceConnector,
        F: FnOnce(Resources) -> Router + Send,
        S: Future<Output = ()> + Send + 'static,
    {
        self.state.advance(LifecycleState::ResourcesStarting);
        let metrics_task = self.spawn_metrics_listener();
        let result = self.serve(connector, routes, signal).await;

        if let Some(task) = metrics_task {
            task.abort();
        }
        if let Err(err) = &result {
            tracing::error!(error = %err, "Fatal lifecycle error");
        }
        self.state.advance(LifecycleState::Stopped);
        result
    }

    async fn serve<C, F, S>(&self, connector: C, routes: F, signal: S) -> Result<(), LifecycleError>
    where
        C: ResourceConnector,
        F: FnOnce(Resources) -> Router + Send,
        S: Future<Output = ()> + Send + 'static,
    {
        let (cache, rows) = tokio::join!(connector.connect_cache(), connector.connect_database());
        let cache = cache.map_err(LifecycleError::Cache)?;
        let rows = rows.map_err(LifecycleError::Database)?;
        tracing::info!("Backing resources acquired");
        let resources = Resources { cache, rows };

        let app = middleware::apply(routes(resources.clone()), &self.config);

        let address = self.config.listener.bind_address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| LifecycleError::Bind {
                address: address.clone(),
                source,
            })?;
        if let Ok(addr) = listener.local_addr() {
            let _ = self.local_addr.set(addr);
            tracing::info!(address = %addr, "Listening for connections");
        }

        let heartbeat_task = self.config.heartbeat.enabled.then(|| {
            let heartbeat = Heartbeat::new(
                resources.cache.clone(),
                self.config.heartbeat.clone(),
                self.state.clone(),
            );
            tokio::spawn(heartbeat.run(self.shutdown.subscribe()))
        });

        let server_shutdown = self.shutdown.subscribe();
        let signal_task = {
            let state = self.state.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                signal.await;
                state.advance(LifecycleState::Draining);
                shutdown.trigger();
            })
        };

        self.state.advance(LifecycleState::Running);
        let server = HttpServer::new(app, self.config.timeouts.shutdown())
            .with_lifecycle(self.state.clone());
        match server.run(listener, server_shutdown).await {
            DrainOutcome::Graceful => tracing::info!("All connections drained"),
            DrainOutcome::Forced { aborted } => {
                tracing::warn!(aborted, "Degraded shutdown: in-flight requests were cut off");
            }
        }

        signal_task.abort();
        if let Some(task) = heartbeat_task {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "Heartbeat task ended abnormally");
            }
        }

        drop(resources);
        tracing::info!("Backing resources released");
        Ok(())
    }

    fn spawn_metrics_listener(&self) -> Option<JoinHandle<()>> {
        if !self.config.metrics.enabled {
            return None;
        }

        let addr: SocketAddr = match self.config.metrics.bind_address.parse() {
            Ok(addr) => addr,
            Err(err) => {
                tracing::warn!(
                    address = %self.config.metrics.bind_address,
                    error = %err,
                    "Invalid metrics address, metrics listener disabled"
                );
                return None;
            }
        };

        let handle = match metrics::install_recorder() {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(error = %err, "Metrics recorder unavailable, metrics listener disabled");
                return None;
            }
        };

        Some(tokio::spawn(async move {
            if let Err(err) = metrics::serve(addr, handle).await {
                tracing::warn!(error = %err, "Metrics listener stopped");
            }
        }))
    }
}
