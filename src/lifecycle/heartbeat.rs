//! Liveness heartbeat.
//!
//! # Responsibilities
//! - Periodically write `heartbeat:<instance_id>` into the cache with an expiry
//! - Stop on the shutdown broadcast, or as soon as draining has begun
//!
//! # Design Decisions
//! - Each write is bounded by a timeout; failures are warnings, never fatal
//! - Shutdown wins over a due tick (biased select)

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HeartbeatConfig;
use crate::lifecycle::state::{LifecycleState, StateCell};
use crate::store::{CacheStore, StoreError};
use crate::version::{REVISION, VERSION};

/// Value stored under the heartbeat key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub instance: String,
    pub version: String,
    pub revision: String,
    /// Unix seconds.
    pub timestamp: u64,
}

impl HeartbeatRecord {
    pub fn now(instance: &str) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            instance: instance.to_string(),
            version: VERSION.to_string(),
            revision: REVISION.to_string(),
            timestamp,
        }
    }
}

pub fn heartbeat_key(instance: &str) -> String {
    format!("heartbeat:{instance}")
}

pub struct Heartbeat {
    cache: Arc<dyn CacheStore>,
    config: HeartbeatConfig,
    state: StateCell,
}

impl Heartbeat {
    pub fn new(cache: Arc<dyn CacheStore>, config: HeartbeatConfig, state: StateCell) -> Self {
        Self {
            cache,
            config,
            state,
        }
    }

    /// Write one liveness marker.
    pub async fn beat(&self) -> Result<(), StoreError> {
        let record = HeartbeatRecord::now(&self.config.instance_id);
        let value = serde_json::to_string(&record).map_err(|e| StoreError::Backend(e.to_string()))?;
        let key = heartbeat_key(&self.config.instance_id);

        let timeout = self.config.timeout();
        match time::timeout(timeout, self.cache.set(&key, &value, Some(self.config.ttl()))).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout)),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            instance = %self.config.instance_id,
            "Heartbeat starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    break;
                }
                _ = ticker.tick() => {
                    if self.state.get() >= LifecycleState::Draining {
                        break;
                    }
                    match self.beat().await {
                        Ok(()) => tracing::debug!("Heartbeat written"),
                        Err(err) => tracing::warn!(error = %err, "Heartbeat write failed"),
                    }
                }
            }
        }

        tracing::info!("Heartbeat stopped");
    }
}
