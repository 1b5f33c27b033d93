//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. All violations are reported, not just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// A single semantic violation in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("metrics.bind_address must differ from listener.bind_address")]
    AddressConflict,

    #[error("heartbeat.ttl_secs ({ttl}) must be at least heartbeat.interval_secs ({interval})")]
    HeartbeatTtl { ttl: u64, interval: u64 },
}

/// Validate a configuration, returning every violation found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.metrics.enabled {
        check_address(&mut errors, "metrics.bind_address", &config.metrics.bind_address);
        if config.metrics.bind_address == config.listener.bind_address {
            errors.push(ValidationError::AddressConflict);
        }
    }

    let positive: [(&'static str, u64); 7] = [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.shutdown_secs", config.timeouts.shutdown_secs),
        ("heartbeat.interval_secs", config.heartbeat.interval_secs),
        ("heartbeat.timeout_ms", config.heartbeat.timeout_ms),
        ("cache.connect_timeout_ms", config.cache.connect_timeout_ms),
        ("cache.read_timeout_ms", config.cache.read_timeout_ms),
        ("cache.write_timeout_ms", config.cache.write_timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    if config.cache.max_idle == 0 {
        errors.push(ValidationError::Zero { field: "cache.max_idle" });
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "database.max_connections" });
    }
    if config.logging.body_limit_bytes == 0 {
        errors.push(ValidationError::Zero { field: "logging.body_limit_bytes" });
    }

    let hb = &config.heartbeat;
    if hb.interval_secs > 0 && hb.ttl_secs < hb.interval_secs {
        errors.push(ValidationError::HeartbeatTtl {
            ttl: hb.ttl_secs,
            interval: hb.interval_secs,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
