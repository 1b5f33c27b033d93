//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global subscriber from `[logging]` config
//! - Let `RUST_LOG` override the configured level
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - Requests log through their own span (see `http::request`); the global
//!   subscriber only sees the span tree, never a mutable "current logger"

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Build the level filter, preferring `RUST_LOG` when set.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.level)?),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = env_filter(config)?;
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "rest_template=notalevel".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(env_filter(&config), Err(LoggingError::Filter(_))));
    }

    #[test]
    fn test_configured_level_accepted() {
        let config = LoggingConfig {
            level: "info,rest_template=debug".to_string(),
            ..LoggingConfig::default()
        };
        assert!(env_filter(&config).is_ok());
    }
}
