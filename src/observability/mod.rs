//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → correlation span (request_id, session_id) wraps the whole pipeline
//!     → access log events inside that span (logging.rs subscriber)
//!     → one MetricSample per completed request (metrics.rs)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape on the metrics listener
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every event of a request via its span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
