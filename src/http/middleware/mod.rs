//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! Request
//!     → correlation.rs (X-Request-ID, request span)
//!     → recovery.rs    (panic → generic 500)
//!     → logging.rs     (access log, pre)
//!     → metrics.rs     (timer start)
//!     → version.rs     (X-API-Version / X-API-Revision)
//!     → request timeout
//!     → capture.rs     (interceptor: status + bounded body)
//!     → route dispatch
//! Response unwinds in reverse order.
//! ```
//!
//! # Design Decisions
//! - Applied with `Router::layer`, so the matched route pattern is visible
//!   to the metrics stage
//! - Every stage is a plain async fn or a tower-http layer

pub mod capture;
pub mod correlation;
pub mod logging;
pub mod metrics;
pub mod recovery;
pub mod version;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServiceConfig;

pub use capture::CaptureLimit;
pub use logging::AccessLogPolicy;
pub use version::{X_API_REVISION, X_API_VERSION};

/// Wrap `router` in the full request pipeline.
#[allow(deprecated)]
pub fn apply(router: Router, config: &ServiceConfig) -> Router {
    let policy = AccessLogPolicy::from(&config.logging);
    let limit = CaptureLimit(config.logging.body_limit_bytes);

    router.layer(
        ServiceBuilder::new()
            .layer(from_fn(correlation::correlate))
            .layer(recovery::layer())
            .layer(from_fn_with_state(policy, logging::access_log))
            .layer(from_fn(metrics::track))
            .layer(version::version_layer())
            .layer(version::revision_layer())
            .layer(TimeoutLayer::new(config.timeouts.request()))
            .layer(from_fn_with_state(limit, capture::capture)),
    )
}
