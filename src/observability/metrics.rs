//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Record one sample per completed request
//! - Derive stable route labels from matched patterns or raw paths
//! - Serve the Prometheus scrape and health endpoints on their own port
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by status
//! - `http_request_duration_seconds` (histogram): latency by method, path, status
//!
//! # Design Decisions
//! - The Prometheus recorder is installed once per process; later calls
//!   reuse the same handle
//! - Histogram buckets are the Prometheus client defaults

use axum::{extract::State, http::Method, http::StatusCode, routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";

/// Prometheus default latency buckets, in seconds.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to install metrics recorder: {0}")]
    Install(String),

    #[error("failed to bind metrics listener: {0}")]
    Bind(#[from] io::Error),
}

/// One completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub method: String,
    pub route: String,
    pub status: u16,
    pub duration: Duration,
}

impl MetricSample {
    /// Build a sample; `route` is the matched pattern or the raw path.
    pub fn new(method: &Method, route: &str, status: StatusCode, duration: Duration) -> Self {
        Self {
            method: method.as_str().to_string(),
            route: route_label(route),
            status: status.as_u16(),
            duration,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Emit to whichever recorder is current.
    pub fn record(&self) {
        let status = self.status.to_string();
        counter!(REQUESTS_TOTAL, "status" => status.clone()).increment(1);
        histogram!(
            REQUEST_DURATION,
            "method" => self.method.clone(),
            "path" => self.route.clone(),
            "status" => status,
        )
        .record(self.duration_seconds());
    }
}

/// Sanitize a route pattern or path into a label.
///
/// Runs of non-alphanumeric characters collapse to `_`, the result is
/// lower-cased and trimmed of `_`, and an empty result becomes `root`.
pub fn route_label(raw: &str) -> String {
    let mut label = String::with_capacity(raw.len());
    let mut in_run = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
            in_run = false;
        } else if !in_run {
            label.push('_');
            in_run = true;
        }
    }

    let trimmed = label.trim_matches('_');
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Register metric descriptions with the current recorder.
pub fn describe() {
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests");
    describe_histogram!(
        REQUEST_DURATION,
        Unit::Seconds,
        "HTTP request duration in seconds"
    );
}

/// Prometheus builder with the request-duration buckets applied.
pub fn builder() -> Result<PrometheusBuilder, MetricsError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), &DEFAULT_BUCKETS)
        .map_err(|e| MetricsError::Install(e.to_string()))
}

static HANDLE: OnceLock<Result<PrometheusHandle, String>> = OnceLock::new();

/// Install the global recorder, or return the already-installed handle.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    HANDLE
        .get_or_init(|| {
            let handle = builder()
                .map_err(|e| e.to_string())?
                .install_recorder()
                .map_err(|e| e.to_string())?;
            describe();
            Ok(handle)
        })
        .clone()
        .map_err(MetricsError::Install)
}

/// Router serving `/metrics` and `/healthz`.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render))
        .route("/healthz", get(healthz))
        .with_state(handle)
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

async fn healthz() -> &'static str {
    "OK"
}

/// Serve the metrics listener until the task is dropped.
pub async fn serve(addr: SocketAddr, handle: PrometheusHandle) -> Result<(), MetricsError> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Metrics listener started");

    let server = axum::serve(listener, router(handle.clone()));
    tokio::select! {
        result = server.into_future() => result?,
        _ = upkeep(handle) => {}
    }
    Ok(())
}

async fn upkeep(handle: PrometheusHandle) {
    let mut ticker = tokio::time::interval(UPKEEP_INTERVAL);
    loop {
        ticker.tick().await;
        handle.run_upkeep();
    }
}
