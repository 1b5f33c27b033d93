//! Metrics stage.
//!
//! Times everything inside it and records one [`MetricSample`] using the
//! status the interceptor finalized.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::http::interceptor::ResponseRecord;
use crate::observability::metrics::MetricSample;

pub async fn track(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let route = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => req.uri().path().to_string(),
    };

    let response = next.run(req).await;

    let status = response
        .extensions()
        .get::<ResponseRecord>()
        .map_or(response.status(), |r| r.status);
    MetricSample::new(&method, &route, status, start.elapsed()).record();

    response
}
