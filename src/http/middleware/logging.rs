//! Access-log stage.
//!
//! Emits one event before the rest of the pipeline runs and one after it
//! returns. Level and body inclusion follow [`AccessLogPolicy`]; field
//! names are fixed:
//! - request: `proto`, `method`, `uri`, `remote`, `user_agent`, `body`
//! - response: `status`, `duration_ms`, `body`

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum::body::HttpBody as _;
use std::net::SocketAddr;
use std::time::Instant;

use crate::config::{AccessLogLevel, LoggingConfig};
use crate::http::interceptor::{BodyCapture, ResponseRecord};

/// Request bodies above this size are never buffered for logging.
pub const MAX_BUFFERED_REQUEST: usize = 1024 * 1024;

const NOT_CAPTURED: &str = "[not captured]";

#[derive(Debug, Clone, Copy)]
pub struct AccessLogPolicy {
    pub level: AccessLogLevel,
    pub log_bodies: bool,
    pub body_limit: usize,
}

impl From<&LoggingConfig> for AccessLogPolicy {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.access_log_level,
            log_bodies: config.log_bodies,
            body_limit: config.body_limit_bytes,
        }
    }
}

impl AccessLogPolicy {
    /// Whether the request body should be buffered for the access log.
    ///
    /// Only when bodies are logged and the access-log level passes the
    /// active subscriber's filter.
    pub fn captures_request_body(&self) -> bool {
        self.log_bodies
            && match self.level {
                AccessLogLevel::Debug => tracing::enabled!(tracing::Level::DEBUG),
                AccessLogLevel::Info => tracing::enabled!(tracing::Level::INFO),
            }
    }
}

macro_rules! access_event {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            AccessLogLevel::Debug => tracing::debug!($($arg)+),
            AccessLogLevel::Info => tracing::info!($($arg)+),
        }
    };
}

pub async fn access_log(
    State(policy): State<AccessLogPolicy>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let (req, request_body) = if policy.captures_request_body() {
        match capture_request_body(req, policy.body_limit).await {
            Ok(captured) => captured,
            Err(response) => return response,
        }
    } else {
        (req, None)
    };

    access_event!(
        policy.level,
        proto = ?req.version(),
        method = %req.method(),
        uri = %req.uri(),
        remote = %remote,
        user_agent = %user_agent,
        body = request_body.as_deref(),
        "Request started"
    );

    let response = next.run(req).await;

    let record = response.extensions().get::<ResponseRecord>();
    let status = record.map_or(response.status(), |r| r.status);
    let response_body = if policy.log_bodies {
        Some(
            record
                .and_then(|r| r.body.as_deref())
                .unwrap_or(NOT_CAPTURED),
        )
    } else {
        None
    };

    access_event!(
        policy.level,
        status = status.as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        body = response_body,
        "Request completed"
    );

    response
}

/// Buffer a bounded request body for logging and hand the bytes back to
/// the handler unchanged. Streaming or oversized bodies are left alone.
async fn capture_request_body(
    req: Request,
    limit: usize,
) -> Result<(Request, Option<String>), Response> {
    let upper = req.body().size_hint().upper();
    match upper {
        Some(0) => Ok((req, None)),
        Some(n) if n as usize <= MAX_BUFFERED_REQUEST => {
            let (parts, body) = req.into_parts();
            let bytes = match axum::body::to_bytes(body, MAX_BUFFERED_REQUEST).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to read request body");
                    return Err(StatusCode::BAD_REQUEST.into_response());
                }
            };
            let mut capture = BodyCapture::new(limit);
            capture.push(&bytes);
            Ok((Request::from_parts(parts, Body::from(bytes)), Some(capture.to_text())))
        }
        _ => Ok((req, Some(NOT_CAPTURED.to_string()))),
    }
}
