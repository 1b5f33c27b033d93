//! Response capture stage, innermost around dispatch.
//!
//! Replays the handler's response through an [`Interceptor`] over a
//! [`ResponseSink`] and attaches the resulting [`ResponseRecord`] for the
//! logging and metrics stages.
//!
//! Protocol switches and bodies of unbounded size are passed through
//! untouched; only their status is recorded.

use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use axum::body::HttpBody as _;

use crate::error::internal_error_response;
use crate::http::interceptor::{Interceptor, ResponseRecord};
use crate::http::response::ResponseSink;
use crate::http::writer::{ResponseWriter, TakeBytesFrom, WriterError};

/// Cap on captured response body bytes.
#[derive(Debug, Clone, Copy)]
pub struct CaptureLimit(pub usize);

pub async fn capture(State(CaptureLimit(limit)): State<CaptureLimit>, req: Request, next: Next) -> Response {
    let upgrade = req.method() == Method::CONNECT || req.headers().contains_key(header::UPGRADE);
    let response = next.run(req).await;

    if upgrade
        || response.status() == StatusCode::SWITCHING_PROTOCOLS
        || response.body().size_hint().upper().is_none()
    {
        return passthrough(response);
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "Failed to buffer response body");
            return passthrough(internal_error_response());
        }
    };

    let mut interceptor = Interceptor::new(ResponseSink::new(), limit);
    *interceptor.headers_mut() = parts.headers;
    interceptor.write_header(parts.status);
    match interceptor.take_bytes_from(bytes.clone()) {
        Ok(_) => {}
        Err(WriterError::Unsupported(_)) => {
            if let Err(err) = interceptor.write(&bytes) {
                tracing::error!(error = %err, "Failed to replay response body");
            }
        }
        Err(err) => tracing::error!(error = %err, "Failed to replay response body"),
    }

    let record = interceptor.record();
    let mut response = interceptor
        .into_inner()
        .into_response(parts.version, parts.extensions);
    response.extensions_mut().insert(record);
    response
}

fn passthrough(mut response: Response) -> Response {
    let record = ResponseRecord::passthrough(response.status());
    response.extensions_mut().insert(record);
    response
}
