//! Correlation stage.
//!
//! Derives the [`CorrelationContext`], stores it in request extensions,
//! runs the rest of the pipeline inside the request span and echoes
//! `X-Request-ID` on every response.

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{Instrument, Span};

use crate::http::request::{CorrelationContext, X_REQUEST_ID};

pub async fn correlate(mut req: Request, next: Next) -> Response {
    let (ctx, echo) = CorrelationContext::from_headers(req.headers());
    let span = ctx.logger_for(&Span::current());
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(X_REQUEST_ID, echo);
    response
}
