//! Fault recovery stage.
//!
//! A panicking handler becomes a generic `500`; the panic payload is only
//! logged, inside the request span. The unwind skips the version layers, so
//! the identity headers are stamped here.

use axum::response::Response;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::internal_error_response;
use crate::http::middleware::version;

pub type RecoveryLayer = CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response>;

pub fn layer() -> RecoveryLayer {
    CatchPanicLayer::custom(handle_panic as fn(Box<dyn Any + Send + 'static>) -> Response)
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "Handler panicked, recovered");
    let mut response = internal_error_response();
    version::stamp(response.headers_mut());
    response
}
