//! Handler-level errors and the generic error body.
//!
//! Clients only ever see [`ErrorBody::internal`]; the underlying cause is
//! logged inside the request span.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// Error code returned for any internal failure.
pub const INTERNAL_ERROR_CODE: u32 = 10001;

/// JSON body sent on server errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u32,
    pub message: String,
}

impl ErrorBody {
    pub fn internal() -> Self {
        Self {
            code: INTERNAL_ERROR_CODE,
            message: "Internal server error".to_string(),
        }
    }
}

/// Generic `500` response with no internal detail.
pub fn internal_error_response() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::internal())).into_response()
}

/// Errors raised by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");
        internal_error_response()
    }
}
