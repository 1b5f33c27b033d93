//! Version header stage.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::version::{REVISION, VERSION};

pub const X_API_VERSION: HeaderName = HeaderName::from_static("x-api-version");
pub const X_API_REVISION: HeaderName = HeaderName::from_static("x-api-revision");

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

pub fn version_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(X_API_VERSION, header_value(VERSION))
}

pub fn revision_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(X_API_REVISION, header_value(REVISION))
}

/// Stamp both identity headers on a response built outside the version
/// layers (the recovered-panic path).
pub fn stamp(headers: &mut HeaderMap) {
    headers.insert(X_API_VERSION, header_value(VERSION));
    headers.insert(X_API_REVISION, header_value(REVISION));
}
