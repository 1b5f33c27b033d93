//! Request correlation context.
//!
//! # Responsibilities
//! - Reuse the caller's `X-Request-ID` or generate a UUID v4
//! - Carry the optional `X-Session-ID` alongside it
//! - Derive the per-request logging span from a base span
//!
//! # Design Decisions
//! - The context is immutable once derived and lives in request extensions
//! - The derived span is the request's logger; there is no global logger
//!   to mutate, only the subscriber's root for out-of-request messages

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use std::convert::Infallible;
use tracing::Span;
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_SESSION_ID: HeaderName = HeaderName::from_static("x-session-id");

/// Identifiers threaded through one request's logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    request_id: String,
    session_id: Option<String>,
}

impl CorrelationContext {
    /// Derive a context from the incoming `X-Request-ID` value.
    ///
    /// A non-empty, printable header value is reused verbatim; anything else
    /// gets a fresh UUID v4. Returns the context and the header value to echo.
    pub fn derive(incoming: Option<&HeaderValue>) -> (Self, HeaderValue) {
        if let Some(value) = incoming {
            if let Ok(id) = value.to_str() {
                if !id.is_empty() {
                    let ctx = Self {
                        request_id: id.to_string(),
                        session_id: None,
                    };
                    return (ctx, value.clone());
                }
            }
        }

        let id = Uuid::new_v4().to_string();
        let echo = HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("invalid"));
        let ctx = Self {
            request_id: id,
            session_id: None,
        };
        (ctx, echo)
    }

    /// Derive from request headers, picking up the session id as well.
    pub fn from_headers(headers: &HeaderMap) -> (Self, HeaderValue) {
        let (ctx, echo) = Self::derive(headers.get(X_REQUEST_ID));
        let session = headers.get(X_SESSION_ID).and_then(|v| v.to_str().ok());
        (ctx.with_session(session), echo)
    }

    #[must_use]
    pub fn with_session(mut self, session_id: Option<&str>) -> Self {
        self.session_id = session_id.filter(|s| !s.is_empty()).map(str::to_string);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Child span of `base` carrying the correlation fields.
    pub fn logger_for(&self, base: &Span) -> Span {
        let span = tracing::info_span!(
            parent: base,
            "request",
            request_id = %self.request_id,
            session_id = tracing::field::Empty,
        );
        if let Some(session) = &self.session_id {
            span.record("session_id", session.as_str());
        }
        span
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CorrelationContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CorrelationContext>() {
            Some(ctx) => Ok(ctx.clone()),
            None => Ok(Self::from_headers(&parts.headers).0),
        }
    }
}
