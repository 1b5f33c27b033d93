//! Buffered response writer backing every intercepted response.
//!
//! # Responsibilities
//! - Collect status, headers and body written through [`ResponseWriter`]
//! - Turn the result back into an axum [`Response`]
//!
//! # Design Decisions
//! - Supports `Flush` (cuts a body frame) and `TakeBytesFrom` (owned
//!   buffers become frames without copying)
//! - No connection handle lives here, so `Hijack`, `Push` and
//!   `NotifyClose` are not offered; upgrade responses bypass the sink

use axum::body::Body;
use axum::http::{Extensions, HeaderMap, StatusCode, Version};
use axum::response::Response;
use bytes::Bytes;
use futures_util::stream;
use std::convert::Infallible;
use std::io;

use crate::http::writer::{Flusher, ResponseWriter, TakeBytesFrom, WriterError};

#[derive(Debug, Default)]
pub struct ResponseSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    pending: Vec<u8>,
    frames: Vec<Bytes>,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn cut_frame(&mut self) {
        if !self.pending.is_empty() {
            self.frames.push(Bytes::from(std::mem::take(&mut self.pending)));
        }
    }

    /// Build the outbound response, carrying over version and extensions.
    pub fn into_response(mut self, version: Version, extensions: Extensions) -> Response {
        self.cut_frame();
        let body = match self.frames.len() {
            0 => Body::empty(),
            1 => Body::from(self.frames.remove(0)),
            _ => Body::from_stream(stream::iter(
                self.frames.into_iter().map(Ok::<_, Infallible>),
            )),
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        *response.version_mut() = version;
        *response.extensions_mut() = extensions;
        response
    }
}

impl ResponseWriter for ResponseSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        // Superfluous calls are ignored, as on the wire.
        self.status.get_or_insert(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.status.get_or_insert(StatusCode::OK);
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }

    fn as_bytes_taker(&mut self) -> Option<&mut dyn TakeBytesFrom> {
        Some(self)
    }
}

impl Flusher for ResponseSink {
    fn flush(&mut self) -> Result<(), WriterError> {
        self.cut_frame();
        Ok(())
    }
}

impl TakeBytesFrom for ResponseSink {
    fn take_bytes_from(&mut self, bytes: Bytes) -> Result<usize, WriterError> {
        self.status.get_or_insert(StatusCode::OK);
        self.cut_frame();
        let n = bytes.len();
        if n > 0 {
            self.frames.push(bytes);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::writer::{probe, Capability, CapabilitySet};

    #[test]
    fn test_sink_capabilities() {
        let mut sink = ResponseSink::new();
        assert_eq!(
            probe(&mut sink),
            CapabilitySet::EMPTY
                .with(Capability::Flush)
                .with(Capability::TakeBytesFrom)
        );
    }

    #[tokio::test]
    async fn test_sink_builds_response() {
        let mut sink = ResponseSink::new();
        sink.headers_mut()
            .insert("content-type", "text/plain".parse().unwrap());
        sink.write_header(StatusCode::CREATED);
        sink.write_header(StatusCode::OK);
        sink.write(b"hello ").unwrap();
        sink.flush().unwrap();
        sink.take_bytes_from(Bytes::from_static(b"world")).unwrap();

        let response = sink.into_response(Version::HTTP_11, Extensions::new());
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["content-type"], "text/plain");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[test]
    fn test_empty_sink_defaults_to_ok() {
        let response = ResponseSink::new().into_response(Version::HTTP_11, Extensions::new());
        assert_eq!(response.status(), StatusCode::OK);
    }
}
