//! Capability-preserving response interceptor.
//!
//! Wraps a [`ResponseWriter`] for one request to record the status code
//! (first write wins) and keep a bounded copy of the body for logging.
//!
//! The wrapped writer's capabilities are probed once at construction and
//! stored as a [`CapabilitySet`]. The interceptor advertises exactly that
//! set through its own `as_*` probes; calling a capability the underlying
//! writer lacks returns [`WriterError::Unsupported`].

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use hyper::upgrade::OnUpgrade;
use std::io;

use crate::http::writer::{
    probe, Capability, CapabilitySet, CloseNotifier, CloseNotify, Flusher, Hijacker, Pusher,
    ResponseWriter, TakeBytesFrom, WriterError,
};

/// Appended to a captured body that exceeded its limit.
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// A bounded copy of body bytes.
#[derive(Debug, Clone)]
pub struct BodyCapture {
    buf: Vec<u8>,
    limit: usize,
    total: usize,
}

impl BodyCapture {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            total: 0,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.total += bytes.len();
        let room = self.limit.saturating_sub(self.buf.len());
        self.buf.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    /// Bytes seen, including those beyond the limit.
    pub fn total_bytes(&self) -> usize {
        self.total
    }

    pub fn is_truncated(&self) -> bool {
        self.total > self.buf.len()
    }

    /// Captured bytes as text, with the truncation marker when cut short.
    pub fn to_text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.buf).into_owned();
        if self.is_truncated() {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// Per-request interception state.
#[derive(Debug, Clone)]
pub struct InterceptorState {
    pub status: StatusCode,
    pub recorded: bool,
    pub body: BodyCapture,
}

/// What the interceptor saw, attached to the response for outer stages.
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub status: StatusCode,
    /// Captured body text; `None` when the body was streamed untouched.
    pub body: Option<String>,
    pub capabilities: CapabilitySet,
}

impl ResponseRecord {
    /// Record for a response that was passed through without interception.
    pub fn passthrough(status: StatusCode) -> Self {
        Self {
            status,
            body: None,
            capabilities: CapabilitySet::EMPTY,
        }
    }
}

/// Response writer wrapper that records status and body.
pub struct Interceptor<W> {
    inner: W,
    caps: CapabilitySet,
    state: InterceptorState,
}

impl<W: ResponseWriter> Interceptor<W> {
    pub fn new(mut inner: W, body_limit: usize) -> Self {
        let caps = probe(&mut inner);
        Self {
            inner,
            caps,
            state: InterceptorState {
                status: StatusCode::OK,
                recorded: false,
                body: BodyCapture::new(body_limit),
            },
        }
    }

    /// Capabilities of the wrapped writer, as probed at construction.
    pub fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    pub fn state(&self) -> &InterceptorState {
        &self.state
    }

    pub fn record(&self) -> ResponseRecord {
        ResponseRecord {
            status: self.state.status,
            body: Some(self.state.body.to_text()),
            capabilities: self.caps,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn require(&self, cap: Capability) -> Result<(), WriterError> {
        if self.caps.contains(cap) {
            Ok(())
        } else {
            Err(WriterError::Unsupported(cap))
        }
    }

    fn record_status(&mut self, status: StatusCode) {
        if !self.state.recorded {
            self.state.status = status;
            self.state.recorded = true;
        }
    }
}

impl<W: ResponseWriter> ResponseWriter for Interceptor<W> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.record_status(status);
        self.inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A body write commits an implicit 200 head.
        self.record_status(StatusCode::OK);
        self.state.body.push(buf);
        self.inner.write(buf)
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        self.caps.contains(Capability::Flush).then_some(self as &mut dyn Flusher)
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        self.caps.contains(Capability::Hijack).then_some(self as &mut dyn Hijacker)
    }

    fn as_pusher(&mut self) -> Option<&mut dyn Pusher> {
        self.caps.contains(Capability::Push).then_some(self as &mut dyn Pusher)
    }

    fn as_bytes_taker(&mut self) -> Option<&mut dyn TakeBytesFrom> {
        self.caps
            .contains(Capability::TakeBytesFrom)
            .then_some(self as &mut dyn TakeBytesFrom)
    }

    fn as_close_notifier(&mut self) -> Option<&mut dyn CloseNotifier> {
        self.caps
            .contains(Capability::NotifyClose)
            .then_some(self as &mut dyn CloseNotifier)
    }
}

impl<W: ResponseWriter> Flusher for Interceptor<W> {
    fn flush(&mut self) -> Result<(), WriterError> {
        self.require(Capability::Flush)?;
        match self.inner.as_flusher() {
            Some(f) => f.flush(),
            None => Err(WriterError::Unsupported(Capability::Flush)),
        }
    }
}

impl<W: ResponseWriter> Hijacker for Interceptor<W> {
    fn hijack(&mut self) -> Result<OnUpgrade, WriterError> {
        self.require(Capability::Hijack)?;
        match self.inner.as_hijacker() {
            Some(h) => h.hijack(),
            None => Err(WriterError::Unsupported(Capability::Hijack)),
        }
    }
}

impl<W: ResponseWriter> Pusher for Interceptor<W> {
    fn push(&mut self, target: &str, headers: &HeaderMap) -> Result<(), WriterError> {
        self.require(Capability::Push)?;
        match self.inner.as_pusher() {
            Some(p) => p.push(target, headers),
            None => Err(WriterError::Unsupported(Capability::Push)),
        }
    }
}

impl<W: ResponseWriter> TakeBytesFrom for Interceptor<W> {
    fn take_bytes_from(&mut self, bytes: Bytes) -> Result<usize, WriterError> {
        self.require(Capability::TakeBytesFrom)?;
        self.record_status(StatusCode::OK);
        self.state.body.push(&bytes);
        match self.inner.as_bytes_taker() {
            Some(t) => t.take_bytes_from(bytes),
            None => Err(WriterError::Unsupported(Capability::TakeBytesFrom)),
        }
    }
}

impl<W: ResponseWriter> CloseNotifier for Interceptor<W> {
    fn close_notify(&mut self) -> Result<CloseNotify, WriterError> {
        self.require(Capability::NotifyClose)?;
        match self.inner.as_close_notifier() {
            Some(n) => n.close_notify(),
            None => Err(WriterError::Unsupported(Capability::NotifyClose)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Writer advertising an arbitrary capability subset.
    struct FakeWriter {
        caps: CapabilitySet,
        headers: HeaderMap,
        statuses: Vec<StatusCode>,
        body: Vec<u8>,
        flushes: Arc<AtomicUsize>,
    }

    impl FakeWriter {
        fn new(caps: CapabilitySet) -> Self {
            Self {
                caps,
                headers: HeaderMap::new(),
                statuses: Vec::new(),
                body: Vec::new(),
                flushes: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ResponseWriter for FakeWriter {
        fn headers_mut(&mut self) -> &mut HeaderMap {
            &mut self.headers
        }

        fn write_header(&mut self, status: StatusCode) {
            self.statuses.push(status);
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.body.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
            self.caps.contains(Capability::Flush).then_some(self as &mut dyn Flusher)
        }

        fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
            self.caps.contains(Capability::Hijack).then_some(self as &mut dyn Hijacker)
        }

        fn as_pusher(&mut self) -> Option<&mut dyn Pusher> {
            self.caps.contains(Capability::Push).then_some(self as &mut dyn Pusher)
        }

        fn as_bytes_taker(&mut self) -> Option<&mut dyn TakeBytesFrom> {
            self.caps
                .contains(Capability::TakeBytesFrom)
                .then_some(self as &mut dyn TakeBytesFrom)
        }

        fn as_close_notifier(&mut self) -> Option<&mut dyn CloseNotifier> {
            self.caps
                .contains(Capability::NotifyClose)
                .then_some(self as &mut dyn CloseNotifier)
        }
    }

    impl Flusher for FakeWriter {
        fn flush(&mut self) -> Result<(), WriterError> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Hijacker for FakeWriter {
        fn hijack(&mut self) -> Result<OnUpgrade, WriterError> {
            Ok(hyper::upgrade::on(&mut Request::new(())))
        }
    }

    impl Pusher for FakeWriter {
        fn push(&mut self, _target: &str, _headers: &HeaderMap) -> Result<(), WriterError> {
            Ok(())
        }
    }

    impl TakeBytesFrom for FakeWriter {
        fn take_bytes_from(&mut self, bytes: Bytes) -> Result<usize, WriterError> {
            self.body.extend_from_slice(&bytes);
            Ok(bytes.len())
        }
    }

    impl CloseNotifier for FakeWriter {
        fn close_notify(&mut self) -> Result<CloseNotify, WriterError> {
            Ok(Box::pin(async {}))
        }
    }

    fn call(i: &mut Interceptor<FakeWriter>, cap: Capability) -> Result<(), WriterError> {
        match cap {
            Capability::Flush => Flusher::flush(i),
            Capability::Hijack => Hijacker::hijack(i).map(|_| ()),
            Capability::Push => Pusher::push(i, "/style.css", &HeaderMap::new()),
            Capability::TakeBytesFrom => {
                TakeBytesFrom::take_bytes_from(i, Bytes::from_static(b"x")).map(|_| ())
            }
            Capability::NotifyClose => CloseNotifier::close_notify(i).map(|_| ()),
        }
    }

    #[test]
    fn test_capabilities_mirror_every_subset() {
        for bits in 0u8..32 {
            let subset = CapabilitySet::from_bits_truncate(bits);
            let mut interceptor = Interceptor::new(FakeWriter::new(subset), 64);

            assert_eq!(interceptor.capabilities(), subset, "probed set for {subset}");
            assert_eq!(probe(&mut interceptor), subset, "advertised set for {subset}");

            for cap in Capability::ALL {
                let result = call(&mut interceptor, cap);
                if subset.contains(cap) {
                    assert!(result.is_ok(), "{cap} should pass through for {subset}");
                } else {
                    assert!(
                        matches!(result, Err(WriterError::Unsupported(c)) if c == cap),
                        "{cap} should be unsupported for {subset}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_first_status_wins() {
        let mut interceptor = Interceptor::new(FakeWriter::new(CapabilitySet::EMPTY), 64);
        interceptor.write_header(StatusCode::NOT_FOUND);
        interceptor.write_header(StatusCode::OK);

        assert_eq!(interceptor.state().status, StatusCode::NOT_FOUND);
        assert!(interceptor.state().recorded);
        // Every call still reaches the wrapped writer.
        assert_eq!(
            interceptor.into_inner().statuses,
            vec![StatusCode::NOT_FOUND, StatusCode::OK]
        );
    }

    #[test]
    fn test_body_write_commits_implicit_ok() {
        let mut interceptor = Interceptor::new(FakeWriter::new(CapabilitySet::EMPTY), 64);
        interceptor.write(b"hello").unwrap();
        interceptor.write_header(StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(interceptor.state().status, StatusCode::OK);
    }

    #[test]
    fn test_write_captures_and_forwards() {
        let mut interceptor = Interceptor::new(FakeWriter::new(CapabilitySet::EMPTY), 64);
        assert_eq!(interceptor.write(b"{\"code\":0}").unwrap(), 10);

        let record = interceptor.record();
        assert_eq!(record.body.as_deref(), Some("{\"code\":0}"));
        assert_eq!(interceptor.into_inner().body, b"{\"code\":0}");
    }

    #[test]
    fn test_capture_is_bounded() {
        let mut interceptor = Interceptor::new(FakeWriter::new(CapabilitySet::EMPTY), 4);
        interceptor.write(b"abc").unwrap();
        interceptor.write(b"defgh").unwrap();

        let state = interceptor.state();
        assert!(state.body.is_truncated());
        assert_eq!(state.body.total_bytes(), 8);
        assert_eq!(state.body.to_text(), format!("abcd{TRUNCATION_MARKER}"));
        // The client still receives everything.
        assert_eq!(interceptor.into_inner().body, b"abcdefgh");
    }

    #[test]
    fn test_flush_forwards_to_inner() {
        let writer = FakeWriter::new(CapabilitySet::EMPTY.with(Capability::Flush));
        let flushes = writer.flushes.clone();
        let mut interceptor = Interceptor::new(writer, 64);

        interceptor.as_flusher().unwrap().flush().unwrap();
        assert_eq!(flushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hijack_without_capability_fails() {
        let mut interceptor = Interceptor::new(FakeWriter::new(CapabilitySet::EMPTY), 64);
        assert!(interceptor.as_hijacker().is_none());
        assert!(matches!(
            Hijacker::hijack(&mut interceptor),
            Err(WriterError::Unsupported(Capability::Hijack))
        ));
    }
}
