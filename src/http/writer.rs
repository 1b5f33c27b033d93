//! Response writer abstraction and its optional capabilities.
//!
//! A [`ResponseWriter`] always supports status, headers and body writes.
//! Everything else is an optional capability that a caller discovers by
//! probing: each `as_*` method returns the capability view when the writer
//! implements it and `None` otherwise.
//!
//! # Capabilities
//! - `Flush`: push buffered body bytes to the client now
//! - `Hijack`: take over the connection for a protocol upgrade
//! - `Push`: HTTP/2 server push
//! - `TakeBytesFrom`: hand over an owned buffer without copying
//! - `NotifyClose`: resolve a future when the client goes away

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use hyper::upgrade::OnUpgrade;
use std::fmt;
use std::io;
use thiserror::Error;

/// One optional writer capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Flush,
    Hijack,
    Push,
    TakeBytesFrom,
    NotifyClose,
}

impl Capability {
    /// Every capability, in bit order.
    pub const ALL: [Capability; 5] = [
        Capability::Flush,
        Capability::Hijack,
        Capability::Push,
        Capability::TakeBytesFrom,
        Capability::NotifyClose,
    ];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Capability::Flush => "flush",
            Capability::Hijack => "hijack",
            Capability::Push => "push",
            Capability::TakeBytesFrom => "take_bytes_from",
            Capability::NotifyClose => "notify_close",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of capabilities, stored as a bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet(0);

    pub const fn all() -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < Capability::ALL.len() {
            bits |= Capability::ALL[i].bit();
            i += 1;
        }
        CapabilitySet(bits)
    }

    /// Build a set from the low five bits of `bits`; higher bits are dropped.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        CapabilitySet(bits & Self::all().0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    #[must_use]
    pub const fn with(self, cap: Capability) -> Self {
        CapabilitySet(self.0 | cap.bit())
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::EMPTY;
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, cap) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(cap.name())?;
        }
        Ok(())
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilitySet({self})")
    }
}

/// Errors from writer capability calls.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("capability unsupported: {0}")]
    Unsupported(Capability),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Future resolving once the client connection has gone away.
pub type CloseNotify = BoxFuture<'static, ()>;

pub trait Flusher {
    fn flush(&mut self) -> Result<(), WriterError>;
}

pub trait Hijacker {
    /// Take over the connection. The returned handle resolves to the raw
    /// upgraded I/O once the response head has been sent.
    fn hijack(&mut self) -> Result<OnUpgrade, WriterError>;
}

pub trait Pusher {
    fn push(&mut self, target: &str, headers: &HeaderMap) -> Result<(), WriterError>;
}

pub trait TakeBytesFrom {
    /// Append an owned buffer to the body without copying it.
    fn take_bytes_from(&mut self, bytes: Bytes) -> Result<usize, WriterError>;
}

pub trait CloseNotifier {
    fn close_notify(&mut self) -> Result<CloseNotify, WriterError>;
}

/// Outbound response writer.
pub trait ResponseWriter: Send {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Send the response status. Only the first call takes effect.
    fn write_header(&mut self, status: StatusCode);

    /// Write body bytes, sending a `200 OK` head first if none was written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        None
    }

    fn as_pusher(&mut self) -> Option<&mut dyn Pusher> {
        None
    }

    fn as_bytes_taker(&mut self) -> Option<&mut dyn TakeBytesFrom> {
        None
    }

    fn as_close_notifier(&mut self) -> Option<&mut dyn CloseNotifier> {
        None
    }
}

/// Probe a writer for each capability.
pub fn probe<W: ResponseWriter + ?Sized>(writer: &mut W) -> CapabilitySet {
    let mut set = CapabilitySet::EMPTY;
    if writer.as_flusher().is_some() {
        set.insert(Capability::Flush);
    }
    if writer.as_hijacker().is_some() {
        set.insert(Capability::Hijack);
    }
    if writer.as_pusher().is_some() {
        set.insert(Capability::Push);
    }
    if writer.as_bytes_taker().is_some() {
        set.insert(Capability::TakeBytesFrom);
    }
    if writer.as_close_notifier().is_some() {
        set.insert(Capability::NotifyClose);
    }
    set
}
