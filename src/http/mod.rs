//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper-util accept loop, graceful drain)
//!     → middleware/ (correlation → recovery → logging → metrics → version)
//!     → middleware/capture.rs (interceptor.rs over response.rs)
//!     → route dispatch
//!     → Send to client
//! ```
//!
//! `writer.rs` defines the response-writer contract and its optional
//! capabilities; `request.rs` holds the per-request correlation context.

pub mod interceptor;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod writer;

pub use interceptor::{Interceptor, ResponseRecord};
pub use request::{CorrelationContext, X_REQUEST_ID, X_SESSION_ID};
pub use server::{DrainOutcome, HttpServer};
pub use writer::{Capability, CapabilitySet, ResponseWriter, WriterError};
