//! REST service template: request pipeline and lifecycle management.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server (accept loop, graceful drain)
//!                      → http::middleware (correlation → recovery → logging
//!                                          → metrics → version → capture)
//!                      → api (handlers over store::Resources)
//!     Client Response ◀─────────────────────────────────────────────
//!
//!     lifecycle::LifecycleManager
//!         owns: store resources, main listener, heartbeat,
//!               metrics/health listener, shutdown coordination
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod store;
pub mod version;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::{LifecycleManager, Shutdown};
