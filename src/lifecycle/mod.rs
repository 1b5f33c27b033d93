//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (manager.rs):
//!     Init → ResourcesStarting: metrics listener (best effort),
//!                               cache + relational store (fatal)
//!          → Running:           main listener bound, heartbeat ticking
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Draining → stop accept, drain, stop heartbeat
//!                    → Stopped  (forced close if the drain timeout passes)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: resources first, listener last
//! - Ordered shutdown: stop accept, drain, release
//! - Shutdown has timeout: remaining connections are closed after the deadline

pub mod heartbeat;
pub mod manager;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use heartbeat::{Heartbeat, HeartbeatRecord};
pub use manager::{LifecycleError, LifecycleHandle, LifecycleManager};
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use state::{LifecycleState, StateCell};
