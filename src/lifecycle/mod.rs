//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Service::new
//!     → Shutdown (owned by the service, untriggered)
//!     → CancelToken bound into the root context
//!     → inherited by every controller and request context
//!
//! Service::cancel_all
//!     → Shutdown::trigger
//!     → every CancelToken reports cancelled
//!
//! signals.rs:
//!     SIGINT → stop accepting, cancel in-flight work
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative: handlers poll or select on the token
//! - A watch channel keeps the flag readable without awaiting

pub mod shutdown;
pub mod signals;

pub use shutdown::{CancelToken, Shutdown};
pub use signals::shutdown_signal;
