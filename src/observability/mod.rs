//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch core produces:
//!     → logging.rs (Logger bound into contexts, tracing events)
//!     → metrics.rs (request counters, error reports)
//!
//! Consumers:
//!     → tracing subscriber (stdout, pretty or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Logger fields flow down the context chain, never up
//! - Error reports never block or fail a request

pub mod logging;
pub mod metrics;
