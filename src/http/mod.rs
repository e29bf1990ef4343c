//! HTTP dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum serve, graceful shutdown)
//!     → mux.rs (method + pattern → entry point, params)
//!     → controller.rs (buffer body, unmarshal, build request context)
//!     → handler.rs (service middleware → controller middleware → handler)
//!     → errors.rs (error handler on failure)
//!     → response.rs (single-send writer, encoded body)
//!     → Send to client
//! ```

pub mod controller;
pub mod errors;
pub mod files;
pub mod handler;
pub mod middleware;
pub mod mux;
pub mod request;
pub mod response;
pub mod server;
pub mod service;

pub use controller::Controller;
pub use errors::{
    default_error_handler, terse_error_handler, BoxError, Error, ErrorHandler, HandlerError,
    INTERNAL_ERROR_MESSAGE,
};
pub use handler::{compose, Handler, HandlerResult, Middleware};
pub use mux::{Mux, MuxError, MuxHandler};
pub use request::{decode_request, RequestData, Unmarshaler};
pub use response::{ResponseWriter, SendError};
pub use service::{Service, ServiceError, ServiceState};
