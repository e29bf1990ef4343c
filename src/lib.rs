//! Request dispatch runtime for HTTP services.
//!
//! A [`Service`](http::Service) owns a mux, a middleware chain, codecs and an
//! error handler. Controllers wrap business handlers into mux entry points
//! that decode payloads, thread a request context through the middleware and
//! route failures to exactly one error handler.

pub mod cellar;
pub mod config;
pub mod context;
pub mod encoding;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServiceConfig;
pub use context::Context;
pub use http::middleware;
pub use http::{Controller, Error, Handler, HandlerError, Middleware, Service};
pub use lifecycle::Shutdown;
