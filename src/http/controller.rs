//! Controllers and the dispatch adapter.
//!
//! # Data Flow
//! ```text
//! mux entry point (request, params)
//!     → buffer body, negotiate encoder
//!     → request context (controller ctx + action + request + writer)
//!     → unmarshaler (only when one is supplied and a body is present)
//!         ok  → composed chain → terminal → business handler
//!         err → chain rebuilt around an invalid-payload terminal
//!     → without an unmarshaler an unreadable body is logged and the
//!       handler sees it as empty
//!     → error handler (controller override, else service)
//!     → buffered response
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::header;

use crate::config::EncodingConfig;
use crate::context::{Context, Params};
use crate::encoding::{Codecs, DecodeError};
use crate::http::errors::{default_error_handler, Error, ErrorHandler, HandlerError};
use crate::http::handler::{compose, Handler, Middleware};
use crate::http::mux::MuxHandler;
use crate::http::request::{RequestData, Unmarshaler};
use crate::http::response::ResponseWriter;
use crate::http::service::WeakService;
use crate::observability::metrics::{self, Report};

/// Common state and behavior of a mounted resource.
#[derive(Clone)]
pub struct Controller {
    name: String,
    context: Context,
    middleware: Vec<Middleware>,
    error_handler: Option<ErrorHandler>,
    service: WeakService,
}

impl Controller {
    /// Use [`Service::new_controller`](crate::http::Service::new_controller).
    pub(crate) fn new(
        name: &str,
        context: Context,
        middleware: Vec<Middleware>,
        service: WeakService,
    ) -> Self {
        Self {
            name: name.to_string(),
            context,
            middleware,
            error_handler: None,
            service,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn middleware(&self) -> &[Middleware] {
        &self.middleware
    }

    /// Append controller middleware. Applies to entry points built afterwards.
    pub fn use_middleware(&mut self, m: Middleware) {
        self.middleware.push(m);
    }

    /// Override the service error handler for this controller.
    pub fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.error_handler = Some(handler);
    }

    /// Bind a value into the controller context.
    pub fn bind<T>(&mut self, key: &'static str, value: T)
    where
        T: std::any::Any + Send + Sync,
    {
        self.context = self.context.derive(key, value);
    }

    /// Route `err` to exactly one error handler: this controller's, else the
    /// service's.
    pub fn handle_error(&self, ctx: &Context, rw: &ResponseWriter, req: &RequestData, err: &HandlerError) {
        let service = self.service.upgrade();
        if let Some(service) = &service {
            service.report(Report::HandlerError {
                status: err.status().as_u16(),
            });
        }
        if let Some(handler) = &self.error_handler {
            handler(ctx, rw, req, err);
            return;
        }
        match service {
            Some(service) => (service.settings().error_handler)(ctx, rw, req, err),
            None => default_error_handler(ctx, rw, req, err),
        }
    }

    /// Wrap a business handler into a mux entry point.
    ///
    /// The middleware chain is composed once here; controller middleware
    /// added later does not affect the returned entry point.
    pub fn mux_handler(&self, action: &str, handler: Handler, unmarshaler: Option<Unmarshaler>) -> MuxHandler {
        let ctrl = Arc::new(self.clone());
        let chain = compose(&ctrl.middleware, terminal(ctrl.clone(), handler));
        let base = ctrl.context.with_action(action);
        let action = action.to_string();

        MuxHandler::new(move |request: Request<Body>, params: Params| {
            let ctrl = ctrl.clone();
            let chain = chain.clone();
            let base = base.clone();
            let unmarshaler = unmarshaler.clone();
            let action = action.clone();
            async move {
                let start = Instant::now();
                let (codecs, limit) = match ctrl.service.upgrade() {
                    Some(service) => {
                        let settings = service.settings();
                        (settings.codecs.clone(), settings.max_body_bytes)
                    }
                    None => (Codecs::with_defaults(), EncodingConfig::default().max_body_bytes),
                };

                let (parts, body) = request.into_parts();
                let accept = parts
                    .headers
                    .get(header::ACCEPT)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let (body, read_error) = match axum::body::to_bytes(body, limit).await {
                    Ok(bytes) => (bytes, None),
                    Err(e) => (Bytes::new(), Some(DecodeError::Read(e.to_string()))),
                };

                let rw = ResponseWriter::new(codecs.negotiate(accept.as_deref()));
                let req = Arc::new(RequestData::new(parts, body, params));
                let ctx = base.for_request(req.clone(), rw.clone());

                let decode_error = match (&unmarshaler, read_error) {
                    (Some(_), Some(err)) => Some(err),
                    (Some(unmarshaler), None) if !req.body().is_empty() => {
                        unmarshaler.call(&ctx, &req).err()
                    }
                    (None, Some(err)) => {
                        ctx.log_info("body discarded", &[("err", err.to_string())]);
                        None
                    }
                    _ => None,
                };

                let handler = match decode_error {
                    None => chain,
                    Some(err) => {
                        ctx.log_info("invalid payload", &[("err", err.to_string())]);
                        compose(&ctrl.middleware, invalid_payload(ctrl.clone(), err))
                    }
                };

                if let Err(err) = handler.call(ctx.clone(), rw.clone(), req.clone()).await {
                    ctrl.handle_error(&ctx, &rw, &req, &err);
                }

                let response = rw.take_response();
                metrics::record_request(&action, response.status().as_u16(), start);
                response
            }
        })
    }
}

/// Innermost handler: skip the business handler when a middleware already
/// responded, and route its error to the error handler.
fn terminal(ctrl: Arc<Controller>, handler: Handler) -> Handler {
    Handler::new(move |ctx, rw, req| {
        let ctrl = ctrl.clone();
        let handler = handler.clone();
        async move {
            if rw.written() {
                return Ok(());
            }
            if let Err(err) = handler.call(ctx.clone(), rw.clone(), req.clone()).await {
                ctx.log_info("ERROR", &[("err", err.to_string())]);
                ctrl.handle_error(&ctx, &rw, &req, &err);
            }
            Ok(())
        }
    })
}

fn invalid_payload(ctrl: Arc<Controller>, err: DecodeError) -> Handler {
    let err = match err {
        DecodeError::MissingPayload => Error::missing_payload(),
        other => Error::invalid_encoding(&other),
    };
    Handler::new(move |ctx, rw, req| {
        let ctrl = ctrl.clone();
        let err = HandlerError::from(err.clone());
        async move {
            ctrl.handle_error(&ctx, &rw, &req, &err);
            Ok(())
        }
    })
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("middleware", &self.middleware.len())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}
