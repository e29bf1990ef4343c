//! Request multiplexer.
//!
//! Thin adapter over `axum::Router`: patterns use its syntax (`/{id}`,
//! `/{*rest}`), and each registration resolves path and query parameters
//! into [`Params`] before invoking the entry point.
//!
//! Patterns are checked against a shadow `matchit` router as they are
//! registered, so a pattern axum would refuse fails here with a
//! [`MuxError`] instead of when the router is compiled.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Request};
use axum::http::Method;
use axum::response::Response;
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use futures_util::future::BoxFuture;
use tower_http::trace::TraceLayer;

use crate::context::Params;

/// Mux-facing entry point bound to one method and pattern.
#[derive(Clone)]
pub struct MuxHandler(Arc<dyn Fn(Request<Body>, Params) -> BoxFuture<'static, Response> + Send + Sync>);

impl MuxHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Request<Body>, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self(Arc::new(move |req, params| Box::pin(f(req, params))))
    }

    pub fn call(&self, req: Request<Body>, params: Params) -> BoxFuture<'static, Response> {
        (self.0)(req, params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MuxError {
    #[error("unsupported method {0}")]
    UnsupportedMethod(Method),

    #[error("{method} {pattern} is already registered")]
    Duplicate { method: Method, pattern: String },

    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("pattern {pattern:?} conflicts with registered pattern {existing:?}")]
    Conflict { pattern: String, existing: String },
}

impl MuxError {
    fn invalid(pattern: &str, reason: impl ToString) -> Self {
        MuxError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Segment syntax axum rejects but `matchit` takes as a literal.
fn check_segments(pattern: &str) -> Result<(), MuxError> {
    if !pattern.starts_with('/') {
        return Err(MuxError::invalid(pattern, "must start with '/'"));
    }
    for segment in pattern.split('/') {
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err(MuxError::invalid(
                pattern,
                format!("segment {segment:?} uses the old capture syntax; write {{name}} or {{*name}}"),
            ));
        }
    }
    Ok(())
}

/// Registered routes, compiled into an `axum::Router` when serving starts.
pub struct Mux {
    routes: BTreeMap<String, MethodRouter>,
    registered: Vec<(Method, String)>,
    shadow: matchit::Router<()>,
}

impl Default for Mux {
    fn default() -> Self {
        Self {
            routes: BTreeMap::new(),
            registered: Vec::new(),
            shadow: matchit::Router::new(),
        }
    }
}

impl Mux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, method: Method, pattern: &str, handler: MuxHandler) -> Result<(), MuxError> {
        check_segments(pattern)?;
        if self.is_registered(&method, pattern) {
            return Err(MuxError::Duplicate {
                method,
                pattern: pattern.to_string(),
            });
        }
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| MuxError::UnsupportedMethod(method.clone()))?;
        if !self.routes.contains_key(pattern) {
            self.shadow.insert(pattern, ()).map_err(|err| match err {
                matchit::InsertError::Conflict { with } => MuxError::Conflict {
                    pattern: pattern.to_string(),
                    existing: with,
                },
                other => MuxError::invalid(pattern, other),
            })?;
        }

        let entry = on(filter, move |Path(path): Path<HashMap<String, String>>, req: Request<Body>| {
            let handler = handler.clone();
            async move {
                let params = Params::from_request(path, req.uri().query());
                handler.call(req, params).await
            }
        });
        let route = match self.routes.remove(pattern) {
            Some(existing) => existing.merge(entry),
            None => entry,
        };
        self.routes.insert(pattern.to_string(), route);
        self.registered.push((method, pattern.to_string()));
        Ok(())
    }

    pub fn is_registered(&self, method: &Method, pattern: &str) -> bool {
        self.registered
            .iter()
            .any(|(m, p)| m == method && p == pattern)
    }

    /// Registrations in insertion order.
    pub fn routes(&self) -> &[(Method, String)] {
        &self.registered
    }

    /// Compile into a router, leaving this mux empty.
    pub fn take_router(&mut self) -> Router {
        self.registered.clear();
        self.shadow = matchit::Router::new();
        std::mem::take(&mut self.routes)
            .into_iter()
            .fold(Router::new(), |router, (pattern, route)| router.route(&pattern, route))
            .layer(TraceLayer::new_for_http())
    }
}
