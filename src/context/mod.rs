//! Per-request context propagation.
//!
//! # Data Flow
//! ```text
//! Service root context     (cancel token, logger)
//!     → controller context (service, controller name, ctrl log field)
//!     → action context     (action name, action log field)
//!     → request context    (request data, response writer)
//!     → middleware         (request id, user bindings...)
//! ```
//!
//! # Design Decisions
//! - A context is a persistent list: deriving allocates one node pointing at
//!   its parent, ancestors are never mutated
//! - Lookups walk towards the root and stop at the nearest key
//! - Contexts are cheap to clone and shared across concurrent requests
//!   without locks

mod params;

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::http::request::RequestData;
use crate::http::response::ResponseWriter;
use crate::http::service::{Service, WeakService};
use crate::lifecycle::CancelToken;
use crate::observability::logging::{default_logger, Fields, Logger};

pub use params::Params;

const SERVICE_KEY: &str = "switchyard.service";
const CONTROLLER_KEY: &str = "switchyard.controller";
const ACTION_KEY: &str = "switchyard.action";
const REQUEST_KEY: &str = "switchyard.request";
const LOG_KEY: &str = "switchyard.log";
const CANCEL_KEY: &str = "switchyard.cancel";

struct Node {
    parent: Context,
    key: Cow<'static, str>,
    value: Arc<dyn Any + Send + Sync>,
}

/// Immutable chain of key/value bindings.
#[derive(Clone, Default)]
pub struct Context {
    node: Option<Arc<Node>>,
}

/// The leaf binding every request adds.
#[derive(Clone)]
struct RequestScope {
    request: Arc<RequestData>,
    response: ResponseWriter,
}

#[derive(Clone)]
struct LogScope {
    logger: Arc<dyn Logger>,
    fields: Fields,
}

impl Context {
    /// The empty context.
    pub fn background() -> Self {
        Self::default()
    }

    /// Return a child binding `key` to `value`.
    pub fn derive<T>(&self, key: impl Into<Cow<'static, str>>, value: T) -> Context
    where
        T: Any + Send + Sync,
    {
        Context {
            node: Some(Arc::new(Node {
                parent: self.clone(),
                key: key.into(),
                value: Arc::new(value),
            })),
        }
    }

    /// Nearest binding for `key`, if it holds a `T`.
    pub fn value<T: Any>(&self, key: &str) -> Option<&T> {
        let mut current = self.node.as_deref();
        while let Some(node) = current {
            if node.key == key {
                return node.value.downcast_ref::<T>();
            }
            current = node.parent.node.as_deref();
        }
        None
    }

    /// Number of bindings between this context and the root.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.node.as_deref();
        while let Some(node) = current {
            depth += 1;
            current = node.parent.node.as_deref();
        }
        depth
    }

    pub(crate) fn with_cancel(&self, token: CancelToken) -> Context {
        self.derive(CANCEL_KEY, token)
    }

    pub(crate) fn with_service(&self, service: WeakService) -> Context {
        self.derive(SERVICE_KEY, service)
    }

    pub(crate) fn with_controller(&self, name: &str) -> Context {
        self.derive(CONTROLLER_KEY, name.to_string())
            .log_with("ctrl", name)
    }

    pub(crate) fn with_action(&self, name: &str) -> Context {
        self.derive(ACTION_KEY, name.to_string())
            .log_with("action", name)
    }

    pub(crate) fn for_request(&self, request: Arc<RequestData>, response: ResponseWriter) -> Context {
        self.derive(REQUEST_KEY, RequestScope { request, response })
    }

    /// Owning service, while it is alive.
    pub fn service(&self) -> Option<Service> {
        self.value::<WeakService>(SERVICE_KEY)?.upgrade()
    }

    pub fn controller(&self) -> Option<&str> {
        self.value::<String>(CONTROLLER_KEY).map(String::as_str)
    }

    pub fn action(&self) -> Option<&str> {
        self.value::<String>(ACTION_KEY).map(String::as_str)
    }

    pub fn request(&self) -> Option<&Arc<RequestData>> {
        self.value::<RequestScope>(REQUEST_KEY).map(|s| &s.request)
    }

    pub fn response(&self) -> Option<&ResponseWriter> {
        self.value::<RequestScope>(REQUEST_KEY).map(|s| &s.response)
    }

    pub fn params(&self) -> Option<&Params> {
        self.request().map(|r| r.params())
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.value::<CancelToken>(CANCEL_KEY)
    }

    /// True once the owning service has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token().is_some_and(CancelToken::is_cancelled)
    }

    /// Resolves on cancellation; never resolves for a context without a token.
    pub async fn cancelled(&self) {
        match self.cancel_token() {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    /// Bind `logger` keeping the accumulated fields.
    pub fn use_logger(&self, logger: Arc<dyn Logger>) -> Context {
        let fields = self.log_scope().map(|s| s.fields.clone()).unwrap_or_default();
        self.derive(LOG_KEY, LogScope { logger, fields })
    }

    /// Append a field reported by every later log call.
    pub fn log_with(&self, key: &str, value: impl fmt::Display) -> Context {
        let (logger, mut fields) = match self.log_scope() {
            Some(scope) => (scope.logger.clone(), scope.fields.clone()),
            None => (default_logger(), Fields::new()),
        };
        fields.push((key.to_string(), value.to_string()));
        self.derive(LOG_KEY, LogScope { logger, fields })
    }

    pub fn log_fields(&self) -> &[(String, String)] {
        self.log_scope().map(|s| s.fields.as_slice()).unwrap_or(&[])
    }

    pub fn log_info(&self, msg: &str, keyvals: &[(&str, String)]) {
        let (logger, fields) = self.log_target(keyvals);
        logger.info(msg, &fields);
    }

    pub fn log_error(&self, msg: &str, keyvals: &[(&str, String)]) {
        let (logger, fields) = self.log_target(keyvals);
        logger.error(msg, &fields);
    }

    fn log_scope(&self) -> Option<&LogScope> {
        self.value::<LogScope>(LOG_KEY)
    }

    fn log_target(&self, keyvals: &[(&str, String)]) -> (Arc<dyn Logger>, Fields) {
        let (logger, mut fields) = match self.log_scope() {
            Some(scope) => (scope.logger.clone(), scope.fields.clone()),
            None => (default_logger(), Fields::new()),
        };
        fields.extend(keyvals.iter().map(|(k, v)| (k.to_string(), v.clone())));
        (logger, fields)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = Vec::new();
        let mut current = self.node.as_deref();
        while let Some(node) = current {
            keys.push(node.key.as_ref());
            current = node.parent.node.as_deref();
        }
        f.debug_struct("Context").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, Fields)>>);

    impl Logger for Recorder {
        fn info(&self, msg: &str, fields: &[(String, String)]) {
            self.0.lock().unwrap().push((format!("INFO {msg}"), fields.to_vec()));
        }
        fn error(&self, msg: &str, fields: &[(String, String)]) {
            self.0.lock().unwrap().push((format!("ERROR {msg}"), fields.to_vec()));
        }
    }

    #[test]
    fn test_lookup_walks_to_nearest() {
        let root = Context::background().derive("a", 1u32);
        let child = root.derive("b", "two").derive("a", 3u32);

        assert_eq!(child.value::<u32>("a"), Some(&3));
        assert_eq!(child.value::<&str>("b"), Some(&"two"));
        assert_eq!(root.value::<u32>("a"), Some(&1), "parent untouched");
        assert_eq!(root.value::<&str>("b"), None);
        assert_eq!(child.value::<u32>("missing"), None);
        assert_eq!(child.depth(), 3);
    }

    #[test]
    fn test_type_mismatch_is_not_found() {
        let ctx = Context::background().derive("a", 1u32).derive("a", "shadow");
        assert_eq!(ctx.value::<u32>("a"), None);
    }

    #[test]
    fn test_siblings_do_not_see_each_other() {
        let base = Context::background().derive("ctrl", "bottle");
        let a = base.derive("req", 1u8);
        let b = base.derive("req", 2u8);
        assert_eq!(a.value::<u8>("req"), Some(&1));
        assert_eq!(b.value::<u8>("req"), Some(&2));
        assert_eq!(base.value::<u8>("req"), None);
    }

    #[test]
    fn test_log_fields_accumulate() {
        let recorder = Arc::new(Recorder::default());
        let ctx = Context::background()
            .use_logger(recorder.clone())
            .log_with("ctrl", "bottle")
            .log_with("action", "show");

        ctx.log_info("hello", &[("id", "7".to_string())]);
        ctx.log_error("boom", &[]);

        let lines = recorder.0.lock().unwrap();
        assert_eq!(lines[0].0, "INFO hello");
        assert_eq!(
            lines[0].1,
            vec![
                ("ctrl".to_string(), "bottle".to_string()),
                ("action".to_string(), "show".to_string()),
                ("id".to_string(), "7".to_string()),
            ]
        );
        assert_eq!(lines[1].0, "ERROR boom");
        assert_eq!(lines[1].1.len(), 2);
    }

    #[test]
    fn test_use_logger_keeps_fields() {
        let ctx = Context::background()
            .log_with("ctrl", "bottle")
            .use_logger(Arc::new(Recorder::default()));
        assert_eq!(ctx.log_fields().len(), 1);
    }

    #[test]
    fn test_cancellation_reaches_descendants() {
        let shutdown = Shutdown::new();
        let root = Context::background().with_cancel(shutdown.token());
        let leaf = root.derive("x", 1u8).with_controller("bottle").with_action("show");

        assert!(!leaf.is_cancelled());
        shutdown.trigger();
        assert!(leaf.is_cancelled());
        assert!(!Context::background().is_cancelled());
    }
}
