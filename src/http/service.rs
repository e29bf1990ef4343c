//! The service: process-wide registry shared by all controllers.
//!
//! # Lifecycle
//! ```text
//! Configuring ──listen_and_serve / listen_and_serve_tls / serve / router──▶ Serving
//!      │                                                                      │
//!      └──────────────────────────── cancel_all ──────────────────────────────┴──▶ Cancelled
//! ```
//!
//! # Design Decisions
//! - Setup mutations publish a new `Settings` snapshot through `ArcSwap`;
//!   requests read snapshots lock-free
//! - Registration is rejected once serving has started
//! - Contexts and controllers hold a weak reference, so routes owned by the
//!   mux never keep the service alive

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use arc_swap::ArcSwap;
use axum::http::Method;
use axum::{Extension, Router};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ErrorPolicy, ServiceConfig};
use crate::context::Context;
use crate::encoding::{Codecs, Decoder, Encoder};
use crate::http::controller::Controller;
use crate::http::errors::{default_error_handler, terse_error_handler, ErrorHandler};
use crate::http::handler::Middleware;
use crate::http::mux::{Mux, MuxError, MuxHandler};
use crate::http::server;
use crate::lifecycle::{shutdown_signal, Shutdown};
use crate::net::tls::load_tls_config;
use crate::observability::logging::{default_logger, Logger};
use crate::observability::metrics::{Report, Reporter};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service is already serving; register routes and middleware before starting")]
    AlreadyServing,

    #[error("no encoder registered for content type {0:?}")]
    UnknownContentType(String),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error("invalid file route {0:?}: only a trailing {{*name}} wildcard is allowed")]
    InvalidFileRoute(String),

    #[error("cannot serve {path:?}: {source}")]
    FileNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Configuring,
    Serving,
    Cancelled,
}

impl ServiceState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ServiceState::Configuring,
            1 => ServiceState::Serving,
            _ => ServiceState::Cancelled,
        }
    }
}

/// Configuration shared by every request, immutable once serving starts.
#[derive(Clone)]
pub struct Settings {
    /// Root context every controller derives from.
    pub context: Context,
    pub middleware: Vec<Middleware>,
    pub error_handler: ErrorHandler,
    pub codecs: Codecs,
    pub max_body_bytes: usize,
}

struct ServiceInner {
    name: String,
    settings: ArcSwap<Settings>,
    mux: Mutex<Mux>,
    shutdown: Shutdown,
    reporter: Reporter,
    state: AtomicU8,
}

/// Handle on a service; clones share it.
///
/// ```no_run
/// # use switchyard::http::{Service, Handler};
/// # use axum::http::Method;
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let service = Service::new("cellar");
/// service.use_middleware(switchyard::middleware::request_id())?;
///
/// let ctrl = service.new_controller("bottle");
/// let show = Handler::new(|_ctx, rw, req| async move {
///     rw.send(axum::http::StatusCode::OK, &req.params().get("id"))
///         .map_err(switchyard::http::HandlerError::opaque)
/// });
/// service.handle(Method::GET, "/bottles/{id}", ctrl.mux_handler("show", show, None))?;
/// service.listen_and_serve("0.0.0.0:8080").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

/// Non-owning reference stored in contexts and controllers.
#[derive(Clone)]
pub struct WeakService(Weak<ServiceInner>);

impl WeakService {
    pub fn upgrade(&self) -> Option<Service> {
        self.0.upgrade().map(|inner| Service { inner })
    }
}

impl Service {
    /// Service with the built-in codecs, the verbose error handler and a
    /// `tracing` logger.
    pub fn new(name: &str) -> Self {
        Self::with_report_buffer(name, 1024)
    }

    pub fn with_report_buffer(name: &str, report_buffer: usize) -> Self {
        let shutdown = Shutdown::new();
        let context = Context::background()
            .with_cancel(shutdown.token())
            .use_logger(default_logger());
        let settings = Settings {
            context,
            middleware: Vec::new(),
            error_handler: Arc::new(default_error_handler),
            codecs: Codecs::with_defaults(),
            max_body_bytes: 2 * 1024 * 1024,
        };
        Self {
            inner: Arc::new(ServiceInner {
                name: name.to_string(),
                settings: ArcSwap::from_pointee(settings),
                mux: Mutex::new(Mux::new()),
                shutdown,
                reporter: Reporter::new(report_buffer),
                state: AtomicU8::new(0),
            }),
        }
    }

    /// Service configured from a validated [`ServiceConfig`].
    ///
    /// File mounts are left to the caller so they can be added after the
    /// service middleware.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let service = Self::with_report_buffer(&config.name, config.observability.report_buffer);
        let error_handler: ErrorHandler = match config.errors.policy {
            ErrorPolicy::Verbose => Arc::new(default_error_handler),
            ErrorPolicy::Terse => Arc::new(terse_error_handler),
        };
        service.set_error_handler(error_handler)?;
        service.set_default_content_type(&config.encoding.default_content_type)?;
        service.set_max_body_bytes(config.encoding.max_body_bytes)?;
        Ok(service)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<Settings> {
        self.inner.settings.load_full()
    }

    /// Root context.
    pub fn context(&self) -> Context {
        self.settings().context.clone()
    }

    pub(crate) fn downgrade(&self) -> WeakService {
        WeakService(Arc::downgrade(&self.inner))
    }

    fn configure(&self, f: impl FnOnce(&mut Settings)) -> Result<(), ServiceError> {
        if self.state() != ServiceState::Configuring {
            return Err(ServiceError::AlreadyServing);
        }
        let mut next = Settings::clone(&self.inner.settings.load());
        f(&mut next);
        self.inner.settings.store(Arc::new(next));
        Ok(())
    }

    /// Append service-wide middleware, inherited by controllers created
    /// afterwards.
    pub fn use_middleware(&self, m: Middleware) -> Result<(), ServiceError> {
        self.configure(|s| s.middleware.push(m))
    }

    pub fn set_error_handler(&self, handler: ErrorHandler) -> Result<(), ServiceError> {
        self.configure(|s| s.error_handler = handler)
    }

    /// Replace the logger bound in the root context.
    pub fn use_logger(&self, logger: Arc<dyn Logger>) -> Result<(), ServiceError> {
        self.configure(|s| s.context = s.context.use_logger(logger))
    }

    /// Bind a value into the root context, visible to every request.
    pub fn bind<T>(&self, key: &'static str, value: T) -> Result<(), ServiceError>
    where
        T: std::any::Any + Send + Sync,
    {
        self.configure(|s| s.context = s.context.derive(key, value))
    }

    pub fn set_max_body_bytes(&self, limit: usize) -> Result<(), ServiceError> {
        self.configure(|s| s.max_body_bytes = limit)
    }

    pub fn decoder(&self, decoder: Arc<dyn Decoder>, content_types: &[&str]) -> Result<(), ServiceError> {
        self.configure(|s| s.codecs.register_decoder(decoder, content_types))
    }

    pub fn encoder(&self, encoder: Arc<dyn Encoder>, content_types: &[&str]) -> Result<(), ServiceError> {
        self.configure(|s| s.codecs.register_encoder(encoder, content_types))
    }

    /// Make `content_type` the response default; it must have an encoder.
    pub fn set_default_content_type(&self, content_type: &str) -> Result<(), ServiceError> {
        let mut result = Ok(());
        self.configure(|s| {
            if let Err(ct) = s.codecs.set_default(content_type) {
                result = Err(ServiceError::UnknownContentType(ct));
            }
        })?;
        result
    }

    pub fn log_info(&self, msg: &str, keyvals: &[(&str, String)]) {
        self.settings().context.log_info(msg, keyvals);
    }

    pub fn log_error(&self, msg: &str, keyvals: &[(&str, String)]) {
        self.settings().context.log_error(msg, keyvals);
    }

    /// Controller for resource `name`, inheriting the current service
    /// middleware.
    pub fn new_controller(&self, name: &str) -> Controller {
        let settings = self.settings();
        let context = settings
            .context
            .with_service(self.downgrade())
            .with_controller(name);
        Controller::new(name, context, settings.middleware.clone(), self.downgrade())
    }

    fn mux(&self) -> MutexGuard<'_, Mux> {
        self.inner.mux.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an entry point with the mux.
    ///
    /// The state is checked under the mux lock, which [`Service::router`]
    /// also holds while it drains the mux.
    pub fn handle(&self, method: Method, pattern: &str, handler: MuxHandler) -> Result<(), ServiceError> {
        let mut mux = self.mux();
        if self.state() != ServiceState::Configuring {
            return Err(ServiceError::AlreadyServing);
        }
        let route = format!("{} {}", method, pattern);
        mux.handle(method, pattern, handler)?;
        self.log_info("mount", &[("route", route)]);
        Ok(())
    }

    pub fn routes(&self) -> Vec<(Method, String)> {
        self.mux().routes().to_vec()
    }

    pub(crate) fn report(&self, report: Report) {
        self.inner.reporter.report(report);
    }

    /// Reports dropped because the buffer was full.
    pub fn dropped_reports(&self) -> u64 {
        self.inner.reporter.dropped()
    }

    /// Broadcast cancellation to every derived context.
    ///
    /// In-flight handlers are expected to notice and return; nothing is
    /// aborted.
    pub fn cancel_all(&self) {
        self.inner.state.store(2, Ordering::Release);
        self.inner.shutdown.trigger();
        self.log_info("cancel all", &[]);
    }

    /// Leave the configuring state and compile the mux into a router.
    ///
    /// The router keeps the service alive; the mux is left empty so this
    /// forms no cycle.
    pub fn router(&self) -> Result<Router, ServiceError> {
        let mut mux = self.mux();
        if self
            .inner
            .state
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ServiceError::AlreadyServing);
        }
        let router = mux.take_router();
        drop(mux);
        self.inner.reporter.start();
        Ok(router.layer(Extension(self.clone())))
    }

    /// Serve plaintext HTTP on an already bound listener until it fails or
    /// a shutdown signal arrives.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServiceError> {
        let router = self.router()?;
        let addr = listener.local_addr()?;
        self.log_info("listen", &[("transport", "http".to_string()), ("addr", addr.to_string())]);
        let this = self.clone();
        server::serve_plain(listener, router, async move {
            shutdown_signal().await;
            this.cancel_all();
        })
        .await?;
        Ok(())
    }

    /// Bind `addr` and serve plaintext HTTP.
    pub async fn listen_and_serve(&self, addr: &str) -> Result<(), ServiceError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServiceError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        self.serve(listener).await
    }

    /// Bind `addr` and serve HTTPS with the PEM certificate and key.
    pub async fn listen_and_serve_tls(
        &self,
        addr: &str,
        cert_path: &Path,
        key_path: &Path,
    ) -> Result<(), ServiceError> {
        let socket = resolve_addr(addr).await?;
        let tls = load_tls_config(cert_path, key_path)
            .await
            .map_err(ServiceError::Tls)?;
        let router = self.router()?;
        self.log_info("listen", &[("transport", "https".to_string()), ("addr", addr.to_string())]);
        let this = self.clone();
        server::serve_tls(socket, tls, router, async move {
            shutdown_signal().await;
            this.cancel_all();
        })
        .await?;
        Ok(())
    }
}

/// First socket address `addr` resolves to; accepts host names as
/// `TcpListener::bind` does.
async fn resolve_addr(addr: &str) -> Result<SocketAddr, ServiceError> {
    tokio::net::lookup_host(addr)
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ServiceError::InvalidAddress(addr.to_string()))
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::YAML;

    #[test]
    fn test_registration_closed_after_router() {
        let service = Service::new("test");
        service.use_middleware(Middleware::new(|h| h)).unwrap();
        assert_eq!(service.state(), ServiceState::Configuring);

        let _router = service.router().unwrap();
        assert_eq!(service.state(), ServiceState::Serving);
        assert!(matches!(
            service.use_middleware(Middleware::new(|h| h)),
            Err(ServiceError::AlreadyServing)
        ));
        assert!(matches!(service.router(), Err(ServiceError::AlreadyServing)));
    }

    #[tokio::test]
    async fn test_registration_racing_router_is_never_lost() {
        use std::sync::Barrier;

        use axum::http::StatusCode;
        use axum::response::Response;
        use tower::ServiceExt;

        let service = Service::new("test");
        let barrier = Arc::new(Barrier::new(9));
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    let handler = MuxHandler::new(|_, _| async { Response::default() });
                    (i, service.handle(Method::GET, &format!("/r{}", i), handler))
                })
            })
            .collect();
        barrier.wait();
        let router = service.router().unwrap();

        for worker in workers {
            let (i, result) = worker.join().unwrap();
            let request = axum::http::Request::builder()
                .uri(format!("/r{}", i))
                .body(axum::body::Body::empty())
                .unwrap();
            let status = router.clone().oneshot(request).await.unwrap().status();
            let expected = match result {
                Ok(()) => StatusCode::OK,
                Err(ServiceError::AlreadyServing) => StatusCode::NOT_FOUND,
                Err(other) => panic!("unexpected error: {other}"),
            };
            assert_eq!(status, expected, "/r{i}");
        }
        assert!(service.routes().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_addr_accepts_host_names() {
        assert!(resolve_addr("localhost:0").await.unwrap().ip().is_loopback());
        assert_eq!(
            resolve_addr("127.0.0.1:8443").await.unwrap(),
            "127.0.0.1:8443".parse::<SocketAddr>().unwrap()
        );
        assert!(matches!(
            resolve_addr("no port here").await,
            Err(ServiceError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_unknown_default_content_type_is_a_setup_error() {
        let service = Service::new("test");
        assert!(matches!(
            service.set_default_content_type("application/xml"),
            Err(ServiceError::UnknownContentType(ct)) if ct == "application/xml"
        ));
        service.set_default_content_type(YAML).unwrap();
        assert_eq!(service.settings().codecs.default_content_type(), Some(YAML));
    }

    #[test]
    fn test_controller_inherits_service_state() {
        let service = Service::new("cellar");
        service.bind("tenant", "acme").unwrap();
        service.use_middleware(Middleware::new(|h| h)).unwrap();

        let mut ctrl = service.new_controller("bottle");
        ctrl.use_middleware(Middleware::new(|h| h));

        assert_eq!(ctrl.name(), "bottle");
        assert_eq!(ctrl.middleware().len(), 2);
        assert_eq!(service.settings().middleware.len(), 1, "service list untouched");
        assert_eq!(ctrl.context().controller(), Some("bottle"));
        assert_eq!(ctrl.context().value::<&str>("tenant"), Some(&"acme"));
        assert_eq!(ctrl.context().service().unwrap().name(), "cellar");
    }

    #[test]
    fn test_cancel_all_reaches_controller_context() {
        let service = Service::new("test");
        let ctrl = service.new_controller("bottle");
        assert!(!ctrl.context().is_cancelled());
        service.cancel_all();
        assert!(ctrl.context().is_cancelled());
        assert_eq!(service.state(), ServiceState::Cancelled);
    }

    #[test]
    fn test_from_config_policy() {
        let mut config = ServiceConfig::default();
        config.errors.policy = ErrorPolicy::Terse;
        config.encoding.default_content_type = YAML.into();
        let service = Service::from_config(&config).unwrap();
        assert_eq!(service.name(), "switchyard");
        assert_eq!(service.settings().codecs.default_content_type(), Some(YAML));
    }

    #[test]
    fn test_service_not_kept_alive_by_controllers() {
        let service = Service::new("test");
        let ctrl = service.new_controller("bottle");
        let handler = crate::http::Handler::new(|_, _, _| async { Ok(()) });
        service
            .handle(Method::GET, "/x", ctrl.mux_handler("x", handler, None))
            .unwrap();
        let weak = service.downgrade();
        drop(service);
        assert!(weak.upgrade().is_none());
        assert!(ctrl.context().service().is_none());
    }

    #[test]
    fn test_router_keeps_service_alive() {
        let service = Service::new("test");
        let ctrl = service.new_controller("bottle");
        let router = service.router().unwrap();
        drop(service);
        assert_eq!(ctrl.context().service().unwrap().name(), "test");
        drop(router);
        assert!(ctrl.context().service().is_none());
    }
}
