//! Transport bindings for a compiled router.
//!
//! # Responsibilities
//! - Serve plaintext HTTP on a bound listener
//! - Serve HTTPS through `axum-server` with rustls
//! - Drain connections once the shutdown future resolves

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::net::TcpListener;

/// Grace period for in-flight TLS connections after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn serve_plain<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

pub async fn serve_tls<F>(addr: SocketAddr, tls: RustlsConfig, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = Handle::new();
    let drain = handle.clone();
    tokio::spawn(async move {
        shutdown.await;
        drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
    });

    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    tracing::info!("HTTPS server stopped");
    Ok(())
}
