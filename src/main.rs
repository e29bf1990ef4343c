//! switchyard demo server.
//!
//! Loads a TOML configuration, mounts the cellar sommelier resource and the
//! configured static files, then serves plaintext HTTP or HTTPS until
//! Ctrl+C.
//!
//! ```text
//! switchyard --config switchyard.toml
//! switchyard --bind 127.0.0.1:8080 --terse
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use switchyard::cellar::{self, Sommelier};
use switchyard::config::{load_config, validate_config, ErrorPolicy, ServiceConfig};
use switchyard::middleware::{log_request, recover, request_id};
use switchyard::observability::{logging::init_logging, metrics::init_metrics};
use switchyard::Service;

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "HTTP dispatch runtime serving the cellar demo", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Hide internal error details from clients.
    #[arg(long)]
    terse: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if cli.terse {
        config.errors.policy = ErrorPolicy::Terse;
    }
    validate_config(&config).map_err(|errors| {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    })?;

    init_logging(&config.observability);
    tracing::info!(
        name = %config.name,
        bind_address = %config.listener.bind_address,
        policy = ?config.errors.policy,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let service = Service::from_config(&config)?;
    service.use_middleware(request_id())?;
    service.use_middleware(log_request())?;
    service.use_middleware(recover())?;
    cellar::mount(&service, Arc::new(Sommelier::seeded()))?;
    for mount in &config.files {
        service.serve_files(&mount.route, Path::new(&mount.path))?;
    }

    match &config.listener.tls {
        Some(tls) => {
            service
                .listen_and_serve_tls(
                    &config.listener.bind_address,
                    Path::new(&tls.cert_path),
                    Path::new(&tls.key_path),
                )
                .await?
        }
        None => service.listen_and_serve(&config.listener.bind_address).await?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
