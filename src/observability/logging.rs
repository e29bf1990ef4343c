//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber
//! - Define the [`Logger`] collaborator bound into request contexts
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and `RUST_LOG`

use std::fmt;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Key/value pairs accumulated by [`Context::log_with`](crate::context::Context::log_with).
pub type Fields = Vec<(String, String)>;

/// Leveled logging backend.
///
/// Contexts carry an `Arc<dyn Logger>` together with their accumulated
/// fields so nested layers can log without knowing the backend.
pub trait Logger: Send + Sync {
    fn info(&self, msg: &str, fields: &[(String, String)]);
    fn error(&self, msg: &str, fields: &[(String, String)]);
}

/// Default backend: emits `tracing` events under the `switchyard` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, msg: &str, fields: &[(String, String)]) {
        tracing::info!(target: "switchyard", fields = %Rendered(fields), "{}", msg);
    }

    fn error(&self, msg: &str, fields: &[(String, String)]) {
        tracing::error!(target: "switchyard", fields = %Rendered(fields), "{}", msg);
    }
}

/// Shared default logger.
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

/// Renders fields as `k=v k2=v2`.
pub struct Rendered<'a>(pub &'a [(String, String)]);

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.log_level`. Returns `false` if a subscriber
/// was already installed.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchyard={0},tower_http={0}", config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.is_ok()
}
