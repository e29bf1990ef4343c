//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name used in logs.
    pub name: String,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Error handler policy.
    pub errors: ErrorConfig,

    /// Request/response encoding.
    pub encoding: EncodingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Static file mounts.
    pub files: Vec<FileMount>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "switchyard".to_string(),
            listener: ListenerConfig::default(),
            errors: ErrorConfig::default(),
            encoding: EncodingConfig::default(),
            observability: ObservabilityConfig::default(),
            files: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration; plaintext when absent.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Which error handler the service installs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Error messages reach the client.
    #[default]
    Verbose,
    /// Internal errors are replaced by a generic message.
    Terse,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorConfig {
    pub policy: ErrorPolicy,
}

/// Encoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Content type used when the client expresses no preference.
    pub default_content_type: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            default_content_type: "application/json".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Capacity of the error report buffer.
    pub report_buffer: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            report_buffer: 1024,
        }
    }
}

/// A static file mount: `route` may end with a `{*name}` wildcard.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileMount {
    pub route: String,
    pub path: String,
}
