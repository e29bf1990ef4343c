//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::encoding::BUILTIN_CONTENT_TYPES;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("unsupported content type {0:?}")]
    UnsupportedContentType(String),

    #[error("file route {0:?} must start with '/'")]
    InvalidRoute(String),

    #[error("file route {0:?} is mounted more than once")]
    DuplicateRoute(String),
}

/// Check semantic constraints serde cannot express.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.name.trim().is_empty() {
        errors.push(ValidationError::Empty("name"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::Empty("listener.tls.cert_path"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::Empty("listener.tls.key_path"));
        }
    }

    let content_type = config.encoding.default_content_type.to_ascii_lowercase();
    if !BUILTIN_CONTENT_TYPES.contains(&content_type.as_str()) {
        errors.push(ValidationError::UnsupportedContentType(
            config.encoding.default_content_type.clone(),
        ));
    }
    if config.encoding.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("encoding.max_body_bytes"));
    }

    if config.observability.report_buffer == 0 {
        errors.push(ValidationError::Zero("observability.report_buffer"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let mut seen = HashSet::new();
    for mount in &config.files {
        if !mount.route.starts_with('/') {
            errors.push(ValidationError::InvalidRoute(mount.route.clone()));
        }
        if mount.path.is_empty() {
            errors.push(ValidationError::Empty("files.path"));
        }
        if !seen.insert(mount.route.as_str()) {
            errors.push(ValidationError::DuplicateRoute(mount.route.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{FileMount, TlsConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServiceConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServiceConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.listener.tls = Some(TlsConfig {
            cert_path: String::new(),
            key_path: "key.pem".into(),
        });
        config.encoding.default_content_type = "application/xml".into();
        config.files = vec![
            FileMount { route: "/static".into(), path: "www".into() },
            FileMount { route: "/static".into(), path: "www".into() },
            FileMount { route: "relative".into(), path: "www".into() },
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5, "{:?}", errors);
        assert!(errors.contains(&ValidationError::Empty("listener.tls.cert_path")));
        assert!(errors.contains(&ValidationError::DuplicateRoute("/static".into())));
        assert!(errors.contains(&ValidationError::InvalidRoute("relative".into())));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ServiceConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
