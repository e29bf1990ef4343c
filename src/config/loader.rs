//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ErrorPolicy, LogFormat};

    #[test]
    fn test_parse_partial_config() {
        let config = parse_config(
            r#"
            name = "cellar"

            [listener]
            bind_address = "127.0.0.1:9000"

            [errors]
            policy = "terse"

            [observability]
            log_format = "json"

            [[files]]
            route = "/swagger/{*filepath}"
            path = "public/swagger"
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "cellar");
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.errors.policy, ErrorPolicy::Terse);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.encoding.default_content_type, "application/json");
        assert_eq!(config.files.len(), 1);
    }

    #[test]
    fn test_validation_failure_is_reported() {
        let err = parse_config("[encoding]\nmax_body_bytes = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref v) if v.len() == 1));
        assert!(err.to_string().contains("encoding.max_body_bytes"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
