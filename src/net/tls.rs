//! TLS certificate loading.

use std::io::{Error, ErrorKind};
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Load a rustls configuration from PEM certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, Error> {
    for (what, path) in [("certificate", cert_path), ("private key", key_path)] {
        if !path.is_file() {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("{} file not found: {}", what, path.display()),
            ));
        }
    }
    RustlsConfig::from_pem_file(cert_path, key_path).await
}
