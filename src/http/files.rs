//! Static file mounts.
//!
//! `serve_files("/index.html", "www/index.html")` serves one file;
//! `serve_files("/assets/{*filepath}", "www/assets")` appends the captured
//! tail to the directory.

use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::extract::Request;
use axum::http::Method;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::http::errors::HandlerError;
use crate::http::handler::Handler;
use crate::http::service::{Service, ServiceError};

/// Name of the wildcard capture in `route`, if it ends in `{*name}`.
///
/// Any other parameter makes the route invalid.
pub(crate) fn file_route_wildcard(route: &str) -> Result<Option<String>, ServiceError> {
    let invalid = || ServiceError::InvalidFileRoute(route.to_string());
    if !route.starts_with('/') {
        return Err(invalid());
    }
    let (head, last) = route.rsplit_once('/').ok_or_else(invalid)?;
    if head.contains(['{', '}']) {
        return Err(invalid());
    }
    if !last.contains(['{', '}']) {
        return Ok(None);
    }
    let name = last
        .strip_prefix("{*")
        .and_then(|s| s.strip_suffix('}'))
        .filter(|name| !name.is_empty() && !name.contains(['{', '}']))
        .ok_or_else(invalid)?;
    Ok(Some(name.to_string()))
}

/// Join a captured URL tail onto `base`, refusing anything that escapes it.
fn resolve(base: &Path, tail: &str) -> Option<PathBuf> {
    let mut path = base.to_path_buf();
    for component in Path::new(tail.trim_start_matches('/')).components() {
        match component {
            Component::Normal(segment) => path.push(segment),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

impl Service {
    /// Mount `filename` at `GET route` through a `FileServer` controller.
    pub fn serve_files(&self, route: &str, filename: &Path) -> Result<(), ServiceError> {
        let wildcard = file_route_wildcard(route)?;
        std::fs::metadata(filename).map_err(|source| ServiceError::FileNotFound {
            path: filename.display().to_string(),
            source,
        })?;
        self.log_info(
            "mount file",
            &[
                ("filepath", filename.display().to_string()),
                ("route", format!("GET {}", route)),
            ],
        );

        let base = filename.to_path_buf();
        let ctrl = self.new_controller("FileServer");
        let serve = Handler::new(move |ctx, rw, req| {
            let base = base.clone();
            let wildcard = wildcard.clone();
            async move {
                let mut path = match wildcard.as_deref().and_then(|w| req.params().get(w)) {
                    Some(tail) => match resolve(&base, tail) {
                        Some(path) => path,
                        None => {
                            rw.write_header(axum::http::StatusCode::NOT_FOUND, Default::default())
                                .map_err(HandlerError::opaque)?;
                            return Ok(());
                        }
                    },
                    None => base,
                };
                if path.is_dir() {
                    path.push("index.html");
                }
                ctx.log_info(
                    "serve file",
                    &[
                        ("filepath", path.display().to_string()),
                        ("path", req.path().to_string()),
                    ],
                );

                let mut request = Request::new(Body::empty());
                *request.method_mut() = req.method().clone();
                *request.uri_mut() = req.uri().clone();
                *request.headers_mut() = req.headers().clone();
                let response = match ServeFile::new(&path).oneshot(request).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                };

                let (parts, body) = response.into_parts();
                let bytes = axum::body::to_bytes(Body::new(body), usize::MAX)
                    .await
                    .map_err(HandlerError::opaque)?;
                rw.write_header(parts.status, parts.headers)
                    .map_err(HandlerError::opaque)?;
                rw.write(&bytes).map_err(HandlerError::opaque)?;
                Ok(())
            }
        });

        self.handle(Method::GET, route, ctrl.mux_handler("Serve", serve, None))
    }
}
