use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use regex::Regex;

use crate::http::errors::HandlerError;
use crate::http::handler::{Handler, Middleware};

/// Answer `failure` without calling the rest of the chain unless header
/// `name` is present and, when `pattern` is set, matches it.
pub fn require_header(name: &str, pattern: Option<Regex>, failure: StatusCode) -> Middleware {
    let name: Arc<str> = Arc::from(name);
    let pattern = pattern.map(Arc::new);
    Middleware::new(move |next| {
        let name = name.clone();
        let pattern = pattern.clone();
        Handler::new(move |ctx, rw, req| {
            let next = next.clone();
            let name = name.clone();
            let pattern = pattern.clone();
            async move {
                let accepted = match (req.header(&name), &pattern) {
                    (None, _) => false,
                    (Some(_), None) => true,
                    (Some(value), Some(re)) => re.is_match(value),
                };
                if accepted {
                    return next.call(ctx, rw, req).await;
                }
                ctx.log_info(
                    "header check failed",
                    &[("header", name.to_string()), ("status", failure.as_u16().to_string())],
                );
                rw.write_header(failure, HeaderMap::new())
                    .map_err(HandlerError::opaque)
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::http::middleware::test_support::{request, run};

    fn flagging(hit: Arc<AtomicBool>) -> Handler {
        Handler::new(move |_, _, _| {
            let hit = hit.clone();
            async move {
                hit.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_rejects_missing_and_mismatched() {
        let pattern = Regex::new(r"^Bearer \w+$").unwrap();
        for headers in [vec![], vec![("Authorization", "Basic xyz")]] {
            let hit = Arc::new(AtomicBool::new(false));
            let m = require_header("Authorization", Some(pattern.clone()), StatusCode::UNAUTHORIZED);
            let (rw, result) = run(m, request(&headers), flagging(hit.clone())).await;
            result.unwrap();
            assert!(!hit.load(Ordering::SeqCst));
            assert_eq!(rw.status(), Some(StatusCode::UNAUTHORIZED));
        }
    }

    #[tokio::test]
    async fn test_accepts_matching_header() {
        let hit = Arc::new(AtomicBool::new(false));
        let m = require_header(
            "Authorization",
            Some(Regex::new(r"^Bearer \w+$").unwrap()),
            StatusCode::UNAUTHORIZED,
        );
        let (rw, _) = run(m, request(&[("Authorization", "Bearer tok")]), flagging(hit.clone())).await;
        assert!(hit.load(Ordering::SeqCst));
        assert_eq!(rw.status(), None);

        let hit = Arc::new(AtomicBool::new(false));
        let m = require_header("X-Tenant", None, StatusCode::BAD_REQUEST);
        run(m, request(&[("X-Tenant", "acme")]), flagging(hit.clone())).await;
        assert!(hit.load(Ordering::SeqCst));
    }
}
