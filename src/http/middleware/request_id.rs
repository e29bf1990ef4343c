use axum::http::{HeaderName, HeaderValue};

use crate::context::Context;
use crate::http::handler::{Handler, Middleware};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const REQUEST_ID_KEY: &str = "switchyard.request_id";

/// Request ids longer than this are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Reuse the client's `X-Request-Id` or generate one, bind it into the
/// context and logger fields, and echo it on the response.
pub fn request_id() -> Middleware {
    Middleware::new(|next| {
        Handler::new(move |ctx, rw, req| {
            let next = next.clone();
            async move {
                let id = req
                    .header(REQUEST_ID_HEADER)
                    .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
                    .map(str::to_string)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                if let Ok(value) = HeaderValue::from_str(&id) {
                    rw.set_header(HeaderName::from_static(REQUEST_ID_HEADER), value);
                }
                let ctx = ctx.log_with("req_id", &id).derive(REQUEST_ID_KEY, id);
                next.call(ctx, rw, req).await
            }
        })
    })
}

/// Id bound by [`request_id`].
pub fn request_id_of(ctx: &Context) -> Option<&str> {
    ctx.value::<String>(REQUEST_ID_KEY).map(String::as_str)
}
