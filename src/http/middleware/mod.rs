//! Built-in middleware.
//!
//! Every item returns a [`Middleware`](crate::http::Middleware), usable on
//! a service or a controller.

mod logging;
mod recover;
mod request_id;
mod require_header;

pub use logging::log_request;
pub use recover::recover;
pub use request_id::{request_id, request_id_of, REQUEST_ID_HEADER};
pub use require_header::require_header;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Bytes;
    use axum::http::Request;

    use crate::context::{Context, Params};
    use crate::encoding::Codecs;
    use crate::http::handler::{compose, Handler, HandlerResult, Middleware};
    use crate::http::request::RequestData;
    use crate::http::response::ResponseWriter;

    pub fn request(headers: &[(&str, &str)]) -> Arc<RequestData> {
        let mut builder = Request::builder().uri("/bottles/7");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        Arc::new(RequestData::new(parts, Bytes::new(), Params::new()))
    }

    pub async fn run(m: Middleware, req: Arc<RequestData>, terminal: Handler) -> (ResponseWriter, HandlerResult) {
        let rw = ResponseWriter::new(Codecs::with_defaults().negotiate(None));
        let result = compose(&[m], terminal)
            .call(Context::background(), rw.clone(), req)
            .await;
        (rw, result)
    }
}
