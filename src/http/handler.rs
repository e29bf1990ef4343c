//! Handlers, middleware and their composition.
//!
//! A [`Handler`] receives the request context, the response writer and the
//! request, and returns `Ok(())` or an error for the error handler. A
//! [`Middleware`] turns one handler into another.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::Context;
use crate::http::errors::HandlerError;
use crate::http::request::RequestData;
use crate::http::response::ResponseWriter;

pub type HandlerResult = Result<(), HandlerError>;

type HandlerFn =
    dyn Fn(Context, ResponseWriter, Arc<RequestData>) -> BoxFuture<'static, HandlerResult> + Send + Sync;

#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, ResponseWriter, Arc<RequestData>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self(Arc::new(move |ctx, rw, req| Box::pin(f(ctx, rw, req))))
    }

    pub fn call(
        &self,
        ctx: Context,
        rw: ResponseWriter,
        req: Arc<RequestData>,
    ) -> BoxFuture<'static, HandlerResult> {
        (self.0)(ctx, rw, req)
    }
}

#[derive(Clone)]
pub struct Middleware(Arc<dyn Fn(Handler) -> Handler + Send + Sync>);

impl Middleware {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Handler) -> Handler + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Middleware running `before` ahead of the wrapped handler and `after`
    /// once it returned, with its result.
    pub fn around<B, A>(before: B, after: A) -> Self
    where
        B: Fn(&Context, &RequestData) + Send + Sync + 'static,
        A: Fn(&Context, &ResponseWriter, &HandlerResult) + Send + Sync + 'static,
    {
        let before = Arc::new(before);
        let after = Arc::new(after);
        Self::new(move |next| {
            let before = before.clone();
            let after = after.clone();
            Handler::new(move |ctx, rw, req| {
                let next = next.clone();
                let before = before.clone();
                let after = after.clone();
                async move {
                    before(&ctx, req.as_ref());
                    let result = next.call(ctx.clone(), rw.clone(), req).await;
                    after(&ctx, &rw, &result);
                    result
                }
            })
        })
    }

    pub fn wrap(&self, handler: Handler) -> Handler {
        (self.0)(handler)
    }
}

/// Fold `chain` around `terminal` so that `[m1, m2, m3]` yields
/// `m1(m2(m3(terminal)))`.
///
/// The first middleware is the outermost layer: its pre-logic runs first and
/// its post-logic runs last. Folding from the innermost handler outward keeps
/// that order.
pub fn compose(chain: &[Middleware], terminal: Handler) -> Handler {
    chain.iter().rev().fold(terminal, |next, m| m.wrap(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Params;
    use axum::body::Bytes;
    use axum::http::Request;
    use std::sync::Mutex;

    fn request() -> Arc<RequestData> {
        let (parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        Arc::new(RequestData::new(parts, Bytes::new(), Params::new()))
    }

    fn recording(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Middleware {
        let pre = log.clone();
        Middleware::around(
            move |_, _| pre.lock().unwrap().push(format!("{name} pre")),
            move |_, _, _| log.lock().unwrap().push(format!("{name} post")),
        )
    }

    #[tokio::test]
    async fn test_first_declared_runs_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<_> = ["m1", "m2", "m3"]
            .into_iter()
            .map(|n| recording(n, log.clone()))
            .collect();
        let inner = log.clone();
        let terminal = Handler::new(move |_, _, _| {
            let inner = inner.clone();
            async move {
                inner.lock().unwrap().push("h".to_string());
                Ok(())
            }
        });

        compose(&chain, terminal)
            .call(Context::background(), ResponseWriter::new(None), request())
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["m1 pre", "m2 pre", "m3 pre", "h", "m3 post", "m2 post", "m1 post"]
        );
    }

    #[tokio::test]
    async fn test_middleware_can_short_circuit() {
        let blocked = Middleware::new(|_next| {
            Handler::new(|_, _, _| async { Err(HandlerError::opaque("denied")) })
        });
        let reached = Arc::new(Mutex::new(false));
        let flag = reached.clone();
        let terminal = Handler::new(move |_, _, _| {
            let flag = flag.clone();
            async move {
                *flag.lock().unwrap() = true;
                Ok(())
            }
        });

        let result = compose(&[blocked], terminal)
            .call(Context::background(), ResponseWriter::new(None), request())
            .await;
        assert!(result.is_err());
        assert!(!*reached.lock().unwrap());
    }

    #[tokio::test]
    async fn test_empty_chain_is_terminal() {
        let terminal = Handler::new(|_, _, _| async { Err(HandlerError::opaque("terminal")) });
        let err = compose(&[], terminal)
            .call(Context::background(), ResponseWriter::new(None), request())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "terminal");
    }
}
