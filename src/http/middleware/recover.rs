use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::http::errors::HandlerError;
use crate::http::handler::{Handler, Middleware};

/// Turn a panic in the downstream chain into an opaque error, answered
/// with a 500 by the error handler.
pub fn recover() -> Middleware {
    Middleware::new(|next| {
        Handler::new(move |ctx, rw, req| {
            let next = next.clone();
            async move {
                match AssertUnwindSafe(next.call(ctx.clone(), rw, req))
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(panic) => {
                        let msg = panic_message(panic.as_ref());
                        ctx.log_error("panic", &[("err", msg.clone())]);
                        Err(HandlerError::opaque(format!("panic: {}", msg)))
                    }
                }
            }
        })
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
