use std::time::Instant;

use crate::http::handler::{Handler, Middleware};

/// Log each request as it starts and once it completes.
pub fn log_request() -> Middleware {
    Middleware::new(|next| {
        Handler::new(move |ctx, rw, req| {
            let next = next.clone();
            async move {
                let start = Instant::now();
                let mut fields = vec![
                    ("method", req.method().to_string()),
                    ("path", req.path().to_string()),
                ];
                if !req.params().is_empty() {
                    let mut params: Vec<String> = req
                        .params()
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v.join(",")))
                        .collect();
                    params.sort();
                    fields.push(("params", params.join("&")));
                }
                ctx.log_info("started", &fields);

                let result = next.call(ctx.clone(), rw.clone(), req).await;

                let status = match (&result, rw.status()) {
                    (_, Some(status)) => status.as_u16().to_string(),
                    (Err(err), None) => err.status().as_u16().to_string(),
                    (Ok(()), None) => "200".to_string(),
                };
                ctx.log_info(
                    "completed",
                    &[
                        ("status", status),
                        ("bytes", rw.len().to_string()),
                        ("time", format!("{:?}", start.elapsed())),
                    ],
                );
                result
            }
        })
    })
}
