//! Metrics collection and exposition.
//!
//! # Metrics
//! - `switchyard_requests_total` (counter): requests by action, status
//! - `switchyard_request_duration_seconds` (histogram): latency by action
//! - `switchyard_handler_errors_total` (counter): handler errors by status
//!
//! # Design Decisions
//! - Error counters go through [`Reporter`], a bounded channel drained by a
//!   background task; a full buffer drops the report
//! - Request counters are plain facade calls (atomic increments)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(action: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("switchyard_requests_total", "action" => action.to_string(), "status" => status)
        .increment(1);
    histogram!("switchyard_request_duration_seconds", "action" => action.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// A diagnostic event sent off the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// A handler or middleware returned an error resolved to `status`.
    HandlerError { status: u16 },
}

/// Best-effort asynchronous reporting channel.
///
/// [`Reporter::report`] never blocks and never fails visibly: when the
/// buffer is full the report is dropped and counted.
#[derive(Debug)]
pub struct Reporter {
    tx: mpsc::Sender<Report>,
    rx: Mutex<Option<mpsc::Receiver<Report>>>,
    started: AtomicBool,
    dropped: AtomicU64,
}

impl Reporter {
    /// Create a reporter buffering at most `capacity` reports.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            started: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Spawn the drain task on the current tokio runtime, once.
    ///
    /// Outside a runtime this is a no-op and reports accumulate in the
    /// buffer until a later call succeeds.
    pub fn start(&self) -> bool {
        if self.started.load(Ordering::Acquire) {
            return true;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(rx) = rx {
            handle.spawn(drain(rx));
        }
        self.started.store(true, Ordering::Release);
        true
    }

    /// Enqueue a report without waiting.
    pub fn report(&self, report: Report) {
        self.start();
        match self.tx.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of reports dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn drain(mut rx: mpsc::Receiver<Report>) {
    while let Some(report) = rx.recv().await {
        match report {
            Report::HandlerError { status } => {
                counter!("switchyard_handler_errors_total", "status" => status.to_string())
                    .increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_is_dropped_silently() {
        // no runtime: nothing drains the buffer
        let reporter = Reporter::new(2);
        for _ in 0..5 {
            reporter.report(Report::HandlerError { status: 500 });
        }
        assert_eq!(reporter.dropped(), 3);
    }

    #[tokio::test]
    async fn test_drain_keeps_buffer_free() {
        let reporter = Reporter::new(1);
        assert!(reporter.start());
        for _ in 0..20 {
            reporter.report(Report::HandlerError { status: 404 });
            tokio::task::yield_now().await;
        }
        assert!(reporter.dropped() < 20);
    }
}
