//! Cancellation broadcast for a service and every context derived from it.

use tokio::sync::watch;

/// Coordinator for service-wide cancellation.
///
/// Holds the sending half of a watch channel; every [`CancelToken`] handed
/// out observes the same flag.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new, untriggered coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Hand out a token observing this coordinator.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Broadcast cancellation. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`Shutdown::trigger`] has been called.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Number of live tokens.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation signal carried by a [`Context`](crate::context::Context).
///
/// Handlers either poll [`CancelToken::is_cancelled`] or `select!` on
/// [`CancelToken::cancelled`]. Nothing is interrupted forcibly.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Non-blocking check.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been broadcast.
    ///
    /// Never resolves if the coordinator is dropped without triggering.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_trigger_reaches_all_tokens() {
        let shutdown = Shutdown::new();
        let a = shutdown.token();
        let b = a.clone();
        assert!(!a.is_cancelled());

        shutdown.trigger();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(shutdown.is_triggered());

        // second trigger is harmless
        shutdown.trigger();
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();

        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("token did not observe cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn test_token_created_after_trigger_is_cancelled() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let token = shutdown.token();
        assert!(token.is_cancelled());
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }
}
