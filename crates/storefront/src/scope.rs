//! Liveness guard for asynchronous completions.
//!
//! Remote calls cannot be cancelled once issued. Every owner of state that a
//! call will update (the cart manager, a checkout flow, an order-history view)
//! holds a [`Scope`]; the completion checks [`Scope::is_live`] before
//! committing and drops the result once the owner has been torn down.

use tokio::sync::watch;

/// A closable liveness flag. Clones share the flag.
#[derive(Debug, Clone)]
pub struct Scope {
    closed: watch::Sender<bool>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// A new, live scope.
    #[must_use]
    pub fn new() -> Self {
        let (closed, _rx) = watch::channel(false);
        Self { closed }
    }

    /// Whether the owner is still alive.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !*self.closed.borrow()
    }

    /// Tear the scope down. Idempotent.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Resolve once the scope has been closed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives in `self`, so this only returns once closed.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
