//! Process-wide shutdown token.
//!
//! A shared cancellation flag handed to every long-running task: the
//! terminal reader, streaming text callbacks, the Telegram poller, the
//! WebSocket accept loop, and the cron scheduler's sleep. The signal
//! handler triggers it once; observers either poll [`Shutdown::is_shutdown`]
//! at suspension points or await [`Shutdown::cancelled`] in a `select!`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    triggered: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag and wake every waiter. Idempotent.
    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once the token is triggered.
    pub async fn cancelled(&self) {
        if self.is_shutdown() {
            return;
        }
        // Re-check after registering: trigger() may race the notified() setup.
        let notified = self.inner.notify.notified();
        if self.is_shutdown() {
            return;
        }
        notified.await;
    }
}
