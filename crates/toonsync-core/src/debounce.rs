// ── Cancellable debounce timer ──
//
// Each `schedule` restarts the quiet period; only a value that survives it
// is emitted on the output channel.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

pub struct Debouncer<T> {
    delay: Duration,
    tx: mpsc::UnboundedSender<T>,
    pending: Mutex<Option<CancellationToken>>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Create a debouncer and the receiver its settled values arrive on.
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            delay,
            tx,
            pending: Mutex::new(None),
        };
        (debouncer, rx)
    }

    /// Replace any pending value with `value` and restart the timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, value: T) {
        let token = CancellationToken::new();
        if let Some(previous) = self.lock().replace(token.clone()) {
            previous.cancel();
        }

        let deadline = Instant::now() + self.delay;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = sleep_until(deadline) => {
                    let _ = tx.send(value);
                }
            }
        });
    }

    /// Drop the pending value, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.lock().take() {
            token.cancel();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        let pending = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = pending.take() {
            token.cancel();
        }
    }
}
