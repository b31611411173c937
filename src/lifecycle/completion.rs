//! One-shot completion signal.
//!
//! # Responsibilities
//! - Tell any number of observers that a server has fully stopped
//! - Transition open → closed exactly once, never back
//!
//! # Design Decisions
//! - Backed by a `watch` channel: one writer ([`Completer`]), many readers
//!   ([`CompletionSignal`])
//! - Closing twice is a no-op
//! - Dropping the [`Completer`] closes the signal, so a watcher task that
//!   panics or is aborted can never leave waiters hanging

use tokio::sync::watch;

/// Create a linked completer / signal pair. The signal starts open.
pub fn pair() -> (Completer, CompletionSignal) {
    let (tx, rx) = watch::channel(false);
    (Completer { tx }, CompletionSignal { rx })
}

/// Write side of a completion signal. Owned by the server that stops.
#[derive(Debug)]
pub struct Completer {
    tx: watch::Sender<bool>,
}

impl Completer {
    /// Close the signal. Safe to call any number of times.
    pub fn complete(&self) {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        });
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        self.complete();
    }
}

/// Read side of a completion signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    rx: watch::Receiver<bool>,
}

impl CompletionSignal {
    /// Whether the signal has already closed.
    pub fn is_closed(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal closes. Returns immediately if it already has.
    pub async fn closed(&self) {
        let mut rx = self.rx.clone();
        // The completer closes before it is dropped, so an Err here still
        // means "closed".
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
