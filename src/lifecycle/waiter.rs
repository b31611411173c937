//! Wait for a set of completion signals against a deadline.

use std::future::Future;
use std::time::Duration;

use tokio_util::task::AbortOnDropHandle;

use crate::lifecycle::completion::CompletionSignal;

/// Wait until every signal has closed or `done` resolves, whichever is first.
///
/// Returns `true` only when all signals closed. Signals that are already
/// closed on entry win regardless of `done`, so an empty set always yields
/// `true`. A `false` result does not stop the signals from closing later.
pub async fn wait_for_signals<F>(done: F, signals: &[CompletionSignal]) -> bool
where
    F: Future<Output = ()>,
{
    if signals.iter().all(CompletionSignal::is_closed) {
        return true;
    }

    let pending = signals.to_vec();
    // Aborted if `done` wins or the caller drops us.
    let mut all_closed = AbortOnDropHandle::new(tokio::spawn(async move {
        for signal in &pending {
            signal.closed().await;
        }
    }));

    tokio::select! {
        biased;
        joined = &mut all_closed => joined.is_ok(),
        _ = done => false,
    }
}

/// [`wait_for_signals`] bounded by a plain timeout.
pub async fn wait_with_timeout(timeout: Duration, signals: &[CompletionSignal]) -> bool {
    wait_for_signals(tokio::time::sleep(timeout), signals).await
}
