//! Termination triggers.
//!
//! # Responsibilities
//! - Register handlers for SIGHUP, SIGINT, SIGQUIT and SIGTERM
//! - Forward every occurrence, not just the first, as a [`Trigger`]
//! - Offer a manual source for programmatic shutdown and tests
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The first trigger starts a graceful drain, a second one forces the
//!   drain wait to end; the coordinator decides, this module only reports
//! - Ctrl+C is the only trigger on non-unix platforms

use std::fmt;
use tokio::sync::mpsc;
use tokio_util::task::AbortOnDropHandle;

/// What asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Hangup,
    Interrupt,
    Quit,
    Terminate,
    /// Raised through a [`TriggerHandle`].
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Hangup => "SIGHUP",
            Trigger::Interrupt => "SIGINT",
            Trigger::Quit => "SIGQUIT",
            Trigger::Terminate => "SIGTERM",
            Trigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// A stream of termination triggers consumed by the shutdown coordinator.
pub struct ShutdownTriggers {
    rx: mpsc::UnboundedReceiver<Trigger>,
    _listener: Option<AbortOnDropHandle<()>>,
}

impl ShutdownTriggers {
    /// Listen for OS termination signals.
    ///
    /// Must be called from within a Tokio runtime. Fails if a handler cannot
    /// be registered.
    pub fn os() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = tokio::spawn(forward_os_signals(tx)?);

        Ok(Self {
            rx,
            _listener: Some(AbortOnDropHandle::new(listener)),
        })
    }

    /// A trigger source driven by hand.
    pub fn manual() -> (TriggerHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            TriggerHandle { tx },
            Self {
                rx,
                _listener: None,
            },
        )
    }

    /// Wait for the next trigger.
    ///
    /// Never resolves once every sender is gone; a closed source is not a
    /// reason to shut down.
    pub async fn next(&mut self) -> Trigger {
        match self.rx.recv().await {
            Some(trigger) => trigger,
            None => std::future::pending().await,
        }
    }
}

/// Raises [`Trigger::Manual`] on the paired [`ShutdownTriggers`].
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::UnboundedSender<Trigger>,
}

impl TriggerHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(Trigger::Manual);
    }
}

#[cfg(unix)]
fn forward_os_signals(
    tx: mpsc::UnboundedSender<Trigger>,
) -> std::io::Result<impl std::future::Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        loop {
            let trigger = tokio::select! {
                _ = hangup.recv() => Trigger::Hangup,
                _ = interrupt.recv() => Trigger::Interrupt,
                _ = quit.recv() => Trigger::Quit,
                _ = terminate.recv() => Trigger::Terminate,
            };
            tracing::debug!(signal = %trigger, "termination signal received");
            if tx.send(trigger).is_err() {
                break;
            }
        }
    })
}

#[cfg(not(unix))]
fn forward_os_signals(
    tx: mpsc::UnboundedSender<Trigger>,
) -> std::io::Result<impl std::future::Future<Output = ()> + Send + 'static> {
    Ok(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Ctrl+C received");
            if tx.send(Trigger::Interrupt).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn manual_triggers_arrive_in_order() {
        let (handle, mut triggers) = ShutdownTriggers::manual();
        handle.trigger();
        handle.trigger();

        assert_eq!(triggers.next().await, Trigger::Manual);
        assert_eq!(triggers.next().await, Trigger::Manual);
    }

    #[tokio::test]
    async fn dropped_handle_never_triggers() {
        let (handle, mut triggers) = ShutdownTriggers::manual();
        drop(handle);

        let waited = tokio::time::timeout(Duration::from_millis(50), triggers.next()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn trigger_names() {
        assert_eq!(Trigger::Hangup.to_string(), "SIGHUP");
        assert_eq!(Trigger::Quit.to_string(), "SIGQUIT");
        assert_eq!(Trigger::Manual.to_string(), "manual");
    }
}
