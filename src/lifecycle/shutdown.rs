//! Shutdown coordination for a set of servers.

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::ServerError;
use crate::lifecycle::completion::CompletionSignal;
use crate::lifecycle::signals::ShutdownTriggers;
use crate::lifecycle::waiter::wait_for_signals;
use crate::server::Server;

/// Default time allowed for all servers to stop once draining starts.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the coordinator is in its single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Nothing started yet.
    Idle,
    /// Servers running, waiting for a trigger.
    Running,
    /// Shutdown requested, waiting for servers to stop.
    Draining,
    /// A second trigger arrived; the drain wait was abandoned.
    Terminating,
    /// Terminal.
    Stopped,
}

/// Starts servers, waits for a termination trigger, then drains them.
///
/// Holds the only cancel capability for the shared shutdown token; servers
/// receive child tokens. One instance per process run.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    signals: Vec<CompletionSignal>,
    drain_timeout: Duration,
    state: watch::Sender<CoordinatorState>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with its own root token.
    pub fn new(drain_timeout: Duration) -> Self {
        Self::from_token(CancellationToken::new(), drain_timeout)
    }

    /// Create a coordinator whose drain also starts when `parent` is cancelled.
    pub fn with_parent(parent: &CancellationToken, drain_timeout: Duration) -> Self {
        Self::from_token(parent.child_token(), drain_timeout)
    }

    fn from_token(token: CancellationToken, drain_timeout: Duration) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        Self {
            token,
            signals: Vec::new(),
            drain_timeout,
            state,
        }
    }

    /// A token that is cancelled when draining starts.
    ///
    /// Cancelling the returned token does not affect the coordinator.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Start a server and track its completion signal.
    ///
    /// Registration errors propagate; servers already started keep running
    /// until [`run`](Self::run) drains them.
    pub async fn start<S>(&mut self, server: S) -> Result<(), ServerError>
    where
        S: Server + 'static,
    {
        let name = server.name().to_string();
        let signal = Box::new(server).start(self.shutdown_token()).await?;
        tracing::debug!(server = %name, "server started");
        self.track(signal);
        Ok(())
    }

    /// Track a signal from a server started elsewhere.
    pub fn track(&mut self, signal: CompletionSignal) {
        self.signals.push(signal);
        self.state.send_if_modified(|state| {
            if *state == CoordinatorState::Idle {
                *state = CoordinatorState::Running;
                true
            } else {
                false
            }
        });
    }

    /// Current state.
    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    /// Observe state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// Block until a trigger (or parent cancellation), then drain.
    ///
    /// Returns `true` when every tracked server stopped before the drain
    /// deadline. A second trigger while draining ends the wait early with
    /// `false`, unless every server has already stopped by then. Never
    /// fails: the outcome is logged either way.
    pub async fn run(self, mut triggers: ShutdownTriggers) -> bool {
        let span = tracing::info_span!("graceful");
        let Self {
            token,
            signals,
            drain_timeout,
            state,
        } = self;

        async move {
            state.send_replace(CoordinatorState::Running);

            tokio::select! {
                trigger = triggers.next() => {
                    tracing::info!(signal = %trigger, "shutting down gracefully");
                }
                _ = token.cancelled() => {
                    tracing::info!("shutdown requested, shutting down gracefully");
                }
            }

            state.send_replace(CoordinatorState::Draining);
            token.cancel();

            tracing::info!(
                servers = signals.len(),
                drain_timeout = ?drain_timeout,
                "waiting for servers to stop"
            );

            // The drain deadline is independent of the (already cancelled)
            // shutdown token.
            let drained = wait_for_signals(tokio::time::sleep(drain_timeout), &signals);
            tokio::pin!(drained);

            // A finished drain outranks a trigger that is already queued.
            let all_stopped = tokio::select! {
                biased;
                all_stopped = &mut drained => all_stopped,
                trigger = triggers.next() => {
                    state.send_replace(CoordinatorState::Terminating);
                    tracing::info!(signal = %trigger, "terminating");
                    false
                }
            };

            if !all_stopped {
                let still_running = signals.iter().filter(|s| !s.is_closed()).count();
                tracing::warn!(still_running, "not all servers stopped in time");
            }

            tracing::info!("exiting normally");
            state.send_replace(CoordinatorState::Stopped);
            all_stopped
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::completion;
    use async_trait::async_trait;
    use std::time::Instant;

    /// Stops `stop_after` after cancellation, or never.
    struct FakeServer {
        stop_after: Option<Duration>,
    }

    #[async_trait]
    impl Server for FakeServer {
        fn name(&self) -> &str {
            "fake"
        }

        async fn start(
            self: Box<Self>,
            shutdown: CancellationToken,
        ) -> Result<CompletionSignal, ServerError> {
            let (completer, signal) = completion::pair();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                match self.stop_after {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        completer.complete();
                    }
                    None => {
                        let _completer = completer;
                        std::future::pending::<()>().await;
                    }
                }
            });
            Ok(signal)
        }
    }

    struct FailingServer;

    #[async_trait]
    impl Server for FailingServer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn start(
            self: Box<Self>,
            _shutdown: CancellationToken,
        ) -> Result<CompletionSignal, ServerError> {
            Err(ServerError::Register("boom".into()))
        }
    }

    fn stops_after(ms: u64) -> FakeServer {
        FakeServer {
            stop_after: Some(Duration::from_millis(ms)),
        }
    }

    #[tokio::test]
    async fn starts_idle_then_running() {
        let mut coordinator = ShutdownCoordinator::new(DEFAULT_DRAIN_TIMEOUT);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);

        coordinator.start(stops_after(0)).await.unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Running);
    }

    #[tokio::test]
    async fn registration_error_propagates() {
        let mut coordinator = ShutdownCoordinator::new(DEFAULT_DRAIN_TIMEOUT);
        let err = coordinator.start(FailingServer).await.unwrap_err();
        assert!(matches!(err, ServerError::Register(_)));
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn trigger_drains_all_servers() {
        let mut coordinator = ShutdownCoordinator::new(DEFAULT_DRAIN_TIMEOUT);
        coordinator.start(stops_after(50)).await.unwrap();
        coordinator.start(stops_after(100)).await.unwrap();
        let state = coordinator.subscribe_state();

        let (handle, triggers) = ShutdownTriggers::manual();
        handle.trigger();

        let start = Instant::now();
        assert!(coordinator.run(triggers).await);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(*state.borrow(), CoordinatorState::Stopped);
    }

    #[tokio::test]
    async fn servers_see_cancellation() {
        let mut coordinator = ShutdownCoordinator::new(DEFAULT_DRAIN_TIMEOUT);
        let observed = coordinator.shutdown_token();
        coordinator.start(stops_after(0)).await.unwrap();

        let (handle, triggers) = ShutdownTriggers::manual();
        handle.trigger();
        assert!(coordinator.run(triggers).await);
        assert!(observed.is_cancelled());
    }

    #[tokio::test]
    async fn parent_cancellation_starts_drain() {
        let parent = CancellationToken::new();
        let mut coordinator = ShutdownCoordinator::with_parent(&parent, DEFAULT_DRAIN_TIMEOUT);
        coordinator.start(stops_after(10)).await.unwrap();

        let (_handle, triggers) = ShutdownTriggers::manual();
        let run = tokio::spawn(coordinator.run(triggers));

        tokio::time::sleep(Duration::from_millis(20)).await;
        parent.cancel();

        let all_stopped = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("coordinator should finish")
            .unwrap();
        assert!(all_stopped);
    }

    #[tokio::test]
    async fn slow_server_misses_drain_deadline() {
        let mut coordinator = ShutdownCoordinator::new(Duration::from_millis(100));
        coordinator.start(stops_after(0)).await.unwrap();
        coordinator.start(stops_after(2_000)).await.unwrap();

        let (handle, triggers) = ShutdownTriggers::manual();
        handle.trigger();

        let start = Instant::now();
        assert!(!coordinator.run(triggers).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn second_trigger_abandons_drain() {
        let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(30));
        coordinator
            .start(FakeServer { stop_after: None })
            .await
            .unwrap();
        let state = coordinator.subscribe_state();

        let (handle, triggers) = ShutdownTriggers::manual();
        handle.trigger();
        let second = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            second.trigger();
        });

        let start = Instant::now();
        let all_stopped = tokio::time::timeout(Duration::from_secs(2), coordinator.run(triggers))
            .await
            .expect("second trigger should end the wait");
        assert!(!all_stopped);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(*state.borrow(), CoordinatorState::Stopped);
    }

    #[tokio::test]
    async fn queued_second_trigger_loses_to_finished_drain() {
        for _ in 0..32 {
            let mut coordinator = ShutdownCoordinator::new(DEFAULT_DRAIN_TIMEOUT);
            let (completer, signal) = completion::pair();
            completer.complete();
            coordinator.track(signal);

            let (handle, triggers) = ShutdownTriggers::manual();
            handle.trigger();
            handle.trigger();
            assert!(coordinator.run(triggers).await);
        }
    }

    #[tokio::test]
    async fn no_servers_exits_cleanly() {
        let coordinator = ShutdownCoordinator::new(DEFAULT_DRAIN_TIMEOUT);
        let (handle, triggers) = ShutdownTriggers::manual();
        handle.trigger();
        assert!(coordinator.run(triggers).await);
    }
}
