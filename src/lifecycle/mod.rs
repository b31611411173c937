//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (shutdown.rs):
//!     Create shutdown token → Start servers → Collect completion signals
//!
//! Shutdown (shutdown.rs):
//!     Trigger received → Cancel token → Servers stop → Wait (waiter.rs)
//!
//! Signals (signals.rs):
//!     SIGHUP/SIGINT/SIGQUIT/SIGTERM → first: drain, second: stop waiting
//! ```
//!
//! # Design Decisions
//! - Each server owns its completion signal (completion.rs); the coordinator
//!   only reads them
//! - Per-server stop bounds and the aggregate drain deadline are separate
//! - Drain has timeout: exit proceeds after the deadline either way

pub mod completion;
pub mod shutdown;
pub mod signals;
pub mod waiter;

pub use completion::{Completer, CompletionSignal};
pub use shutdown::{CoordinatorState, ShutdownCoordinator, DEFAULT_DRAIN_TIMEOUT};
pub use signals::{ShutdownTriggers, Trigger, TriggerHandle};
pub use waiter::{wait_for_signals, wait_with_timeout};
