//! Server handles.
//!
//! # Data Flow
//! ```text
//! ShutdownCoordinator
//!     → Server::start(token)          (registration runs synchronously)
//!         → accept loop task          (rpc.rs: tonic, gateway.rs: axum)
//!         → shutdown watcher task     (waits on token, stops, closes signal)
//!     ← CompletionSignal
//! ```
//!
//! # Design Decisions
//! - `start` never blocks on shutdown; it returns once background work is
//!   scheduled
//! - Registration failures abort `start` before anything is served
//! - A handle is consumed by `start` and cannot be restarted

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ServerError;
use crate::lifecycle::CompletionSignal;

pub mod dial;
pub mod gateway;
pub mod rpc;
pub mod streaming;

pub use dial::DialOptions;
pub use gateway::{Endpoint, Gateway, GatewayConfig, ServeMux};
pub use rpc::{RegisterFn, RpcServer, RpcServerConfig};

/// A named, long-running network server.
#[async_trait]
pub trait Server: Send {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Launch the server in the background.
    ///
    /// When `shutdown` is cancelled the server stops gracefully and closes the
    /// returned signal.
    async fn start(
        self: Box<Self>,
        shutdown: CancellationToken,
    ) -> Result<CompletionSignal, ServerError>;
}
