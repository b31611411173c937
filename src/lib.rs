//! Lifecycle coordination for a gRPC server and the HTTP gateway in front of it.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod server;

pub use config::LifecycleConfig;
pub use error::{BoxError, ServerError};
pub use lifecycle::{CompletionSignal, ShutdownCoordinator, ShutdownTriggers};
pub use server::{Gateway, RpcServer, Server};
