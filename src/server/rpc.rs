//! gRPC server handle.
//!
//! # Responsibilities
//! - Validate that a listener and a registration callback were supplied
//! - Run the registration callback once, before anything is served
//! - Serve on the listener until the shutdown token is cancelled
//! - Close the completion signal once the graceful stop has drained
//!
//! # Design Decisions
//! - No timeout at this layer: the graceful stop waits for in-flight calls,
//!   the coordinator's drain deadline bounds the wait from above
//! - Accept loop errors are logged, never returned

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::service::RoutesBuilder;
use tracing::{Instrument, Span};

use crate::error::{BoxError, ServerError};
use crate::lifecycle::completion::{self, Completer, CompletionSignal};
use crate::server::Server;

/// Attaches services to the server. Called exactly once during `start`.
pub type RegisterFn = Box<dyn FnOnce(&mut RoutesBuilder) -> Result<(), BoxError> + Send>;

/// Configuration for [`RpcServer`]. Both fields are required.
#[derive(Default)]
pub struct RpcServerConfig {
    /// Where the server accepts connections.
    pub listener: Option<TcpListener>,
    /// Registers services on the server.
    pub register: Option<RegisterFn>,
}

impl RpcServerConfig {
    /// Report every missing field at once.
    pub fn validate(&self) -> Result<(), ServerError> {
        let errors = self.missing_fields();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServerError::InvalidConfig(errors))
        }
    }

    fn missing_fields(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.listener.is_none() {
            errors.push("listener is required".to_string());
        }
        if self.register.is_none() {
            errors.push("register function is required".to_string());
        }
        errors
    }
}

/// A gRPC server bound to a listener.
pub struct RpcServer {
    name: String,
    listener: TcpListener,
    register: RegisterFn,
    span: Span,
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("name", &self.name)
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

impl RpcServer {
    /// Create a server. Fails if the configuration is incomplete.
    pub fn new(name: impl Into<String>, config: RpcServerConfig) -> Result<Self, ServerError> {
        let errors = config.missing_fields();
        let (listener, register) = match (config.listener, config.register) {
            (Some(listener), Some(register)) => (listener, register),
            _ => return Err(ServerError::InvalidConfig(errors)),
        };

        let name = name.into();
        let span = tracing::info_span!("server", name = %name);
        Ok(Self {
            name,
            listener,
            register,
            span,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Register services and start serving in the background.
    ///
    /// A registration failure is returned before any task is spawned; the
    /// listener is dropped with the handle.
    pub fn start(self, shutdown: CancellationToken) -> Result<CompletionSignal, ServerError> {
        let Self {
            name: _,
            listener,
            register,
            span,
        } = self;

        let mut routes = RoutesBuilder::default();
        register(&mut routes).map_err(ServerError::Register)?;

        let _entered = span.enter();
        match listener.local_addr() {
            Ok(addr) => tracing::info!(addr = %addr, "starting RPC server"),
            Err(e) => tracing::warn!(error = %e, "starting RPC server on unknown address"),
        }

        let (completer, signal) = completion::pair();
        let incoming = TcpListenerStream::new(listener);
        let stop = shutdown.clone();

        let serving = tokio::spawn(
            async move {
                let served = tonic::transport::Server::builder()
                    .add_routes(routes.routes())
                    .serve_with_incoming_shutdown(incoming, stop.cancelled_owned())
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "RPC server did not stop cleanly");
                }
                tracing::info!("RPC server has stopped");
            }
            .instrument(Span::current()),
        );

        tokio::spawn(await_stop(shutdown, serving, completer).instrument(Span::current()));

        Ok(signal)
    }
}

/// Close the signal once shutdown is requested and the serving task is over,
/// however that task ended.
async fn await_stop(shutdown: CancellationToken, serving: JoinHandle<()>, completer: Completer) {
    shutdown.cancelled().await;
    tracing::info!("stopping RPC server gracefully");
    if let Err(e) = serving.await {
        tracing::error!(error = %e, "RPC server task failed");
    }
    completer.complete();
}

#[async_trait]
impl Server for RpcServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(
        self: Box<Self>,
        shutdown: CancellationToken,
    ) -> Result<CompletionSignal, ServerError> {
        RpcServer::start(*self, shutdown)
    }
}
