//! HTTP gateway in front of the gRPC server.
//!
//! # Responsibilities
//! - Build the outward-facing router from endpoint registration callbacks
//! - Optionally bridge WebSocket upgrades onto that router
//! - Apply permissive CORS and request tracing
//! - Serve until shutdown, then stop within a bounded window
//!
//! # Data Flow
//! ```text
//! Endpoint callbacks → ServeMux → [streaming bridge] → CORS → trace → axum::serve
//! ```
//!
//! # Design Decisions
//! - Endpoint callbacks run in configured order; the first failure aborts
//!   `start` before the HTTP listener is bound
//! - The stop bound is measured on its own clock, not on the shutdown token
//!   that triggered it
//! - A stop that overruns is logged and the server task aborted; the
//!   completion signal closes either way

use std::time::Duration;

use async_trait::async_trait;
use axum::routing::MethodRouter;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, Span};

use crate::error::{BoxError, ServerError};
use crate::lifecycle::completion::{self, Completer, CompletionSignal};
use crate::server::dial::DialOptions;
use crate::server::streaming;
use crate::server::Server;

/// Default bound on the gateway's graceful stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

type EndpointFn = dyn Fn(&CancellationToken, &mut ServeMux, &str, &DialOptions) -> Result<(), BoxError>
    + Send
    + Sync;

/// A named endpoint registration callback.
///
/// The callback receives the shutdown token, the shared mux, the backend
/// address and the dial options, in that order.
pub struct Endpoint {
    name: String,
    register: Box<EndpointFn>,
}

impl Endpoint {
    pub fn new<F>(name: impl Into<String>, register: F) -> Self
    where
        F: Fn(&CancellationToken, &mut ServeMux, &str, &DialOptions) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            register: Box::new(register),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint").field("name", &self.name).finish()
    }
}

/// The router shared by every endpoint callback.
#[derive(Default)]
pub struct ServeMux {
    router: Router,
}

impl ServeMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. Panics on conflicting paths, like [`Router::route`].
    pub fn route(&mut self, path: &str, method_router: MethodRouter) -> &mut Self {
        self.router = std::mem::take(&mut self.router).route(path, method_router);
        self
    }

    /// Merge a prebuilt router.
    pub fn merge(&mut self, router: Router) -> &mut Self {
        self.router = std::mem::take(&mut self.router).merge(router);
        self
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Gateway configuration.
#[derive(Debug, Default)]
pub struct GatewayConfig {
    /// Address of the gRPC backend.
    pub backend_address: String,
    /// Address the HTTP listener binds to.
    pub bind_address: String,
    /// Endpoint registration callbacks, run in order.
    pub endpoints: Vec<Endpoint>,
    /// Bridge WebSocket upgrades onto the HTTP handlers.
    pub streaming: bool,
}

impl GatewayConfig {
    /// Report every missing field at once.
    pub fn validate(&self) -> Result<(), ServerError> {
        let mut errors = Vec::new();

        if self.backend_address.trim().is_empty() {
            errors.push("backend address is required".to_string());
        }
        if self.bind_address.trim().is_empty() {
            errors.push("bind address is required".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServerError::InvalidConfig(errors))
        }
    }
}

/// HTTP gateway fronting a gRPC backend.
#[derive(Debug)]
pub struct Gateway {
    name: String,
    config: GatewayConfig,
    dial_options: DialOptions,
    shutdown_timeout: Duration,
    span: Span,
}

impl Gateway {
    /// Create a gateway. Fails if the configuration is incomplete.
    pub fn new(name: impl Into<String>, config: GatewayConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let name = name.into();
        let span = tracing::info_span!("server", name = %name);
        Ok(Self {
            name,
            config,
            dial_options: DialOptions::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            span,
        })
    }

    /// Override the dial options handed to endpoint callbacks.
    pub fn with_dial_options(mut self, dial_options: DialOptions) -> Self {
        self.dial_options = dial_options;
        self
    }

    /// Override the graceful stop bound.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Register endpoints, bind, and serve in the background.
    pub async fn start(self, shutdown: CancellationToken) -> Result<CompletionSignal, ServerError> {
        let span = self.span.clone();
        self.launch(shutdown).instrument(span).await
    }

    async fn launch(self, shutdown: CancellationToken) -> Result<CompletionSignal, ServerError> {
        let handler = self.build_handler(&shutdown)?;

        let address = self.config.bind_address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;

        match listener.local_addr() {
            Ok(addr) => tracing::info!(
                addr = %addr,
                backend = %self.config.backend_address,
                "gateway starting"
            ),
            Err(e) => tracing::warn!(error = %e, "gateway starting on unknown address"),
        }

        let (completer, signal) = completion::pair();
        let stop = shutdown.clone();

        let serving = tokio::spawn(
            async move {
                let served = axum::serve(listener, handler)
                    .with_graceful_shutdown(stop.cancelled_owned())
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "gateway did not stop cleanly");
                }
                tracing::info!("gateway has stopped");
            }
            .instrument(Span::current()),
        );

        tokio::spawn(
            bounded_stop(shutdown, serving, self.shutdown_timeout, completer)
                .instrument(Span::current()),
        );

        Ok(signal)
    }

    fn build_handler(&self, shutdown: &CancellationToken) -> Result<Router, ServerError> {
        let mut mux = ServeMux::new();

        for endpoint in &self.config.endpoints {
            (endpoint.register)(
                shutdown,
                &mut mux,
                &self.config.backend_address,
                &self.dial_options,
            )
            .map_err(|source| ServerError::Endpoint {
                endpoint: endpoint.name.clone(),
                source,
            })?;
            tracing::debug!(endpoint = %endpoint.name, "endpoint registered");
        }

        let mut handler = mux.into_router();
        if self.config.streaming {
            handler = streaming::bridge(handler);
        }

        Ok(handler
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http()))
    }
}

/// Once shutdown is requested, give the serving task `timeout` to finish,
/// abort it past that, and close the signal either way.
async fn bounded_stop(
    shutdown: CancellationToken,
    mut serving: JoinHandle<()>,
    timeout: Duration,
    completer: Completer,
) {
    shutdown.cancelled().await;
    tracing::info!("stopping gracefully");

    match tokio::time::timeout(timeout, &mut serving).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "gateway task failed"),
        Err(_) => {
            tracing::error!(timeout = ?timeout, "graceful stop timed out");
            serving.abort();
        }
    }
    completer.complete();
}

#[async_trait]
impl Server for Gateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(
        self: Box<Self>,
        shutdown: CancellationToken,
    ) -> Result<CompletionSignal, ServerError> {
        Gateway::start(*self, shutdown).await
    }
}
