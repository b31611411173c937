//! gRPC server + HTTP gateway with coordinated graceful shutdown.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!   HTTP client ─────▶│  Gateway (axum)  ──dial──▶  RpcServer (tonic) │◀──── gRPC client
//!                     │        │                          │          │
//!                     │   CompletionSignal          CompletionSignal │
//!                     │        └──────────┬───────────────┘          │
//!                     │                   ▼                          │
//!   SIGHUP/INT/QUIT ─▶│          ShutdownCoordinator                 │
//!                     │   1st signal: cancel token, drain (5s)       │
//!                     │   2nd signal: stop waiting                   │
//!                     └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use axum::{http::StatusCode, routing::get, Json};
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tonic::service::RoutesBuilder;

use grpc_lifecycle::config::{load_config, LifecycleConfig};
use grpc_lifecycle::lifecycle::{ShutdownCoordinator, ShutdownTriggers};
use grpc_lifecycle::observability::logging;
use grpc_lifecycle::server::{
    DialOptions, Endpoint, Gateway, GatewayConfig, RpcServer, RpcServerConfig, ServeMux,
};
use grpc_lifecycle::BoxError;

#[derive(Parser)]
#[command(name = "grpc-lifecycle")]
#[command(about = "Run a gRPC server and its HTTP gateway until signalled", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => LifecycleConfig::default(),
    };

    logging::init(
        cli.log_filter
            .as_deref()
            .unwrap_or(&config.observability.log_filter),
    )?;

    tracing::info!("grpc-lifecycle v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        rpc_address = %config.rpc.bind_address,
        gateway_address = %config.gateway.bind_address,
        backend_address = %config.backend_address(),
        drain_timeout_secs = config.shutdown.drain_timeout_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.rpc.bind_address).await?;
    let rpc = RpcServer::new(
        "grpc",
        RpcServerConfig {
            listener: Some(listener),
            register: Some(Box::new(register_services)),
        },
    )?;

    let gateway = Gateway::new(
        "gateway",
        GatewayConfig {
            backend_address: config.backend_address().to_string(),
            bind_address: config.gateway.bind_address.clone(),
            endpoints: vec![Endpoint::new("backend-status", backend_status)],
            streaming: config.gateway.streaming,
        },
    )?
    .with_shutdown_timeout(config.gateway.shutdown_timeout())
    .with_dial_options(DialOptions {
        insecure: config.gateway.insecure,
        ..DialOptions::default()
    });

    let triggers = ShutdownTriggers::os()?;
    let mut coordinator = ShutdownCoordinator::new(config.shutdown.drain_timeout());
    coordinator.start(rpc).await?;
    coordinator.start(gateway).await?;

    coordinator.run(triggers).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// The standalone binary ships no generated services; embedding
/// applications register theirs through [`RpcServerConfig::register`].
fn register_services(_routes: &mut RoutesBuilder) -> Result<(), BoxError> {
    tracing::info!("no gRPC services compiled into this binary");
    Ok(())
}

/// `GET /v1/backend/status`: whether the gateway can reach its backend.
fn backend_status(
    _shutdown: &CancellationToken,
    mux: &mut ServeMux,
    backend: &str,
    dial: &DialOptions,
) -> Result<(), BoxError> {
    let endpoint = dial.endpoint(backend)?;
    let backend = backend.to_string();

    mux.route(
        "/v1/backend/status",
        get(move || {
            let endpoint = endpoint.clone();
            let backend = backend.clone();
            async move {
                match endpoint.connect().await {
                    Ok(_) => (
                        StatusCode::OK,
                        Json(json!({ "backend": backend, "reachable": true })),
                    ),
                    Err(e) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(json!({
                            "backend": backend,
                            "reachable": false,
                            "error": e.to_string(),
                        })),
                    ),
                }
            }
        }),
    );
    Ok(())
}
