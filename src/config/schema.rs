//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML and fall back
//! to defaults for every omitted field.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the RPC server, its gateway and their shutdown.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// gRPC listener settings.
    pub rpc: RpcSettings,

    /// HTTP gateway settings.
    pub gateway: GatewaySettings,

    /// Coordinator settings.
    pub shutdown: ShutdownSettings,

    /// Logging settings.
    pub observability: ObservabilitySettings,
}

/// gRPC listener settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RpcSettings {
    /// Bind address (e.g., "127.0.0.1:9090").
    pub bind_address: String,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GatewaySettings {
    /// Bind address for the HTTP listener.
    pub bind_address: String,

    /// gRPC backend to dial. Defaults to the RPC bind address.
    pub backend_address: Option<String>,

    /// Bound on the gateway's graceful stop, in seconds.
    pub shutdown_timeout_secs: u64,

    /// Bridge WebSocket upgrades onto HTTP handlers.
    pub streaming: bool,

    /// Dial the backend without TLS.
    pub insecure: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            backend_address: None,
            shutdown_timeout_secs: 3,
            streaming: false,
            insecure: true,
        }
    }
}

impl GatewaySettings {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Coordinator settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownSettings {
    /// Time allowed for every server to stop, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 5,
        }
    }
}

impl ShutdownSettings {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_filter: "grpc_lifecycle=info,tower_http=info".to_string(),
        }
    }
}

impl LifecycleConfig {
    /// Backend the gateway dials: explicit setting, else the RPC address.
    pub fn backend_address(&self) -> &str {
        self.gateway
            .backend_address
            .as_deref()
            .unwrap_or(&self.rpc.bind_address)
    }
}
