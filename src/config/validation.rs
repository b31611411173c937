//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and timeout ranges
//! - Detect the gateway and RPC server fighting over one address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LifecycleConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::LifecycleConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("rpc and gateway both bind {0}")]
    AddressConflict(String),

    #[error("gateway.backend_address must not be empty")]
    EmptyBackend,
}

/// Check a configuration, collecting every error.
pub fn validate_config(config: &LifecycleConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let rpc = parse_addr("rpc.bind_address", &config.rpc.bind_address, &mut errors);
    let gateway = parse_addr(
        "gateway.bind_address",
        &config.gateway.bind_address,
        &mut errors,
    );

    if let (Some(rpc), Some(gateway)) = (rpc, gateway) {
        if rpc == gateway && rpc.port() != 0 {
            errors.push(ValidationError::AddressConflict(rpc.to_string()));
        }
    }

    if let Some(backend) = &config.gateway.backend_address {
        if backend.trim().is_empty() {
            errors.push(ValidationError::EmptyBackend);
        }
    }

    if config.gateway.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "gateway.shutdown_timeout_secs",
        });
    }
    if config.shutdown.drain_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "shutdown.drain_timeout_secs",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parse_addr(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}
