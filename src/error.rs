//! Error types shared by the server handles.

use thiserror::Error;

/// Boxed error returned by registration callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced synchronously while constructing or starting a server.
///
/// Runtime failures (accept loop errors, stop timeouts) never show up here;
/// nobody is left to observe them, so they are logged instead.
#[derive(Debug, Error)]
pub enum ServerError {
    /// One or more required fields were missing. Every problem is listed.
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// The RPC registration callback failed.
    #[error("register services: {0}")]
    Register(#[source] BoxError),

    /// A gateway endpoint registration callback failed.
    #[error("register endpoint '{endpoint}': {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    /// The gateway could not bind its HTTP listener.
    #[error("bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}
