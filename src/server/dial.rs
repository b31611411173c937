//! Transport options the gateway uses to reach its RPC backend.

use std::time::Duration;

use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

/// How gateway endpoints dial the backend.
///
/// Defaults live in [`Default`] only. `insecure` defaults to `true`: the
/// gateway and backend are expected to share a trusted network, and
/// plaintext is the proof-of-concept default. Set it to `false` to dial
/// `https://` with TLS, verifying the backend against the webpki roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialOptions {
    /// Dial with plaintext HTTP/2.
    pub insecure: bool,
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Per-request deadline, if any.
    pub request_timeout: Option<Duration>,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            insecure: true,
            connect_timeout: Duration::from_secs(5),
            request_timeout: None,
        }
    }
}

impl DialOptions {
    /// Build an endpoint for `address`.
    ///
    /// A bare `host:port` gets `http://` or `https://` depending on
    /// `insecure`; an address that already carries a scheme is used as is.
    /// Every `https` endpoint is configured for TLS.
    pub fn endpoint(&self, address: &str) -> Result<Endpoint, tonic::transport::Error> {
        let uri = if address.contains("://") {
            address.to_string()
        } else {
            let scheme = if self.insecure { "http" } else { "https" };
            format!("{scheme}://{address}")
        };

        let mut endpoint = Endpoint::from_shared(uri)?.connect_timeout(self.connect_timeout);
        if let Some(timeout) = self.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        if endpoint.uri().scheme_str() == Some("https") {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
        }
        Ok(endpoint)
    }

    /// A channel that connects on first use. Needs a Tokio runtime.
    pub fn connect_lazy(&self, address: &str) -> Result<Channel, tonic::transport::Error> {
        Ok(self.endpoint(address)?.connect_lazy())
    }
}
