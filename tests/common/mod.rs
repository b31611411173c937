//! Shared helpers for the integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::{any, get};
use grpc_lifecycle::server::{Endpoint, Gateway, GatewayConfig, RpcServer, RpcServerConfig};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// `GET /v1/ping` → `pong`.
pub fn ping_endpoint() -> Endpoint {
    Endpoint::new("ping", |_token, mux, _backend, _options| {
        mux.route("/v1/ping", get(|| async { "pong" }));
        Ok(())
    })
}

/// `/v1/echo` (any method) → `echo: <body>`.
#[allow(dead_code)]
pub fn echo_endpoint() -> Endpoint {
    Endpoint::new("echo", |_token, mux, _backend, _options| {
        mux.route(
            "/v1/echo",
            any(|body: String| async move { format!("echo: {body}") }),
        );
        Ok(())
    })
}

/// `GET /slow` sleeps far longer than any test waits.
#[allow(dead_code)]
pub fn slow_endpoint() -> Endpoint {
    Endpoint::new("slow", |_token, mux, _backend, _options| {
        mux.route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "finally"
            }),
        );
        Ok(())
    })
}

/// A gateway on `bind` whose backend is never dialed by these endpoints.
pub fn gateway(bind: SocketAddr, endpoints: Vec<Endpoint>, streaming: bool) -> Gateway {
    Gateway::new(
        "gateway",
        GatewayConfig {
            backend_address: "127.0.0.1:9".into(),
            bind_address: bind.to_string(),
            endpoints,
            streaming,
        },
    )
    .unwrap()
}

/// An RPC server on an ephemeral port with no services.
#[allow(dead_code)]
pub async fn rpc_server() -> (RpcServer, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = RpcServer::new(
        "grpc",
        RpcServerConfig {
            listener: Some(listener),
            register: Some(Box::new(|_routes| Ok(()))),
        },
    )
    .unwrap();
    (server, addr)
}

/// Open a connection and leave a request in flight. Keep the stream alive.
#[allow(dead_code)]
pub async fn send_raw_get(addr: SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

pub async fn is_listening(addr: SocketAddr) -> bool {
    TcpStream::connect(addr).await.is_ok()
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Formatted log output captured on the current thread.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl LogCapture {
    /// Route this thread's events here until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
