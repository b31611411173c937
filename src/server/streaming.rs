//! WebSocket bridge for gateway handlers.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests
//! - Complete the upgrade handshake with the client
//! - Replay each inbound frame as one request against the base handler
//! - Send each response body back as a frame
//!
//! # Data Flow
//! ```text
//! Client ←── frames ──→ bridge ──→ Request(path, ?method=, frame body) ──→ Router
//!                          ↑                                                │
//!                          └──────────────── response body ─────────────────┘
//! ```
//!
//! # Design Decisions
//! - Plain HTTP requests pass straight through
//! - Frames are handled one at a time, in order
//! - Close frames and socket errors end the bridge
//! - Ping/pong handled transparently by axum

use axum::body::{Body, Bytes};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::ServiceExt;

/// Largest response body relayed as a single frame.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Wrap `handler` so WebSocket upgrades are bridged onto it.
pub fn bridge(handler: Router) -> Router {
    let inner = handler.clone();
    handler.layer(middleware::from_fn_with_state(inner, upgrade_or_pass))
}

async fn upgrade_or_pass(State(inner): State<Router>, request: Request, next: Next) -> Response {
    if !is_websocket_upgrade(request.headers()) {
        return next.run(request).await;
    }

    let (mut parts, _body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let target = FrameTarget::new(&parts.uri, &parts.headers);
    tracing::debug!(path = %target.uri.path(), method = %target.method, "bridging websocket");
    upgrade.on_upgrade(move |socket| relay(socket, inner, target))
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// The request every frame on one socket is replayed as.
#[derive(Debug, Clone)]
struct FrameTarget {
    method: Method,
    uri: Uri,
    content_type: Option<HeaderValue>,
    authorization: Option<HeaderValue>,
}

impl FrameTarget {
    fn new(uri: &Uri, headers: &HeaderMap) -> Self {
        Self {
            method: method_from_query(uri.query()).unwrap_or(Method::POST),
            uri: uri.clone(),
            content_type: headers.get(header::CONTENT_TYPE).cloned(),
            authorization: headers.get(header::AUTHORIZATION).cloned(),
        }
    }

    fn request(&self, payload: Bytes) -> Result<Request, axum::http::Error> {
        let mut builder = axum::http::Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone());
        if let Some(value) = &self.content_type {
            builder = builder.header(header::CONTENT_TYPE, value.clone());
        }
        if let Some(value) = &self.authorization {
            builder = builder.header(header::AUTHORIZATION, value.clone());
        }
        builder.body(Body::from(payload))
    }
}

fn method_from_query(query: Option<&str>) -> Option<Method> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "method")
        .and_then(|(_, value)| Method::from_bytes(value.to_ascii_uppercase().as_bytes()).ok())
}

async fn relay(mut socket: WebSocket, inner: Router, target: FrameTarget) {
    while let Some(frame) = socket.recv().await {
        let payload = match frame {
            Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_str().as_bytes()),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "websocket receive failed");
                break;
            }
        };

        let request = match target.request(payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "could not build bridged request");
                break;
            }
        };

        let response = match inner.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let status = response.status();
        let body = match axum::body::to_bytes(response.into_body(), MAX_FRAME_BYTES).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, %status, "bridged response body unreadable");
                break;
            }
        };

        let reply = match String::from_utf8(body.to_vec()) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(body),
        };
        if socket.send(reply).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_defaults_and_overrides() {
        assert_eq!(method_from_query(None), None);
        assert_eq!(method_from_query(Some("a=1")), None);
        assert_eq!(method_from_query(Some("method=get")), Some(Method::GET));
        assert_eq!(
            method_from_query(Some("x=1&method=PUT")),
            Some(Method::PUT)
        );
    }

    #[test]
    fn detects_upgrade_header() {
        let mut headers = HeaderMap::new();
        assert!(!is_websocket_upgrade(&headers));
        headers.insert(header::UPGRADE, HeaderValue::from_static("WebSocket"));
        assert!(is_websocket_upgrade(&headers));
    }

    #[test]
    fn frame_request_keeps_path_and_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        let uri: Uri = "/v1/echo?method=put".parse().unwrap();

        let target = FrameTarget::new(&uri, &headers);
        let request = target.request(Bytes::from_static(b"{}")).unwrap();

        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.uri().path(), "/v1/echo");
        assert_eq!(
            request.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(request.headers().get(header::UPGRADE).is_none());
    }

    #[tokio::test]
    async fn plain_requests_pass_through() {
        use axum::routing::get;

        let app = bridge(Router::new().route("/ping", get(|| async { "pong" })));
        let response = app
            .oneshot(axum::http::Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"pong");
    }
}
