//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::{stream, StreamExt};
use portfront::config::ServerConfig;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Fixed body served for `GET /recipes`.
pub const RECIPES_JSON: &str = r#"[{"id":1,"name":"carrot soup"},{"id":2,"name":"stew"}]"#;

/// A request as seen by the primary application.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: Bytes,
}

/// Collects every request that reaches the primary.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    pub fn all(&self) -> Vec<Recorded> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last(&self) -> Recorded {
        self.0.lock().unwrap().last().cloned().expect("no request recorded")
    }
}

/// Stand-in for the application handler.
///
/// - `GET /slow` answers after 3 seconds
/// - `GET /stall` sends the head and a partial body, then never finishes
/// - `GET /missing` answers 404
/// - `POST` echoes the body with 201
/// - anything else answers 200 with [`RECIPES_JSON`]
pub fn recording_app(recorder: Recorder) -> Router {
    Router::new().fallback(record).with_state(recorder)
}

async fn record(State(recorder): State<Recorder>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let header_str = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    recorder.0.lock().unwrap().push(Recorded {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        content_type: header_str(header::CONTENT_TYPE),
        authorization: header_str(header::AUTHORIZATION),
        body: body.clone(),
    });

    match (parts.method.as_str(), parts.uri.path()) {
        ("GET", "/slow") => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            (StatusCode::OK, "late").into_response()
        }
        ("GET", "/stall") => {
            let partial = stream::iter([Ok::<_, io::Error>(Bytes::from_static(b"[partial"))]);
            let body = Body::from_stream(partial.chain(stream::pending()));
            (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        ("GET", "/missing") => (StatusCode::NOT_FOUND, "no such recipe").into_response(),
        ("POST", _) => (StatusCode::CREATED, Body::from(body)).into_response(),
        _ => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            RECIPES_JSON,
        )
            .into_response(),
    }
}

/// Ports that were free a moment ago, distinct from each other.
pub async fn free_ports(n: usize) -> Vec<u16> {
    let mut held = Vec::with_capacity(n);
    for _ in 0..n {
        held.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
    }
    held.iter().map(|l| l.local_addr().unwrap().port()).collect()
}

/// Loopback-only config whose canonical port is `primary` and proxies `proxies`.
pub fn local_config(primary: u16, proxies: &[u16]) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.preferred_port = primary;
    config.listener.canonical_port = primary;
    config.proxy.host = "127.0.0.1".into();
    config.proxy.ports = proxies.to_vec();
    config.proxy.upstream_host = "127.0.0.1".into();
    config
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
