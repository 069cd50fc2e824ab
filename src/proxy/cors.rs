//! Permissive CORS for auxiliary listeners.
//!
//! Every response reflects the caller's `Origin` and allows credentials.
//! `OPTIONS` requests never reach the primary: they are answered here.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Methods advertised on preflight.
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// Request headers advertised on preflight.
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Response headers browsers may read.
pub const EXPOSED_HEADERS: &str = "Authorization, Content-Type";

pub async fn cors_middleware(request: Request<Body>, next: Next) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();

    if request.method() == Method::OPTIONS {
        tracing::debug!(
            path = %request.uri().path(),
            origin = ?origin,
            "Answering preflight locally"
        );
        return preflight_response(origin.as_ref());
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut(), origin.as_ref());
    response
}

/// Build the 200 answer to an `OPTIONS` request.
pub fn preflight_response(origin: Option<&HeaderValue>) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    apply_cors_headers(headers, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

/// Reflect `origin` and mark the response as credentialed.
///
/// Without an `Origin` on the request no allow-origin header is emitted.
pub fn apply_cors_headers(headers: &mut HeaderMap, origin: Option<&HeaderValue>) {
    if let Some(origin) = origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
}
