//! Axum wiring for an auxiliary listener.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::observability::metrics;
use crate::proxy::{cors::cors_middleware, ForwardRequest, Forwarder};

/// State injected into the forwarding handler of one listener.
#[derive(Clone)]
pub struct ListenerState {
    pub listen_port: u16,
    pub forwarder: Arc<Forwarder>,
}

/// Build the router served by an auxiliary listener.
pub fn router(state: ListenerState) -> Router {
    Router::new()
        .route("/{*path}", any(forward_handler))
        .route("/", any(forward_handler))
        .with_state(state)
        .layer(middleware::from_fn(cors_middleware))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
}

/// Forward everything that is not a preflight to the primary.
async fn forward_handler(
    State(state): State<ListenerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request).to_string();
    let method = request.method().clone();

    let captured = ForwardRequest::from_request(request, Some(peer));
    tracing::debug!(
        request_id = %request_id,
        listener = state.listen_port,
        method = %method,
        path = %captured.path_and_query(),
        streamed_body = captured.has_body(),
        "Forwarding request"
    );

    let response = match state.forwarder.forward(captured).await {
        Ok(upstream) => upstream.into_response(),
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                listener = state.listen_port,
                error = %e,
                "Upstream request failed"
            );
            e.into_response()
        }
    };

    metrics::record_forward(state.listen_port, method.as_str(), response.status().as_u16(), start_time);
    response
}
