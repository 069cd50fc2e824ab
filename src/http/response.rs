//! Response handling for the forwarding path.
//!
//! # Responsibilities
//! - Map upstream failures to HTTP status codes
//! - Render a JSON diagnostic body for failed forwards
//!
//! # Design Decisions
//! - Connection and protocol errors become 502 Bad Gateway
//! - Upstream timeouts become 504 Gateway Timeout

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::proxy::ForwardError;

impl ForwardError {
    /// Status code relayed to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Unavailable { .. } | ForwardError::InvalidTarget { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.to_string(),
            "upstream": self.target(),
        });
        (self.status(), Json(body)).into_response()
    }
}
