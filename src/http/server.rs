//! HTTP server setup.
//!
//! # Responsibilities
//! - Serve an Axum Router on an already bound listener
//! - Expose peer addresses to handlers via `ConnectInfo`
//! - Stop accepting and drain on the shutdown signal

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// HTTP server wrapping one router.
///
/// Used for the primary application and for every auxiliary listener.
pub struct HttpServer {
    router: Router,
    name: &'static str,
}

impl HttpServer {
    /// Create a new HTTP server for the given router.
    pub fn new(name: &'static str, router: Router) -> Self {
        Self { router, name }
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown channel fires or closes.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let name = self.name;
        tracing::info!(server = name, address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!(server = name, "Shutdown signal received");
            })
            .await?;

        tracing::info!(server = name, address = %addr, "HTTP server stopped");
        Ok(())
    }
}

/// Minimal application used when the binary runs standalone.
pub fn default_application() -> Router {
    Router::new().route("/health", get(|| async { "ok" }))
}
