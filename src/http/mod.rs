//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Bound TcpListener
//!     → server.rs (axum::serve, graceful shutdown)
//!     → request.rs (request ID assignment)
//!     → [application router or forwarding proxy]
//!     → response.rs (upstream failures → 502/504)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{default_application, HttpServer};
