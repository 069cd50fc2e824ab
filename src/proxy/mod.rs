//! Forwarding proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Client → auxiliary listener (8081..8083)
//!     → cors.rs (OPTIONS answered here, CORS headers on everything else)
//!     → handler.rs (capture ForwardRequest)
//!     → forward.rs (rewrite, stream body to the primary)
//!     → status + body relayed back
//! ```
//!
//! # Design Decisions
//! - Each listener is independent; one failing to bind never affects another
//! - The only shared state is the read-only forwarder and its pooled client
//! - Upstream failures surface as 502/504 with a JSON diagnostic

pub mod cors;
pub mod fleet;
pub mod forward;
pub mod handler;
pub mod instance;

pub use fleet::ProxyFleet;
pub use forward::{
    build_client, ForwardError, ForwardRequest, ForwardResponse, Forwarder, UpstreamClient,
};
pub use handler::{router, ListenerState};
pub use instance::{InstanceState, ProxyError, ProxyInstance};
