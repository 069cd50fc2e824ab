//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Preferred port
//!     → binder.rs (bind, classify error, retry upward)
//!     → BoundListener { TcpListener, ListenerBinding }
//!     → Hand off to axum::serve
//! ```
//!
//! # Design Decisions
//! - Contention detected by `io::ErrorKind::AddrInUse`, never message text
//! - Fallback is bounded by attempt count and the top of the port range

pub mod binder;

pub use binder::{BindError, BoundListener, ListenerBinding, PortBinder};
