//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Initialize store → Bind primary → Serve
//!         → (primary on canonical port) start proxy fleet
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → primary and proxies drain → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: each step gates the next
//! - Store init and primary bind failures are fatal
//! - Proxy failures are logged and isolated per listener

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{AppContext, InitError, NoopInitializer, RunningServer, StartupError, StoreInitializer};
