//! Startup sequencer and multi-listener forwarding front for an application server.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;

pub use config::ServerConfig;
pub use lifecycle::{AppContext, RunningServer, StartupError, StoreInitializer};
pub use net::{BindError, ListenerBinding, PortBinder};
pub use proxy::{ProxyFleet, ProxyInstance};
