//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → CLI overrides applied in main
//!     → handed to the startup orchestrator
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ContentTypePolicy, ListenerConfig, ObservabilityConfig, ProxyConfig, ServerConfig,
    TimeoutConfig, CANONICAL_PORT, DEFAULT_PROXY_PORTS,
};
pub use validation::{validate_config, ValidationError};
