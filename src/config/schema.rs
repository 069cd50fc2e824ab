//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Port the primary listener is expected to own when proxies are started.
pub const CANONICAL_PORT: u16 = 8080;

/// Auxiliary forwarding ports started alongside a canonical primary.
pub const DEFAULT_PROXY_PORTS: [u16; 3] = [8081, 8082, 8083];

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Primary listener configuration (host, port, fallback).
    pub listener: ListenerConfig,

    /// Auxiliary forwarding proxy fleet.
    pub proxy: ProxyConfig,

    /// Timeout configuration for upstream calls.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Primary listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port tried first.
    pub preferred_port: u16,

    /// Walk upward to the next free port when the preferred one is taken.
    pub allow_fallback: bool,

    /// Upper bound on bind attempts when falling back.
    pub max_fallback_attempts: u32,

    /// The proxy fleet only starts when the primary lands on this port.
    pub canonical_port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            preferred_port: CANONICAL_PORT,
            allow_fallback: true,
            max_fallback_attempts: 100,
            canonical_port: CANONICAL_PORT,
        }
    }
}

/// Auxiliary forwarding proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Start the fleet at all.
    pub enabled: bool,

    /// Interface the auxiliary listeners bind.
    pub host: String,

    /// One auxiliary listener per port.
    pub ports: Vec<u16>,

    /// Host used to reach the primary listener.
    pub upstream_host: String,

    /// Outbound `Content-Type` handling.
    pub content_type: ContentTypePolicy,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            ports: DEFAULT_PROXY_PORTS.to_vec(),
            upstream_host: "127.0.0.1".to_string(),
            content_type: ContentTypePolicy::default(),
        }
    }
}

/// How the outbound `Content-Type` header is chosen for forwarded requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentTypePolicy {
    /// Always send `application/json`, whatever the client sent.
    #[default]
    ForceJson,
    /// Pass the client's header through untouched.
    Preserve,
}

/// Timeout configuration for the upstream leg.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the primary to answer a forwarded request, in seconds.
    pub upstream_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            idle_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
