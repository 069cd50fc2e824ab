//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and port layout.
//! Returns every error found, not just the first.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use crate::config::schema::ServerConfig;

/// A single semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid host '{0}'")]
    InvalidHost(String),
    #[error("max_fallback_attempts must be at least 1")]
    NoFallbackAttempts,
    #[error("proxy fleet is enabled but no ports are configured")]
    NoProxyPorts,
    #[error("proxy port {0} collides with the canonical port")]
    ProxyPortIsCanonical(u16),
    #[error("proxy port {0} is listed more than once")]
    DuplicateProxyPort(u16),
    #[error("timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("proxy upstream {upstream} cannot reach a primary bound to {listener}")]
    UnreachableUpstream { listener: String, upstream: String },
    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for host in [&config.listener.host, &config.proxy.host] {
        if host.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidHost(host.clone()));
        }
    }

    if config.listener.max_fallback_attempts == 0 {
        errors.push(ValidationError::NoFallbackAttempts);
    }

    if config.proxy.enabled {
        if config.proxy.ports.is_empty() {
            errors.push(ValidationError::NoProxyPorts);
        }
        let mut seen = HashSet::new();
        for &port in &config.proxy.ports {
            if port == config.listener.canonical_port {
                errors.push(ValidationError::ProxyPortIsCanonical(port));
            }
            if !seen.insert(port) {
                errors.push(ValidationError::DuplicateProxyPort(port));
            }
        }

        // A primary bound to one specific address only answers on that address.
        let listener = config.listener.host.parse::<IpAddr>();
        let upstream = config.proxy.upstream_host.parse::<IpAddr>();
        if let (Ok(listener), Ok(upstream)) = (listener, upstream) {
            if !listener.is_unspecified() && listener != upstream {
                errors.push(ValidationError::UnreachableUpstream {
                    listener: config.listener.host.clone(),
                    upstream: config.proxy.upstream_host.clone(),
                });
            }
        }
    }

    let timeouts = [
        ("connect_secs", config.timeouts.connect_secs),
        ("upstream_secs", config.timeouts.upstream_secs),
        ("idle_secs", config.timeouts.idle_secs),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
