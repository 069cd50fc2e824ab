//! Starting the set of auxiliary listeners.
//!
//! Each port is attempted independently: a failure is logged, the instance is
//! marked Failed, and the next port is still tried.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ProxyConfig, TimeoutConfig};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::{build_client, Forwarder, ProxyInstance};

/// The auxiliary listeners started for one primary.
#[derive(Debug, Clone, Default)]
pub struct ProxyFleet {
    instances: Vec<ProxyInstance>,
}

impl ProxyFleet {
    /// Bind every configured port, forwarding to the primary on `primary_port`.
    ///
    /// Never fails as a whole; inspect the instances for per-port outcomes.
    pub async fn start(
        config: &ProxyConfig,
        timeouts: &TimeoutConfig,
        host: IpAddr,
        primary_port: u16,
        shutdown: &Shutdown,
    ) -> Self {
        let forwarder = Forwarder::new(
            build_client(timeouts),
            &config.upstream_host,
            primary_port,
            Duration::from_secs(timeouts.upstream_secs),
            config.content_type,
        );
        let target = match &forwarder {
            Ok(f) => f.target_base_url(),
            Err(e) => e.target().to_string(),
        };

        let mut instances: Vec<ProxyInstance> = config
            .ports
            .iter()
            .map(|&port| ProxyInstance::new(port, target.clone()))
            .collect();

        let forwarder = match forwarder {
            Ok(f) => Arc::new(f),
            Err(e) => {
                tracing::error!(error = %e, "Cannot build forwarder, no proxies started");
                for instance in &mut instances {
                    instance.fail();
                    metrics::record_listener_failure(instance.listen_port());
                }
                return Self { instances };
            }
        };

        for instance in &mut instances {
            let port = instance.listen_port();
            if let Err(e) = instance
                .start(host, forwarder.clone(), shutdown.subscribe())
                .await
            {
                tracing::warn!(port, error = %e, "Couldn't start forwarding proxy");
                metrics::record_listener_failure(port);
            }
        }

        let fleet = Self { instances };
        tracing::info!(
            running = fleet.running().count(),
            configured = fleet.instances.len(),
            target = %target,
            "Proxy fleet started"
        );
        fleet
    }

    pub fn instances(&self) -> &[ProxyInstance] {
        &self.instances
    }

    /// Instances that bound successfully.
    pub fn running(&self) -> impl Iterator<Item = &ProxyInstance> {
        self.instances.iter().filter(|i| i.is_running())
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
