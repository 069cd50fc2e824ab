//! Auxiliary listener lifecycle.
//!
//! ```text
//! Starting ──bind ok──▶ Running
//!     │
//!     └──bind error──▶ Failed (terminal)
//! ```

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::http::HttpServer;
use crate::net::{BindError, PortBinder};
use crate::proxy::{router, Forwarder, ListenerState};

/// Lifecycle state of one auxiliary listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Starting,
    Running,
    Failed,
}

/// Error starting an auxiliary listener.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("proxy on port {port} already left the starting state ({state:?})")]
    NotStarting { port: u16, state: InstanceState },
}

/// One auxiliary listener forwarding to the primary.
#[derive(Debug, Clone)]
pub struct ProxyInstance {
    listen_port: u16,
    target_base_url: String,
    state: InstanceState,
    local_addr: Option<SocketAddr>,
}

impl ProxyInstance {
    pub fn new(listen_port: u16, target_base_url: impl Into<String>) -> Self {
        Self {
            listen_port,
            target_base_url: target_base_url.into(),
            state: InstanceState::Starting,
            local_addr: None,
        }
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    pub fn target_base_url(&self) -> &str {
        &self.target_base_url
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Address actually bound, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }

    /// Mark a starting instance as failed without trying to bind.
    pub fn fail(&mut self) {
        if self.state == InstanceState::Starting {
            self.state = InstanceState::Failed;
        }
    }

    /// Bind the listen port (no fallback) and spawn the forwarding server.
    pub async fn start(
        &mut self,
        host: IpAddr,
        forwarder: Arc<Forwarder>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ProxyError> {
        if self.state != InstanceState::Starting {
            return Err(ProxyError::NotStarting {
                port: self.listen_port,
                state: self.state,
            });
        }

        let bound = match PortBinder::exact(host).bind(self.listen_port).await {
            Ok(bound) => bound,
            Err(e) => {
                self.state = InstanceState::Failed;
                return Err(e.into());
            }
        };
        let local_addr = bound.local_addr().ok();

        let state = ListenerState {
            listen_port: self.listen_port,
            forwarder,
        };
        let server = HttpServer::new("proxy", router(state));
        let port = self.listen_port;
        tokio::spawn(async move {
            if let Err(e) = server.run(bound.listener, shutdown).await {
                tracing::error!(port, error = %e, "Forwarding proxy stopped with error");
            }
        });

        self.state = InstanceState::Running;
        self.local_addr = local_addr;
        tracing::info!(
            port = self.listen_port,
            target = %self.target_base_url,
            "Forwarding proxy active"
        );
        Ok(())
    }
}
