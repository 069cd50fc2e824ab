//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Run the one-time store initialization before any traffic
//! - Bind the primary listener (with fallback) and serve the application
//! - Start the proxy fleet when the primary owns the canonical port
//!
//! # Design Decisions
//! - Fail fast: init and primary bind errors are fatal
//! - Proxy failures never abort startup
//! - Everything is wired through [`AppContext`]; there are no globals

use async_trait::async_trait;
use axum::Router;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::{validate_config, ServerConfig, ValidationError};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::{BindError, ListenerBinding, PortBinder};
use crate::proxy::{ProxyFleet, ProxyInstance};

/// Failure of the one-time store initialization.
#[derive(Debug, thiserror::Error)]
#[error("store initialization failed: {message}")]
pub struct InitError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl InitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Idempotent data-store setup run once before the primary binds.
#[async_trait]
pub trait StoreInitializer: Send + Sync {
    async fn initialize(&self) -> Result<(), InitError>;
}

/// Initializer for applications without a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInitializer;

#[async_trait]
impl StoreInitializer for NoopInitializer {
    async fn initialize(&self) -> Result<(), InitError> {
        Ok(())
    }
}

/// Error type for startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ValidationError>),
    #[error(transparent)]
    Init(#[from] InitError),
    #[error("primary listener: {0}")]
    Bind(#[from] BindError),
    #[error("primary listener: {0}")]
    Io(#[from] io::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Composition root: configuration plus the collaborators the core drives.
pub struct AppContext {
    config: ServerConfig,
    application: Router,
    initializer: Arc<dyn StoreInitializer>,
}

impl AppContext {
    pub fn new(config: ServerConfig, application: Router) -> Self {
        Self {
            config,
            application,
            initializer: Arc::new(NoopInitializer),
        }
    }

    pub fn with_initializer(mut self, initializer: Arc<dyn StoreInitializer>) -> Self {
        self.initializer = initializer;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the startup sequence and return a handle to the primary.
    pub async fn start(self) -> Result<RunningServer, StartupError> {
        let config = self.config;
        validate_config(&config).map_err(StartupError::Config)?;
        let primary_host = parse_host(&config.listener.host)?;
        let proxy_host = parse_host(&config.proxy.host)?;

        tracing::info!("Initializing store");
        self.initializer.initialize().await?;

        let binder = PortBinder::new(
            primary_host,
            config.listener.allow_fallback,
            config.listener.max_fallback_attempts,
        );
        let bound = binder.bind(config.listener.preferred_port).await?;
        let binding = bound.binding;
        let local_addr = bound.local_addr()?;
        tracing::info!(
            port = binding.actual_port,
            requested = binding.requested_port,
            "Server started"
        );

        let shutdown = Shutdown::new();
        let server = HttpServer::new("primary", self.application);
        let primary = tokio::spawn(server.run(bound.listener, shutdown.subscribe()));

        let fleet = if !config.proxy.enabled {
            tracing::info!("Proxy fleet disabled");
            ProxyFleet::default()
        } else if binding.actual_port != config.listener.canonical_port {
            tracing::info!(
                port = binding.actual_port,
                canonical = config.listener.canonical_port,
                "Primary is off its canonical port, not starting proxies"
            );
            ProxyFleet::default()
        } else {
            ProxyFleet::start(
                &config.proxy,
                &config.timeouts,
                proxy_host,
                binding.actual_port,
                &shutdown,
            )
            .await
        };

        Ok(RunningServer {
            binding,
            local_addr,
            proxies: fleet.instances().to_vec(),
            shutdown,
            primary,
        })
    }
}

fn parse_host(host: &str) -> Result<IpAddr, StartupError> {
    host.parse()
        .map_err(|_| StartupError::Config(vec![ValidationError::InvalidHost(host.to_string())]))
}

/// Handle to the running primary listener.
///
/// Proxies keep running in the background; only their snapshots are exposed.
#[derive(Debug)]
pub struct RunningServer {
    binding: ListenerBinding,
    local_addr: SocketAddr,
    proxies: Vec<ProxyInstance>,
    shutdown: Shutdown,
    primary: JoinHandle<io::Result<()>>,
}

impl RunningServer {
    pub fn binding(&self) -> ListenerBinding {
        self.binding
    }

    pub fn port(&self) -> u16 {
        self.binding.actual_port
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Snapshot of every auxiliary listener taken at startup.
    pub fn proxies(&self) -> &[ProxyInstance] {
        &self.proxies
    }

    pub fn running_proxies(&self) -> usize {
        self.proxies.iter().filter(|p| p.is_running()).count()
    }

    /// Shutdown coordinator shared by the primary and its proxies.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Wait for the primary server to stop.
    pub async fn wait(self) -> io::Result<()> {
        self.primary.await.map_err(io::Error::other)?
    }

    /// Signal every listener to stop and wait for the primary to drain.
    pub async fn stop(self) -> io::Result<()> {
        self.shutdown.trigger();
        self.wait().await
    }
}
