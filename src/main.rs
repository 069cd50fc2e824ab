//! portfront
//!
//! Serves an application on its primary port (falling back upward when the
//! port is taken) and, when the primary owns the canonical port, fronts it
//! with CORS-permissive forwarding listeners.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────┐
//!                    │                 portfront                  │
//!                    │                                            │
//!  Browser ─────────▶│  :8081 ┐                                   │
//!  (CORS)  ─────────▶│  :8082 ├─▶ cors ─▶ forward ──┐             │
//!          ─────────▶│  :8083 ┘   (OPTIONS local)   │ pooled      │
//!                    │                              ▼ client      │
//!  Client  ─────────▶│  :8080 (or next free) ──▶ application      │
//!                    │                                            │
//!                    │  lifecycle: init store → bind → serve      │
//!                    │             → proxies if on :8080          │
//!                    └───────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use portfront::config::{load_config, ServerConfig};
use portfront::http::default_application;
use portfront::lifecycle::{wait_for_signal, AppContext};
use portfront::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "portfront")]
#[command(about = "Application listener with port fallback and CORS forwarding proxies", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preferred port for the primary listener.
    #[arg(short, long)]
    port: Option<u16>,

    /// Fail instead of walking to the next free port.
    #[arg(long)]
    no_fallback: bool,

    /// Never start the auxiliary forwarding listeners.
    #[arg(long)]
    no_proxies: bool,
}

impl Cli {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.listener.preferred_port = port;
        }
        if self.no_fallback {
            config.listener.allow_fallback = false;
        }
        if self.no_proxies {
            config.proxy.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                logging::init("info");
                tracing::error!(path = %path.display(), error = %e, "Failed to load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };
    cli.apply(&mut config);

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "portfront starting");
    tracing::info!(
        host = %config.listener.host,
        preferred_port = config.listener.preferred_port,
        allow_fallback = config.listener.allow_fallback,
        proxy_ports = ?config.proxy.ports,
        content_type = ?config.proxy.content_type,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = match AppContext::new(config, default_application()).start().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        address = %server.local_addr(),
        proxies = server.running_proxies(),
        "Ready"
    );

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    match server.wait().await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Primary server failed");
            ExitCode::FAILURE
        }
    }
}
