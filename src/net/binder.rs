//! Port binding with upward fallback.
//!
//! # Responsibilities
//! - Bind a TCP listener on a preferred port
//! - On contention, walk upward one port at a time (bounded)
//! - Classify failures as contention or fatal using `io::ErrorKind`

use std::io;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;

/// Error type for bind operations.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Port already in use and no fallback allowed.
    #[error("port {port} is already in use")]
    Contention { port: u16 },
    /// Bind failed for a reason other than contention.
    #[error("failed to bind port {port}: {source}")]
    Fatal {
        port: u16,
        #[source]
        source: io::Error,
    },
    /// Every port in the fallback window was taken.
    #[error("no free port between {from} and {to}")]
    Exhausted { from: u16, to: u16 },
}

impl BindError {
    /// True when the failure was caused by an occupied port.
    pub fn is_contention(&self) -> bool {
        matches!(self, BindError::Contention { .. } | BindError::Exhausted { .. })
    }
}

/// Outcome of a bind: which port was asked for and which one was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerBinding {
    pub requested_port: u16,
    pub actual_port: u16,
    pub fallback_enabled: bool,
}

impl ListenerBinding {
    /// True when the listener ended up somewhere other than requested.
    pub fn fell_back(&self) -> bool {
        self.actual_port != self.requested_port
    }
}

/// A live listener together with its binding record.
#[derive(Debug)]
pub struct BoundListener {
    pub listener: TcpListener,
    pub binding: ListenerBinding,
}

impl BoundListener {
    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Binds listeners, optionally falling back to higher ports.
#[derive(Debug, Clone, Copy)]
pub struct PortBinder {
    host: IpAddr,
    allow_fallback: bool,
    max_attempts: u32,
}

impl PortBinder {
    pub fn new(host: IpAddr, allow_fallback: bool, max_attempts: u32) -> Self {
        Self {
            host,
            allow_fallback,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Binder for a single fixed port: contention is reported, never retried.
    pub fn exact(host: IpAddr) -> Self {
        Self::new(host, false, 1)
    }

    /// Bind `preferred_port`, walking upward on contention when allowed.
    ///
    /// Stops after `max_attempts` tries or at port 65535, whichever comes first.
    pub async fn bind(&self, preferred_port: u16) -> Result<BoundListener, BindError> {
        let mut port = preferred_port;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            tracing::debug!(host = %self.host, port, attempt = attempts, "Attempting bind");

            match TcpListener::bind(SocketAddr::new(self.host, port)).await {
                Ok(listener) => {
                    // Port 0 asks the OS to pick; record what it chose.
                    let actual_port = listener.local_addr().map_or(port, |a| a.port());
                    tracing::info!(host = %self.host, port = actual_port, "Listener bound");
                    return Ok(BoundListener {
                        listener,
                        binding: ListenerBinding {
                            requested_port: preferred_port,
                            actual_port,
                            fallback_enabled: self.allow_fallback,
                        },
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    if !self.allow_fallback {
                        return Err(BindError::Contention { port });
                    }
                    let next = match port.checked_add(1) {
                        Some(next) if attempts < self.max_attempts => next,
                        _ => {
                            return Err(BindError::Exhausted {
                                from: preferred_port,
                                to: port,
                            })
                        }
                    };
                    tracing::info!(busy = port, next, "Port busy, retrying");
                    metrics::counter!("primary_bind_retries_total").increment(1);
                    port = next;
                }
                Err(source) => return Err(BindError::Fatal { port, source }),
            }
        }
    }
}
