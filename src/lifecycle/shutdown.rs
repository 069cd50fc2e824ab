//! Stop signal shared by the primary listener and the auxiliary fleet.

use tokio::sync::broadcast;

/// Fan-out stop signal.
///
/// Each server task holds a receiver taken from [`Shutdown::subscribe`] and
/// drains its connections once the signal fires. Clones share one channel.
#[derive(Debug, Clone)]
pub struct Shutdown {
    stop: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        // One slot: the signal is only ever sent once per run.
        let (stop, _) = broadcast::channel(1);
        Self { stop }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.stop.subscribe()
    }

    /// Tell every subscribed listener to stop accepting.
    ///
    /// Returns how many listeners were notified; zero is not an error.
    pub fn trigger(&self) -> usize {
        let notified = self.stop.send(()).unwrap_or(0);
        tracing::info!(listeners = notified, "Stopping listeners");
        notified
    }

    /// Listeners that have not yet dropped their receiver.
    pub fn receiver_count(&self) -> usize {
        self.stop.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
