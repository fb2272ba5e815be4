//! Process-wide graceful shutdown signal
//!
//! One [`ShutdownSignal`] per process, tripped by ctrl-c; every receive loop
//! holds a cloned [`Shutdown`] and checks it at the top of each iteration.

use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Grace period allowed for in-flight events to drain after the signal fires.
pub const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Owning side of the shutdown signal.
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

/// Cloneable listener handed to every long-running task.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> (Self, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, Shutdown { rx })
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// Resolves once the signal has fired (or the sender is gone).
    pub async fn triggered(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Trip the signal on the first ctrl-c.
pub fn trigger_on_ctrl_c(signal: ShutdownSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, shutting down");
            signal.trigger();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_wakes_listeners() {
        let (signal, shutdown) = ShutdownSignal::new();
        let mut listener = shutdown.clone();
        assert!(!shutdown.is_triggered());

        signal.trigger();
        listener.triggered().await;
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_dropped_signal_releases_listeners() {
        let (signal, mut shutdown) = ShutdownSignal::new();
        drop(signal);
        // Must not hang forever once the sender is gone.
        shutdown.triggered().await;
    }
}
