//! Runtime - graceful shutdown, signal handling, background sweeps

use crate::Node;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// How often expired challenges are dropped from the store.
pub const CHALLENGE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shutdown signal broadcaster
#[derive(Clone)]
pub struct Shutdown {
    sender: broadcast::Sender<()>,
    triggered: Arc<RwLock<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self { Self::new() }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender, triggered: Arc::new(RwLock::new(false)) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Idempotent.
    pub async fn trigger(&self) {
        let mut triggered = self.triggered.write().await;
        if !*triggered {
            *triggered = true;
            let _ = self.sender.send(());
        }
    }

    pub async fn is_triggered(&self) -> bool {
        *self.triggered.read().await
    }

    /// Resolves once shutdown has been triggered, including before the call.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_triggered().await {
            return;
        }
        let _ = rx.recv().await;
    }
}

/// SIGINT/SIGTERM (Ctrl+C elsewhere) trigger the returned handle.
pub fn install_signal_handlers() -> Shutdown {
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        handle.trigger().await;
    });

    shutdown
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            error!("signal handlers unavailable: {e}");
            return std::future::pending().await;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C"),
        Err(e) => {
            error!("Ctrl+C handler unavailable: {e}");
            std::future::pending::<()>().await
        }
    }
}

/// Drops expired challenges every `every` until shutdown.
pub fn spawn_challenge_sweeper(node: Arc<Node>, every: Duration, shutdown: &Shutdown) -> JoinHandle<()> {
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = node.auth().purge_expired();
                    if purged > 0 {
                        debug!(purged, "expired challenges dropped");
                    }
                }
                _ = stop.recv() => break,
            }
        }
    })
}
