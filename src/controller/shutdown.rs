use super::{Controller, ControllerState};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl Controller {
    /// Release the frame source. Safe to call more than once; the source is
    /// released only the first time.
    pub async fn shutdown(&mut self) {
        if self.released {
            debug!("Frame source already released");
            return;
        }

        info!("Releasing {}", self.source.describe());
        self.source.release().await;
        self.released = true;
        self.transition(ControllerState::Shutdown).await;
        info!("Motioncam shutdown complete");
    }

    /// Cancel `cancel` on SIGINT or SIGTERM, remembering which one arrived
    pub fn install_signal_handlers(&self, cancel: CancellationToken) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let cancel = cancel.clone();
            let signal_name = Arc::clone(&self.signal_name);
            tokio::spawn(async move {
                let sigterm = signal::unix::signal(signal::unix::SignalKind::terminate());
                let mut sigterm = match sigterm {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    record_signal(&signal_name, "SIGTERM");
                    cancel.cancel();
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let signal_name = Arc::clone(&self.signal_name);
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    record_signal(&signal_name, "SIGINT");
                    cancel.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        });
    }
}

/// First signal wins
fn record_signal(slot: &Arc<Mutex<Option<String>>>, name: &str) {
    let mut slot = slot.lock();
    if slot.is_none() {
        *slot = Some(name.to_string());
    }
}
