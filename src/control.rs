//! Process-level control: stop and idle requests.
//!
//! SIGINT and SIGTERM cancel a shared [`CancellationToken`]; every wait in the
//! session and reconnect loop races against it. SIGUSR1 raises an idle
//! request, the same as the chat trigger phrase.

use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Sending side, cheap to clone.
#[derive(Clone)]
pub struct ControlHandle {
    shutdown: CancellationToken,
    idle_tx: mpsc::UnboundedSender<String>,
}

impl ControlHandle {
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Ask for an idle pause, or extend the one in progress. `by` is logged.
    pub fn request_idle(&self, by: &str) {
        let _ = self.idle_tx.send(by.to_string());
    }
}

/// Receiving side, owned by the reconnect loop.
pub struct Control {
    pub(crate) shutdown: CancellationToken,
    pub(crate) idle_rx: mpsc::UnboundedReceiver<String>,
    /// Keeps `idle_rx` open when no handle is alive.
    _idle_tx: mpsc::UnboundedSender<String>,
}

impl Control {
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Drive `fut` to completion unless a stop arrives first, then `None`.
    pub async fn unless_stopped<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

pub fn channel() -> (ControlHandle, Control) {
    let shutdown = CancellationToken::new();
    let (idle_tx, idle_rx) = mpsc::unbounded_channel();
    (
        ControlHandle {
            shutdown: shutdown.clone(),
            idle_tx: idle_tx.clone(),
        },
        Control {
            shutdown,
            idle_rx,
            _idle_tx: idle_tx,
        },
    )
}

/// Wire OS signals to `handle`.
pub fn install_signal_handlers(handle: ControlHandle) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM");
            let mut sigusr1 =
                signal(SignalKind::user_defined1()).expect("Failed to register SIGUSR1");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received SIGINT");
                        handle.stop();
                        break;
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM");
                        handle.stop();
                        break;
                    }
                    _ = sigusr1.recv() => {
                        info!("Received SIGUSR1, requesting idle pause");
                        handle.request_idle("SIGUSR1");
                    }
                }
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
            info!("Received SIGINT");
            handle.stop();
        }
    });
}
