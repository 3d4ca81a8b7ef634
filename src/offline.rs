//! Enforced offline window after an idle request.
//!
//! The window lasts `threshold` from the request. Further idle requests while
//! offline push the deadline out to `now + threshold` but never pull it in, so
//! the window is extended rather than restarted. Offline time is tracked in
//! its own counter, apart from the wear score.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::info;

use crate::control::Control;

#[derive(Debug)]
pub struct OfflineWindow {
    threshold: Duration,
    started: Instant,
    deadline: Instant,
    extensions: u32,
    /// Time actually spent offline, set when the wait returns.
    served: Duration,
}

impl OfflineWindow {
    pub fn start(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            started: now,
            deadline: now + threshold,
            extensions: 0,
            served: Duration::ZERO,
        }
    }

    pub fn extend(&mut self, now: Instant) {
        self.deadline = self.deadline.max(now + self.threshold);
        self.extensions += 1;
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn extensions(&self) -> u32 {
        self.extensions
    }

    pub fn served(&self) -> Duration {
        self.served
    }

    /// Sleep until the deadline. Idle requests extend the window; a stop
    /// request cuts it short. Returns the completion instant, or `None` if
    /// stopped.
    pub async fn wait(&mut self, control: &mut Control) -> Option<Instant> {
        info!(
            "Offline: staying disconnected for {:.1}s",
            self.threshold.as_secs_f64()
        );
        loop {
            tokio::select! {
                biased;
                () = control.shutdown.cancelled() => {
                    self.served = self.started.elapsed();
                    return None;
                }
                Some(by) = control.idle_rx.recv() => {
                    let now = Instant::now();
                    self.extend(now);
                    info!(
                        "Offline: idle extended by {by}, {:.1}s remaining",
                        (self.deadline - now).as_secs_f64()
                    );
                }
                () = sleep_until(self.deadline) => {
                    let now = Instant::now();
                    self.served = now - self.started;
                    return Some(now);
                }
            }
        }
    }
}
