//! Session state machine and idle/timeout supervisor.
//!
//! One [`Session`] drives a single connect-to-disconnect lifetime:
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──join event──▶ Active ──┬─▶ Disconnected
//!       ▲                        │                               │   (notice, fault,
//!       └──── connect failed ────┘                               │    idle request)
//!                                                                └─▶ Stopped
//!                                                                    (interrupt,
//!                                                                     wear ceiling)
//! ```
//!
//! While Active the session runs supervisor ticks back to back. A tick waits
//! up to `fish_timeout` for a catch while handling inbound events as they
//! arrive. If the wait runs out with no catch, the tick records a timeout and
//! either sends the fallback action or, when wear has reached the ceiling,
//! stops the process. Everything runs on one task, so no locking is needed.

pub mod handlers;
pub mod policy;
pub mod state;

use tokio::time::{sleep_until, Instant};
use tracing::{error, info, warn};

use crate::auth::Credentials;
use crate::control::Control;
use crate::error::{ConnectError, TransportError};
use crate::events::Outbound;
use crate::report::SessionReport;
use crate::resolve::HostTarget;
use crate::transport::Transport;

use handlers::{Flow, Reaction};
use policy::SessionPolicy;
use state::{SessionState, Status};

/// Why the process is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// User interrupt (SIGINT / SIGTERM).
    Interrupted,
    /// Wear reached the configured ceiling on a timeout.
    WearCeiling,
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    Stopped(StopCause),
    IdleRequested { by: String },
    /// Server sent a disconnect notice. Not an error.
    Disconnected { reason: String },
    Faulted(TransportError),
    ConnectFailed(ConnectError),
}

fn ended(reaction: Reaction) -> Option<SessionEnd> {
    match reaction.flow {
        Flow::End(end) => Some(end),
        Flow::Continue | Flow::Established => None,
    }
}

/// One reconnect attempt.
pub struct Session<'p> {
    policy: &'p SessionPolicy,
    state: SessionState,
}

impl<'p> Session<'p> {
    /// Fresh state, carrying over the wear score of the previous attempt.
    pub fn new(policy: &'p SessionPolicy, wear_score: f64) -> Self {
        Self {
            policy,
            state: SessionState::new(wear_score),
        }
    }

    /// A session following an idle pause; `resumed_at` counts as the last action.
    pub fn resumed(policy: &'p SessionPolicy, wear_score: f64, resumed_at: Instant) -> Self {
        let mut session = Self::new(policy, wear_score);
        session.state.last_action_at = Some(resumed_at);
        session
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Connect, run until the session ends, and always release the link.
    pub async fn run<T: Transport>(
        &mut self,
        transport: &mut T,
        target: &HostTarget,
        credentials: &Credentials,
        report: &mut SessionReport,
        control: &mut Control,
    ) -> SessionEnd {
        self.state.status = Status::Connecting;
        transport.subscribe(&self.policy.subscriptions());
        info!("Session: connecting to {target}");

        let end = match self.connect(transport, target, credentials, control).await {
            Ok(()) => self.drive(transport, report, control).await,
            Err(end) => end,
        };

        let stopping = matches!(end, SessionEnd::Stopped(_));
        self.state.status = if stopping {
            Status::Stopped
        } else {
            Status::Disconnected
        };
        transport.disconnect(!stopping).await;
        end
    }

    async fn connect<T: Transport>(
        &mut self,
        transport: &mut T,
        target: &HostTarget,
        credentials: &Credentials,
        control: &Control,
    ) -> Result<(), SessionEnd> {
        tokio::select! {
            biased;
            () = control.shutdown.cancelled() => Err(SessionEnd::Stopped(StopCause::Interrupted)),
            res = transport.connect(target, credentials) => res.map_err(|e| {
                error!("Session: failed to connect to {target}: {e}");
                self.state.status = Status::Disconnected;
                SessionEnd::ConnectFailed(e)
            }),
        }
    }

    /// Wait for the join event, then run supervisor ticks until the session ends.
    async fn drive<T: Transport>(
        &mut self,
        transport: &mut T,
        report: &mut SessionReport,
        control: &mut Control,
    ) -> SessionEnd {
        let login_deadline = Instant::now() + self.policy.login_timeout;
        loop {
            let event = tokio::select! {
                biased;
                () = control.shutdown.cancelled() => {
                    return SessionEnd::Stopped(StopCause::Interrupted);
                }
                Some(by) = control.idle_rx.recv() => {
                    info!("Session: idle requested by {by} during login");
                    match handlers::request_idle(&mut self.state, by).flow {
                        Flow::End(end) => return end,
                        Flow::Continue | Flow::Established => continue,
                    }
                }
                res = transport.recv() => res,
                () = sleep_until(login_deadline) => Err(TransportError::Fault(format!(
                    "no join event within {}s",
                    self.policy.login_timeout.as_secs()
                ))),
            };
            match self.step(transport, report, event).await {
                Flow::Established => break,
                Flow::End(end) => return end,
                Flow::Continue => {}
            }
        }

        loop {
            if let Some(end) = self.tick(transport, report, control).await {
                return end;
            }
        }
    }

    /// Handle one inbound result and send the resulting actions.
    async fn step<T: Transport>(
        &mut self,
        transport: &mut T,
        report: &mut SessionReport,
        event: Result<crate::events::Inbound, TransportError>,
    ) -> Flow {
        let reaction = match event {
            Ok(ev) => handlers::handle(&mut self.state, self.policy, &ev, Instant::now()),
            Err(e) => handlers::on_fault(&mut self.state, e),
        };
        if reaction.caught {
            report.record_catch();
        }
        for action in reaction.actions {
            if let Err(e) = transport.send(action).await {
                return handlers::on_fault(&mut self.state, e).flow;
            }
        }
        reaction.flow
    }

    /// One supervisor tick. Returns `Some` when the session must end.
    pub async fn tick<T: Transport>(
        &mut self,
        transport: &mut T,
        report: &mut SessionReport,
        control: &mut Control,
    ) -> Option<SessionEnd> {
        self.state.recently_acted = false;
        let deadline = Instant::now() + self.policy.timeout.fish_timeout;

        loop {
            let event = tokio::select! {
                biased;
                () = control.shutdown.cancelled() => {
                    return Some(SessionEnd::Stopped(StopCause::Interrupted));
                }
                Some(by) = control.idle_rx.recv() => {
                    info!("Session: idle requested by {by}");
                    return ended(handlers::request_idle(&mut self.state, by));
                }
                res = transport.recv() => res,
                () = sleep_until(deadline) => break,
            };
            if let Flow::End(end) = self.step(transport, report, event).await {
                return Some(end);
            }
        }

        if self.state.recently_acted {
            return None;
        }
        self.on_timeout(transport, report).await
    }

    async fn on_timeout<T: Transport>(
        &mut self,
        transport: &mut T,
        report: &mut SessionReport,
    ) -> Option<SessionEnd> {
        report.record_timeout();
        let policy = &self.policy.timeout;

        if self.state.wear_score >= policy.wear_ceiling {
            return ended(handlers::on_wear_ceiling(&mut self.state));
        }

        warn!(
            "Session: timed out; more than {}s since last catch. Using the rod once.",
            policy.fish_timeout.as_secs_f64()
        );
        if let Err(e) = transport.send(Outbound::UseItem).await {
            return ended(handlers::on_fault(&mut self.state, e));
        }
        self.state.add_wear(policy.wear_increment_on_timeout);
        self.state.mark_action(Instant::now());
        None
    }
}
