//! Inbound event handlers.
//!
//! Each handler mutates the [`SessionState`] and returns the outbound actions
//! to send as a value. Nothing here touches the transport or the clock, so
//! the state machine can be driven from plain unit tests.

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::policy::SessionPolicy;
use super::state::{SessionState, Status};
use super::{SessionEnd, StopCause};
use crate::chat;
use crate::error::TransportError;
use crate::events::{ChatPosition, Inbound, Outbound, Phase};

/// What the session should do after an event.
#[derive(Debug)]
pub enum Flow {
    Continue,
    /// The join event arrived: `Connecting → Active`.
    Established,
    End(SessionEnd),
}

/// Result of handling one event.
#[derive(Debug)]
pub struct Reaction {
    pub actions: Vec<Outbound>,
    pub flow: Flow,
    /// A primary-success event was counted.
    pub caught: bool,
}

impl Reaction {
    fn none() -> Self {
        Self {
            actions: Vec::new(),
            flow: Flow::Continue,
            caught: false,
        }
    }

    fn end(end: SessionEnd) -> Self {
        Self {
            flow: Flow::End(end),
            ..Self::none()
        }
    }
}

/// Dispatch an inbound event to its handler.
pub fn handle(
    state: &mut SessionState,
    policy: &SessionPolicy,
    event: &Inbound,
    now: Instant,
) -> Reaction {
    match event {
        Inbound::JoinGame => on_join(state, policy),
        Inbound::SoundEffect { sound_id } => on_sound(state, policy, *sound_id, now),
        Inbound::ChatMessage {
            position,
            json_data,
        } => on_chat(state, policy, *position, json_data),
        Inbound::Disconnect { phase, reason } => on_disconnect(state, *phase, reason),
    }
}

/// Session established: cast, then greet and announce the idle phrase if configured.
pub fn on_join(state: &mut SessionState, policy: &SessionPolicy) -> Reaction {
    info!("Session: connection established");
    state.status = Status::Active;

    let mut actions = vec![Outbound::UseItem];
    if let Some(greeting) = &policy.greet_message {
        actions.push(Outbound::Chat {
            message: greeting.clone(),
        });
    }
    if let Some(idle) = &policy.idle {
        if !idle.announcement.is_empty() {
            actions.push(Outbound::Chat {
                message: idle.announcement.clone(),
            });
        }
    }

    Reaction {
        actions,
        flow: Flow::Established,
        caught: false,
    }
}

/// Primary-success check: a splash with the expected id means a catch.
pub fn on_sound(
    state: &mut SessionState,
    policy: &SessionPolicy,
    sound_id: Option<i32>,
    now: Instant,
) -> Reaction {
    if state.status != Status::Active || sound_id != Some(policy.primary_event_id) {
        return Reaction::none();
    }

    state.catches += 1;
    state.mark_action(now);
    state.relieve_wear(policy.timeout.wear_decrement_on_catch);

    if policy.print_catches {
        info!("Session: caught one! ({} this session)", state.catches);
    } else {
        debug!("Session: caught one ({} this session)", state.catches);
    }

    Reaction {
        // Reel in, then cast again.
        actions: vec![Outbound::UseItem, Outbound::UseItem],
        flow: Flow::Continue,
        caught: true,
    }
}

/// Idle request: a chat body exactly equal to the trigger phrase.
pub fn on_chat(
    state: &mut SessionState,
    policy: &SessionPolicy,
    position: ChatPosition,
    json_data: &str,
) -> Reaction {
    let Some(trigger) = &policy.idle else {
        return Reaction::none();
    };
    if state.status != Status::Active {
        return Reaction::none();
    }
    let Some(line) = chat::extract(position, json_data) else {
        return Reaction::none();
    };
    if line.body != trigger.phrase {
        return Reaction::none();
    }

    info!("Session: idle requested by {}", line.sender);
    request_idle(state, line.sender)
}

/// Mark the idle request and end the session from this side.
pub fn request_idle(state: &mut SessionState, by: String) -> Reaction {
    state.idle_requested = true;
    Reaction::end(SessionEnd::IdleRequested { by })
}

/// Server-initiated termination, during login or play.
pub fn on_disconnect(state: &mut SessionState, phase: Phase, reason: &str) -> Reaction {
    warn!("Session: disconnect notice received during {phase:?}: {reason}");
    state.status = Status::Disconnected;
    Reaction::end(SessionEnd::Disconnected {
        reason: reason.to_string(),
    })
}

/// Asynchronous link fault.
pub fn on_fault(state: &mut SessionState, err: TransportError) -> Reaction {
    error!("Session: exception on link: {err}");
    state.status = Status::Disconnected;
    Reaction::end(SessionEnd::Faulted(err))
}

/// Wear reached the ceiling on a timeout.
pub fn on_wear_ceiling(state: &mut SessionState) -> Reaction {
    info!(
        "Session: too many timeouts; the rod has taken ~{} points of wear. Logging out to save it.",
        state.wear_score
    );
    state.status = Status::Stopped;
    Reaction::end(SessionEnd::Stopped(StopCause::WearCeiling))
}
