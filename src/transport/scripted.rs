//! Scripted in-memory transport for tests.
//!
//! Each call to `connect` consumes the next [`Script`]. Its events are
//! delivered at fixed offsets from the connect instant, so behaviour under
//! `tokio::time::pause` is fully deterministic. Every outbound event and
//! every disconnect is recorded for assertions.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use super::Transport;
use crate::auth::Credentials;
use crate::error::{ConnectError, TransportError};
use crate::events::{EventKind, Inbound, Outbound};
use crate::resolve::HostTarget;

/// One scripted step: an event or a fault.
pub enum Step {
    Event(Inbound),
    Fault(TransportError),
}

/// What a single connection does.
pub struct Script {
    connect: Result<(), ConnectError>,
    steps: Vec<(Duration, Step)>,
}

impl Script {
    pub fn connected() -> Self {
        Self {
            connect: Ok(()),
            steps: Vec::new(),
        }
    }

    pub fn failing(err: ConnectError) -> Self {
        Self {
            connect: Err(err),
            steps: Vec::new(),
        }
    }

    /// Deliver `event` `at_secs` seconds after connecting.
    pub fn event(mut self, at_secs: f64, event: Inbound) -> Self {
        self.steps
            .push((Duration::from_secs_f64(at_secs), Step::Event(event)));
        self
    }

    pub fn fault(mut self, at_secs: f64, err: TransportError) -> Self {
        self.steps
            .push((Duration::from_secs_f64(at_secs), Step::Fault(err)));
        self
    }
}

/// A recorded call on the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(HostTarget),
    Send(Outbound),
    Disconnect { immediate: bool },
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: VecDeque<Script>,
    pending: VecDeque<(Instant, Step)>,
    subscribed: HashSet<EventKind>,
    connected: bool,
    pub calls: Vec<Call>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: scripts.into(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Send(ev) => Some(ev.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn use_item_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|ev| **ev == Outbound::UseItem)
            .count()
    }

    pub fn connect_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Connect(_)))
            .count()
    }

    pub fn subscribed(&self) -> &HashSet<EventKind> {
        &self.subscribed
    }
}

impl Transport for ScriptedTransport {
    async fn connect(
        &mut self,
        target: &HostTarget,
        _credentials: &Credentials,
    ) -> Result<(), ConnectError> {
        self.calls.push(Call::Connect(target.clone()));
        let Some(script) = self.scripts.pop_front() else {
            return Err(ConnectError::Failed("script exhausted".to_string()));
        };
        script.connect?;
        let now = Instant::now();
        let mut steps = script.steps;
        steps.sort_by_key(|(at, _)| *at);
        self.pending = steps
            .into_iter()
            .map(|(at, step)| (now + at, step))
            .collect();
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, kinds: &[EventKind]) {
        self.subscribed = kinds.iter().copied().collect();
    }

    async fn send(&mut self, event: Outbound) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::Closed);
        }
        self.calls.push(Call::Send(event));
        Ok(())
    }

    async fn recv(&mut self) -> Result<Inbound, TransportError> {
        loop {
            let Some((at, _)) = self.pending.front() else {
                return std::future::pending().await;
            };
            // Sleep before popping so a cancelled recv keeps the step queued.
            tokio::time::sleep_until(*at).await;
            match self.pending.pop_front() {
                Some((_, Step::Event(event))) if self.subscribed.contains(&event.kind()) => {
                    return Ok(event);
                }
                Some((_, Step::Fault(err))) => return Err(err),
                _ => {}
            }
        }
    }

    async fn disconnect(&mut self, immediate: bool) {
        self.connected = false;
        self.pending.clear();
        self.calls.push(Call::Disconnect { immediate });
    }
}
