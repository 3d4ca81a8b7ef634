//! Link to the game server.
//!
//! The session state machine only sees the [`Transport`] capability set:
//! connect, subscribe to event kinds, send actions, receive events, and
//! disconnect. Wire encoding, encryption and the login handshake live behind
//! it.
//!
//! - `bridge.rs`   — WebSocket link to a protocol bridge (production)
//! - `scripted.rs` — in-memory transport replaying a timed script (tests)

pub mod bridge;
#[cfg(test)]
pub mod scripted;

use crate::auth::Credentials;
use crate::error::{ConnectError, TransportError};
use crate::events::{EventKind, Inbound, Outbound};
use crate::resolve::HostTarget;

/// Capabilities the session needs from a link.
///
/// Implementations deliver inbound events one at a time through [`recv`],
/// which must be cancel-safe: the session races it against timers and the
/// shutdown signal, and a dropped `recv` future must not lose an event.
/// An `Err` from `recv` is the asynchronous fault callback: the link is gone.
///
/// [`recv`]: Transport::recv
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open the link and complete the handshake with `credentials`.
    async fn connect(
        &mut self,
        target: &HostTarget,
        credentials: &Credentials,
    ) -> Result<(), ConnectError>;

    /// Restrict delivered events to `kinds`. Takes effect for the next connection.
    fn subscribe(&mut self, kinds: &[EventKind]);

    async fn send(&mut self, event: Outbound) -> Result<(), TransportError>;

    /// Next subscribed inbound event.
    async fn recv(&mut self) -> Result<Inbound, TransportError>;

    /// Close the link. `immediate` skips the graceful close handshake.
    /// Safe to call when not connected.
    async fn disconnect(&mut self, immediate: bool);
}
