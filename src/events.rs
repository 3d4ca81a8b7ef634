//! Typed events exchanged with the transport.
//!
//! Inbound events are what the server sends us, already decoded by the
//! transport. Outbound events are the only two actions this client ever takes.

use serde::{Deserialize, Serialize};

/// Inbound event kinds a session can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    JoinGame,
    SoundEffect,
    ChatMessage,
    Disconnect,
}

/// Where a chat line was shown on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatPosition {
    Chat,
    System,
    GameInfo,
}

/// Protocol phase a disconnect notice arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Login,
    Play,
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// The server accepted us into the world ("session established").
    JoinGame,
    /// A sound played near the player. `sound_id` is `None` when the payload
    /// carried something that is not an integer id.
    SoundEffect {
        #[serde(default, deserialize_with = "lenient_id")]
        sound_id: Option<i32>,
    },
    /// A chat line with its raw JSON text component.
    ChatMessage {
        position: ChatPosition,
        json_data: String,
    },
    /// Server-initiated termination.
    Disconnect {
        phase: Phase,
        #[serde(default)]
        reason: String,
    },
}

impl Inbound {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::JoinGame => EventKind::JoinGame,
            Self::SoundEffect { .. } => EventKind::SoundEffect,
            Self::ChatMessage { .. } => EventKind::ChatMessage,
            Self::Disconnect { .. } => EventKind::Disconnect,
        }
    }
}

/// An action sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Use the item in the main hand (cast or reel in the rod).
    UseItem,
    /// Send a chat line.
    Chat { message: String },
}

/// Accept any JSON value for an id and keep it only if it is an `i32`.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64().and_then(|v| i32::try_from(v).ok()))
}
