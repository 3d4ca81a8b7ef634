//! WebSocket bridge transport.
//!
//! The game protocol itself is spoken by a bridge process; this client talks
//! to it over a WebSocket carrying one JSON object per text frame.
//!
//! ```text
//! client → bridge   {"type":"login","address":..,"port":..,"version":..,"username":..,
//!                    "access_token":..,"uuid":..,"subscribe":["join_game",..]}
//! bridge → client   {"type":"connected"}
//!                 | {"type":"connect_error","refused":true,"reason":".."}
//! bridge → client   inbound events ({"type":"sound_effect","sound_id":184}, ...)
//!                 | {"type":"fault","message":".."}
//! client → bridge   {"type":"use_item"} | {"type":"chat","message":".."}
//! ```

use std::collections::HashSet;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use super::Transport;
use crate::auth::Credentials;
use crate::error::{ConnectError, TransportError};
use crate::events::{EventKind, Inbound, Outbound};
use crate::resolve::HostTarget;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// [`Transport`] backed by a WebSocket to a protocol bridge.
pub struct BridgeTransport {
    url: String,
    version: String,
    subscribed: HashSet<EventKind>,
    stream: Option<WsStream>,
}

impl BridgeTransport {
    pub fn new(url: String, version: String) -> Self {
        Self {
            url,
            version,
            subscribed: HashSet::new(),
            stream: None,
        }
    }

    fn login_frame(&self, target: &HostTarget, credentials: &Credentials) -> Value {
        let subscribe: Vec<EventKind> = self.subscribed.iter().copied().collect();
        json!({
            "type": "login",
            "address": target.address,
            "port": target.port,
            "version": self.version,
            "username": credentials.username,
            "access_token": credentials.access_token,
            "uuid": credentials.uuid,
            "subscribe": subscribe,
        })
    }
}

/// Map a WebSocket connect failure onto the refused / other split.
fn classify_connect_error(url: &str, err: tungstenite::Error) -> ConnectError {
    match err {
        tungstenite::Error::Io(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            ConnectError::Refused(url.to_string())
        }
        other => ConnectError::Failed(other.to_string()),
    }
}

/// Interpret the bridge's reply to the login frame.
fn parse_login_reply(text: &str, target: &HostTarget) -> Result<(), ConnectError> {
    let reply: Value = serde_json::from_str(text)
        .map_err(|e| ConnectError::Failed(format!("bad login reply: {e}")))?;
    match reply["type"].as_str() {
        Some("connected") => Ok(()),
        Some("connect_error") => {
            let reason = reply["reason"].as_str().unwrap_or("unknown").to_string();
            if reply["refused"].as_bool() == Some(true) {
                Err(ConnectError::Refused(target.to_string()))
            } else {
                Err(ConnectError::Failed(reason))
            }
        }
        other => Err(ConnectError::Failed(format!(
            "unexpected login reply type {other:?}"
        ))),
    }
}

/// Decode one text frame. `Ok(None)` means the frame is not for us.
fn decode_frame(
    text: &str,
    subscribed: &HashSet<EventKind>,
) -> Result<Option<Inbound>, TransportError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| TransportError::Protocol(e.to_string()))?;
    if value["type"].as_str() == Some("fault") {
        let message = value["message"].as_str().unwrap_or("unspecified").to_string();
        return Err(TransportError::Fault(message));
    }
    match serde_json::from_value::<Inbound>(value) {
        Ok(event) if subscribed.contains(&event.kind()) => Ok(Some(event)),
        Ok(_) => Ok(None),
        Err(e) => {
            debug!("Bridge: skipping undecodable frame: {e}");
            Ok(None)
        }
    }
}

impl Transport for BridgeTransport {
    async fn connect(
        &mut self,
        target: &HostTarget,
        credentials: &Credentials,
    ) -> Result<(), ConnectError> {
        self.stream = None;
        info!("Bridge: connecting to {} for {target}", self.url);

        let (mut ws, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| classify_connect_error(&self.url, e))?;

        let login = self.login_frame(target, credentials);
        ws.send(Message::Text(login.to_string().into()))
            .await
            .map_err(|e| ConnectError::Failed(e.to_string()))?;

        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    parse_login_reply(&text, target)?;
                    break;
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(ConnectError::Failed(
                        "bridge closed during login".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ConnectError::Failed(e.to_string())),
            }
        }

        self.stream = Some(ws);
        Ok(())
    }

    fn subscribe(&mut self, kinds: &[EventKind]) {
        self.subscribed = kinds.iter().copied().collect();
    }

    async fn send(&mut self, event: Outbound) -> Result<(), TransportError> {
        let ws = self.stream.as_mut().ok_or(TransportError::Closed)?;
        let text =
            serde_json::to_string(&event).map_err(|e| TransportError::Protocol(e.to_string()))?;
        ws.send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Fault(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Inbound, TransportError> {
        let ws = self.stream.as_mut().ok_or(TransportError::Closed)?;
        loop {
            let Some(msg) = ws.next().await else {
                return Err(TransportError::Closed);
            };
            match msg.map_err(|e| TransportError::Fault(e.to_string()))? {
                Message::Text(text) => {
                    if let Some(event) = decode_frame(&text, &self.subscribed)? {
                        return Ok(event);
                    }
                }
                Message::Close(_) => return Err(TransportError::Closed),
                _ => {}
            }
        }
    }

    async fn disconnect(&mut self, immediate: bool) {
        let Some(mut ws) = self.stream.take() else {
            return;
        };
        if !immediate {
            if let Err(e) = ws.close(None).await {
                warn!("Bridge: close handshake failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> HostTarget {
        HostTarget {
            address: "mc.local".to_string(),
            port: 25565,
        }
    }

    fn all_kinds() -> HashSet<EventKind> {
        [
            EventKind::JoinGame,
            EventKind::SoundEffect,
            EventKind::ChatMessage,
            EventKind::Disconnect,
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_login_reply_connected() {
        assert!(parse_login_reply(r#"{"type":"connected"}"#, &target()).is_ok());
    }

    #[test]
    fn test_login_reply_refused() {
        let err = parse_login_reply(
            r#"{"type":"connect_error","refused":true,"reason":"Connection refused"}"#,
            &target(),
        )
        .unwrap_err();
        assert!(matches!(err, ConnectError::Refused(ref t) if t == "mc.local:25565"));
    }

    #[test]
    fn test_login_reply_other_failure() {
        let err = parse_login_reply(
            r#"{"type":"connect_error","reason":"outdated client"}"#,
            &target(),
        )
        .unwrap_err();
        assert!(matches!(err, ConnectError::Failed(ref r) if r == "outdated client"));
    }

    #[test]
    fn test_decode_frame_filters_unsubscribed() {
        let mut kinds = all_kinds();
        kinds.remove(&EventKind::ChatMessage);
        let frame = r#"{"type":"chat_message","position":"chat","json_data":"{}"}"#;
        assert!(decode_frame(frame, &kinds).unwrap().is_none());
        assert!(decode_frame(frame, &all_kinds()).unwrap().is_some());
    }

    #[test]
    fn test_decode_frame_fault() {
        let err = decode_frame(r#"{"type":"fault","message":"read timed out"}"#, &all_kinds())
            .unwrap_err();
        assert!(matches!(err, TransportError::Fault(ref m) if m == "read timed out"));
    }

    #[test]
    fn test_decode_frame_skips_unknown_types() {
        assert!(decode_frame(r#"{"type":"keep_alive","id":7}"#, &all_kinds())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_login_frame_carries_credentials() {
        let mut transport = BridgeTransport::new("ws://bridge".to_string(), "1.16.4".to_string());
        transport.subscribe(&[EventKind::JoinGame]);
        let frame = transport.login_frame(&target(), &Credentials::offline("fisherman"));
        assert_eq!(frame["type"], "login");
        assert_eq!(frame["port"], 25565);
        assert_eq!(frame["username"], "fisherman");
        assert!(frame["access_token"].is_null());
        assert_eq!(frame["subscribe"][0], "join_game");
    }
}
