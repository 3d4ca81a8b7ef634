//! Extract the sender and body from a chat event's JSON text component.
//!
//! Two shapes carry player-authored text:
//!
//! - **System** position with `translate` set to a whisper or announcement
//!   key: sender in `with[0].text`, body in `with[1].text`.
//! - **Chat** position: sender in `with[0].insertion`, body is the plain
//!   string `with[1]`.
//!
//! Everything else (game info, join notices, malformed JSON) yields `None`.

use serde_json::Value;

use crate::events::ChatPosition;

const WHISPER_KEY: &str = "commands.message.display.incoming";
const ANNOUNCEMENT_KEY: &str = "chat.type.announcement";

/// A player-authored chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub sender: String,
    pub body: String,
}

/// Parse `json_data` into a [`ChatLine`], or `None` if it is not player text.
pub fn extract(position: ChatPosition, json_data: &str) -> Option<ChatLine> {
    let data: Value = serde_json::from_str(json_data).ok()?;
    let with = data.get("with")?.as_array()?;

    let (sender, body) = match position {
        ChatPosition::System => {
            let key = data.get("translate").and_then(Value::as_str).unwrap_or("");
            if key != WHISPER_KEY && key != ANNOUNCEMENT_KEY {
                return None;
            }
            (
                with.first()?.get("text")?.as_str()?,
                with.get(1)?.get("text")?.as_str()?,
            )
        }
        ChatPosition::Chat => (
            with.first()?.get("insertion")?.as_str()?,
            with.get(1)?.as_str()?,
        ),
        ChatPosition::GameInfo => return None,
    };

    Some(ChatLine {
        sender: sender.to_string(),
        body: body.to_string(),
    })
}
