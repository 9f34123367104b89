//! Chat message entity - the payload relayed through the shared channel

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Default channel topic shared by every relay instance
pub const DEFAULT_TOPIC: &str = "chat_channel";

/// Identity attached to messages from connections that did not supply one
pub const DEFAULT_IDENTITY: &str = "user";

/// Sender identity used for lifecycle notifications
pub const SYSTEM_SENDER: &str = "system";

/// Content of the notice published when a connection leaves
pub const DEPARTURE_NOTICE: &str = "A user has left the chat.";

/// A message exchanged between clients and the shared channel
///
/// Encoded on the channel as a flat JSON object:
/// `{"sender_id": "...", "content": "..."}`. Older publishers name the sender
/// field `user_id`; both spellings decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(alias = "user_id")]
    pub sender_id: String,
    pub content: String,
}

impl ChatMessage {
    /// Create a new message
    pub fn new(sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            content: content.into(),
        }
    }

    /// Create the system notice announcing that a connection has left
    #[must_use]
    pub fn departure() -> Self {
        Self::new(SYSTEM_SENDER, DEPARTURE_NOTICE)
    }

    /// Encode for publishing on the channel
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a payload received from the channel
    pub fn from_json(payload: &str) -> Result<Self, CodecError> {
        let message: Self = serde_json::from_str(payload)?;
        if message.sender_id.is_empty() {
            return Err(CodecError::MissingSender);
        }
        Ok(message)
    }

    /// Render the text frame delivered to clients
    pub fn render(&self, topic: &str) -> String {
        format!(
            "Message from {topic}: {} by user {}",
            self.content, self.sender_id
        )
    }
}
