pub mod telegram;
pub mod update;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

/// Platform chat identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

/// Platform message identifier, used for reply-threading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message received from the platform, reduced to what the relay needs
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub chat_id: ChatId,
    /// `None` for non-text content (stickers, photos, ...)
    pub text: Option<String>,
    pub message_id: Option<MessageId>,
}

/// Result of a single send attempt
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub ok: bool,
    /// Response body as returned by the platform, or the transport error
    pub raw: String,
}

/// Sends replies back to a chat. One attempt per call, no retry.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> SendOutcome;
}
