use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::llm::{GeminiClient, Generator};
use crate::platform::telegram::TelegramClient;
use crate::platform::update::{self, Skip};
use crate::platform::Messenger;

/// Telegram rejects longer messages; replies above this are cut.
pub const MAX_MESSAGE_CHARS: usize = 4000;
pub const TRUNCATION_MARKER: &str = "...[truncated]";
// Marker is ASCII, so its byte length is its char count.
const TRUNCATED_KEEP_CHARS: usize = MAX_MESSAGE_CHARS - TRUNCATION_MARKER.len();

const TEXT_ONLY_NOTICE: &str = "I only understand text messages for now.";
const GREETING: &str =
    "Hello! I'm an AI assistant. Send any question and I'll ask Gemini and reply.";

/// Shared application state. Immutable after startup.
pub struct AppState {
    pub config: Config,
    pub generator: Arc<dyn Generator>,
    pub messenger: Arc<dyn Messenger>,
    pub telegram: Arc<TelegramClient>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let telegram = Arc::new(TelegramClient::new(config.telegram.clone()));
        let generator = Arc::new(GeminiClient::new(config.gemini.clone()));
        Self {
            config,
            generator,
            messenger: telegram.clone(),
            telegram,
        }
    }
}

/// Webhook acknowledgment body
#[derive(Debug, Serialize, PartialEq)]
pub struct Ack {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Ack {
    fn ok() -> Self {
        Self { ok: true, raw: None }
    }

    fn rejected() -> Self {
        Self {
            ok: false,
            raw: None,
        }
    }
}

/// Handle one webhook delivery. Every path produces an acknowledgment;
/// only an undecodable body gets a non-2xx status.
pub async fn handle_update(state: &AppState, body: &[u8]) -> (StatusCode, Ack) {
    let update: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Rejecting malformed update: {}", e);
            return (StatusCode::BAD_REQUEST, Ack::rejected());
        }
    };

    let msg = match update::normalize(&update) {
        Ok(msg) => msg,
        Err(Skip::NoMessage) => return (StatusCode::OK, Ack::ok()),
        Err(Skip::MissingChatId) => {
            warn!("Dropping message update without a chat id");
            return (StatusCode::OK, Ack::ok());
        }
    };

    let text = match msg.text.as_deref() {
        Some(t) if !t.is_empty() => t,
        _ => {
            info!("Non-text message in chat {}", msg.chat_id);
            state
                .messenger
                .send_message(msg.chat_id, TEXT_ONLY_NOTICE, msg.message_id)
                .await;
            return (StatusCode::OK, Ack::ok());
        }
    };

    if text.starts_with("/start") {
        info!("Greeting chat {}", msg.chat_id);
        state
            .messenger
            .send_message(msg.chat_id, GREETING, None)
            .await;
        return (StatusCode::OK, Ack::ok());
    }

    info!("Message from chat {}: {}", msg.chat_id, text);

    let prompt = build_prompt(text);
    let reply = fit_message(state.generator.generate(&prompt).await);

    let outcome = state
        .messenger
        .send_message(msg.chat_id, &reply, msg.message_id)
        .await;

    (
        StatusCode::OK,
        Ack {
            ok: outcome.ok,
            raw: Some(outcome.raw),
        },
    )
}

pub fn build_prompt(text: &str) -> String {
    format!("User asked: {}\nProvide a short helpful explanation.", text)
}

/// Cut replies longer than [`MAX_MESSAGE_CHARS`] so that the kept prefix
/// plus [`TRUNCATION_MARKER`] is exactly [`MAX_MESSAGE_CHARS`] characters.
pub fn fit_message(text: String) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(TRUNCATED_KEEP_CHARS).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}
