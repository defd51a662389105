use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::platform::{ChatId, MessageId, Messenger, SendOutcome};

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<MessageId>,
}

#[derive(Debug, Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
}

/// Thin client over the Bot API methods the relay uses
pub struct TelegramClient {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.send_timeout_secs)
    }

    async fn try_send(&self, request: &SendMessageRequest<'_>) -> Result<SendOutcome> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(self.timeout())
            .json(request)
            .send()
            .await
            .context("Failed to send request to Telegram")?;

        let ok = response.status().is_success();
        let raw = response
            .text()
            .await
            .context("Failed to read Telegram response")?;

        Ok(SendOutcome { ok, raw })
    }

    /// Point the platform at `url` for future update deliveries.
    pub async fn set_webhook(&self, url: &str) -> Result<serde_json::Value> {
        debug!("Registering Telegram webhook: {}", url);

        let response = self
            .client
            .post(self.method_url("setWebhook"))
            .timeout(self.timeout())
            .json(&SetWebhookRequest { url })
            .send()
            .await
            .context("Failed to send setWebhook request to Telegram")?;

        response
            .json()
            .await
            .context("Failed to parse setWebhook response")
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> SendOutcome {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
            reply_to_message_id: reply_to,
        };

        debug!("Sending {} chars to chat {}", text.chars().count(), chat_id);

        match self.try_send(&request).await {
            Ok(outcome) => {
                if !outcome.ok {
                    warn!("Telegram rejected message for chat {}: {}", chat_id, outcome.raw);
                }
                outcome
            }
            Err(e) => {
                warn!("Telegram send to chat {} failed: {:#}", chat_id, e);
                SendOutcome {
                    ok: false,
                    raw: format!("{:#}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> TelegramClient {
        TelegramClient::new(TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_base_url: server.url(),
            send_timeout_secs: 5,
        })
    }

    #[tokio::test]
    async fn test_send_with_reply_threading() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .match_body(Matcher::Json(json!({
                "chat_id": 42,
                "text": "hello",
                "parse_mode": "Markdown",
                "reply_to_message_id": 7
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{}}"#)
            .create_async()
            .await;

        let outcome = client_for(&server)
            .send_message(ChatId(42), "hello", Some(MessageId(7)))
            .await;

        assert!(outcome.ok);
        assert_eq!(outcome.raw, r#"{"ok":true,"result":{}}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reply_field_omitted_when_absent() {
        let mut server = mockito::Server::new_async().await;
        // Matcher::Json is exact, so a `reply_to_message_id: null` would not match.
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .match_body(Matcher::Json(json!({
                "chat_id": 42,
                "text": "hi",
                "parse_mode": "Markdown"
            })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let outcome = client_for(&server)
            .send_message(ChatId(42), "hi", None)
            .await;

        assert!(outcome.ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_reported_not_raised() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let outcome = client_for(&server)
            .send_message(ChatId(1), "x", None)
            .await;

        assert!(!outcome.ok);
        assert!(outcome.raw.contains("chat not found"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_ok() {
        let client = TelegramClient::new(TelegramConfig {
            bot_token: "t".to_string(),
            // Nothing listens on port 9 (discard) on CI hosts.
            api_base_url: "http://127.0.0.1:9".to_string(),
            send_timeout_secs: 2,
        });

        let outcome = client.send_message(ChatId(1), "x", None).await;

        assert!(!outcome.ok);
        assert!(outcome.raw.contains("Failed to send request to Telegram"));
    }

    #[tokio::test]
    async fn test_set_webhook() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/setWebhook")
            .match_body(Matcher::Json(json!({"url": "https://example.com/telegram/s"})))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":true,"description":"Webhook was set"}"#)
            .create_async()
            .await;

        let response = client_for(&server)
            .set_webhook("https://example.com/telegram/s")
            .await
            .unwrap();

        assert_eq!(response["description"], "Webhook was set");
        mock.assert_async().await;
    }
}
