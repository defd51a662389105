use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::GeminiConfig;

/// Prefix of every result produced by a failed backend call.
pub const ERROR_MARKER: &str = "[error calling generation backend]";

/// Upper bound on the raw-response fallback, in characters.
const FALLBACK_MAX_CHARS: usize = 1900;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> GenerateRequest<'a> {
    fn single(prompt: &'a str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        }
    }
}

/// Produces reply text for a prompt. Never fails: backend errors come back
/// as a readable string that can be shown to the user.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> String;
}

pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn request(&self, prompt: &str) -> Result<Value> {
        let url = self.endpoint();

        debug!("Sending request to Gemini: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&GenerateRequest::single(prompt))
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, error_body);
        }

        response
            .json()
            .await
            .context("Failed to parse Gemini response")
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> String {
        match self.request(prompt).await {
            Ok(data) => {
                let text = reply_text(&data);
                debug!("Gemini reply: {} chars", text.chars().count());
                text
            }
            Err(e) => {
                warn!("Gemini call failed: {:#}", e);
                format!("{} {:#}", ERROR_MARKER, e)
            }
        }
    }
}

/// Answer text from a response document, or a bounded dump of the document
/// when it holds no text at all.
pub fn reply_text(data: &Value) -> String {
    match find_text(data) {
        Some(text) => text.to_string(),
        None => truncate_chars(&data.to_string(), FALLBACK_MAX_CHARS),
    }
}

/// Depth-first search for the first non-empty string in the document.
///
/// Object values are visited in document order (serde_json is built with
/// `preserve_order`), array elements in index order. This is a heuristic,
/// not a schema: for a normal `generateContent` response the first string
/// reached is `candidates[0].content.parts[0].text`, but a response that put
/// another string field ahead of it would be returned instead.
pub fn find_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.as_str()),
        Value::Object(map) => map.values().find_map(find_text),
        Value::Array(items) => items.iter().find_map(find_text),
        _ => None,
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
