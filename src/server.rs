use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::bot::{self, Ack, AppState};

#[derive(Debug, Serialize)]
struct WebhookRegistration {
    webhook_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    telegram_response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let webhook_route = state.config.webhook_route();

    Router::new()
        .route("/", get(index))
        .route("/keepalive", get(keepalive))
        .route("/set_webhook", get(set_webhook))
        .route(&webhook_route, post(telegram_webhook))
        .with_state(state)
}

async fn index() -> &'static str {
    "Telegram Gemini relay"
}

async fn keepalive() -> &'static str {
    "OK - alive"
}

// Body is taken as raw bytes: Telegram's Content-Type is not relied on.
async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<Ack>) {
    let (status, ack) = bot::handle_update(&state, &body).await;
    (status, Json(ack))
}

async fn set_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<WebhookRegistration>) {
    let base_url = match public_base_url(&state, &headers) {
        Some(url) => url,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookRegistration {
                    webhook_url: String::new(),
                    telegram_response: None,
                    error: Some("No public URL configured and no Host header".to_string()),
                }),
            );
        }
    };
    let webhook_url = format!("{}{}", base_url, state.config.webhook_route());

    match state.telegram.set_webhook(&webhook_url).await {
        Ok(response) => {
            info!("Webhook registered");
            (
                StatusCode::OK,
                Json(WebhookRegistration {
                    webhook_url,
                    telegram_response: Some(response),
                    error: None,
                }),
            )
        }
        Err(e) => {
            warn!("Webhook registration failed: {:#}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(WebhookRegistration {
                    webhook_url,
                    telegram_response: None,
                    error: Some(format!("{:#}", e)),
                }),
            )
        }
    }
}

/// Configured public URL, else the address this request reached us on.
/// Telegram only delivers to HTTPS, so the fallback needs a TLS-terminating
/// proxy that sets `X-Forwarded-Proto`.
fn public_base_url(state: &AppState, headers: &HeaderMap) -> Option<String> {
    if let Some(url) = &state.config.server.public_url {
        return Some(url.trim_end_matches('/').to_string());
    }
    let header_str = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

    let scheme = header_str("x-forwarded-proto")
        .and_then(|proto| proto.split(',').next())
        .map(str::trim)
        .filter(|proto| !proto.is_empty())
        .unwrap_or("http");

    header_str("host")
        .map(|host| format!("{}://{}", scheme, host.trim_end_matches('/')))
}
