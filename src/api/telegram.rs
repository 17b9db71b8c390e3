use super::AppState;
use crate::{
    constants::TELEGRAM_SESSION_PREFIX,
    error::{AppError, Result},
    integrations::telegram::{TelegramClient, TelegramUpdate},
    models::ApiResponse,
};
use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";
const UNAUTHORIZED_CHAT_REPLY: &str = "This chat is not allowed to use this bot.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub handled: bool,
}

pub fn session_key(chat_id: i64) -> String {
    format!("{}{}", TELEGRAM_SESSION_PREFIX, chat_id)
}

// Internal helper that supports `telegram_webhook` operations.
fn verify_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if provided != expected {
        return Err(AppError::AuthError(
            "Invalid Telegram webhook secret".to_string(),
        ));
    }
    Ok(())
}

// Internal helper that sends a chat reply and only logs failures.
async fn deliver_reply(telegram: Option<&TelegramClient>, chat_id: i64, reply: &str) {
    match telegram {
        Some(client) => {
            if let Err(err) = client.send_message(chat_id, reply).await {
                tracing::warn!("Telegram reply to chat {} failed: {}", chat_id, err);
            }
        }
        None => tracing::warn!("Telegram update received but TELEGRAM_BOT_TOKEN is not set"),
    }
}

/// POST /api/v1/telegram/webhook
///
/// Acknowledges right away and handles the message on a spawned task;
/// Telegram redelivers updates that are not answered with a 2xx in time.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> Result<Json<ApiResponse<WebhookResponse>>> {
    verify_secret(&headers, state.config.telegram_webhook_secret.as_deref())?;

    let Some((chat_id, text)) = update.text_message() else {
        tracing::debug!("Ignoring non-text Telegram update {}", update.update_id);
        return Ok(Json(ApiResponse::success(WebhookResponse { handled: false })));
    };

    let telegram = state.telegram.clone();
    if !state.config.telegram_chat_allowed(chat_id) {
        tracing::warn!(
            "Rejected Telegram update {} from chat {}: not in TELEGRAM_ALLOWED_CHAT_IDS",
            update.update_id,
            chat_id
        );
        tokio::spawn(async move {
            deliver_reply(telegram.as_ref(), chat_id, UNAUTHORIZED_CHAT_REPLY).await;
        });
        return Ok(Json(ApiResponse::success(WebhookResponse { handled: false })));
    }

    let agent = state.agent.clone();
    let session = session_key(chat_id);
    let text = text.to_string();
    tokio::spawn(async move {
        let reply = agent.handle_chat_message(&session, None, &text).await;
        deliver_reply(telegram.as_ref(), chat_id, &reply).await;
    });

    Ok(Json(ApiResponse::success(WebhookResponse { handled: true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::agent_service::tests::{agent_with, KeywordClassifier};
    use crate::services::agent_service::TradingAgent;
    use crate::services::confirm_gate::SessionState;
    use crate::services::executor::tests::RecordingWallet;
    use axum::http::HeaderValue;
    use std::sync::Arc;
    use tokio::time::{sleep, Duration, Instant};

    const ALLOWED_CHAT: i64 = 42;

    fn state_with(
        wallet: RecordingWallet,
    ) -> (AppState, Arc<TradingAgent>, Arc<RecordingWallet>, Arc<KeywordClassifier>) {
        let wallet = Arc::new(wallet);
        let (agent, classifier) = agent_with(Some(wallet.clone()));
        let agent = Arc::new(agent);
        let mut config = Config::for_tests();
        config.telegram_allowed_chat_ids = vec![ALLOWED_CHAT];
        let state = AppState {
            config,
            agent: agent.clone(),
            telegram: None,
        };
        (state, agent, wallet, classifier)
    }

    fn text_update(chat_id: i64, text: &str) -> TelegramUpdate {
        serde_json::from_value(serde_json::json!({
            "update_id": 7,
            "message": { "message_id": 1, "chat": { "id": chat_id }, "text": text }
        }))
        .expect("update")
    }

    #[tokio::test]
    async fn unknown_chat_never_reaches_the_agent() {
        let (state, agent, wallet, classifier) = state_with(RecordingWallet::default());

        for text in ["Swap 0.1 ETH to STRK", "confirm"] {
            let Json(response) =
                telegram_webhook(State(state.clone()), HeaderMap::new(), Json(text_update(999, text)))
                    .await
                    .expect("acknowledged");
            assert!(!response.data.handled);
        }
        sleep(Duration::from_millis(20)).await;

        assert!(classifier.prompts().is_empty());
        assert!(wallet.executed_entrypoints().is_empty());
        assert_eq!(agent.pending(&session_key(999)).await, SessionState::Idle);
    }

    #[tokio::test]
    async fn webhook_acknowledges_before_execution_finishes() {
        // Langkah pertama tertahan lebih lama dari batas tunggu executor
        let (state, agent, wallet, _) = state_with(RecordingWallet {
            stall_at: Some(0),
            ..Default::default()
        });
        let session = session_key(ALLOWED_CHAT);
        agent
            .handle_chat_message(&session, None, "Swap 0.1 ETH to STRK")
            .await;

        let started = Instant::now();
        let Json(response) = telegram_webhook(
            State(state),
            HeaderMap::new(),
            Json(text_update(ALLOWED_CHAT, "confirm")),
        )
        .await
        .expect("acknowledged");
        assert!(response.data.handled);
        assert!(started.elapsed() < Duration::from_millis(150));

        for _ in 0..50 {
            if !wallet.executed_entrypoints().is_empty() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(wallet.executed_entrypoints(), vec!["approve"]);
        assert_eq!(agent.pending(&session).await.name(), "executing");
    }

    #[test]
    fn session_key_uses_chat_prefix() {
        assert_eq!(session_key(-1001), "tg:-1001");
    }

    #[test]
    fn verify_secret_checks_header_when_configured() {
        let mut headers = HeaderMap::new();
        assert!(verify_secret(&headers, None).is_ok());
        assert!(verify_secret(&headers, Some("s3cret")).is_err());

        headers.insert(SECRET_TOKEN_HEADER, HeaderValue::from_static("wrong"));
        assert!(verify_secret(&headers, Some("s3cret")).is_err());

        headers.insert(SECRET_TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        assert!(verify_secret(&headers, Some("s3cret")).is_ok());
    }
}
