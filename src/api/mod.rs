pub mod health;
pub mod telegram;
pub mod transactions;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::integrations::TelegramClient;
use crate::services::agent_service::TradingAgent;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub agent: Arc<TradingAgent>,
    pub telegram: Option<TelegramClient>,
}

// Internal helper that validates a client-supplied session id.
pub(crate) fn require_session_id(session_id: &str) -> Result<&str> {
    let trimmed = session_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("sessionId is required".to_string()));
    }
    if trimmed.len() > 128 {
        return Err(AppError::BadRequest("sessionId is too long".to_string()));
    }
    if trimmed.starts_with(crate::constants::TELEGRAM_SESSION_PREFIX) {
        return Err(AppError::BadRequest(
            "sessionId uses a reserved prefix".to_string(),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_session_id_rejects_blank_and_reserved() {
        assert_eq!(require_session_id("  web-1 ").expect("valid"), "web-1");
        assert!(require_session_id("   ").is_err());
        assert!(require_session_id("tg:42").is_err());
        assert!(require_session_id(&"x".repeat(129)).is_err());
    }
}
