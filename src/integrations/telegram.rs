use crate::{
    config::Config,
    error::{AppError, Result},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Subset of the Telegram `Update` object the bot reacts to.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramUpdate {
    /// Chat id and text for plain text messages; other updates are ignored.
    pub fn text_message(&self) -> Option<(i64, &str)> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?.trim();
        if text.is_empty() {
            return None;
        }
        Some((message.chat.id, text))
    }
}

#[derive(Clone, Debug)]
pub struct TelegramClient {
    api_url: String,
    bot_token: String,
    client: Client,
}

impl TelegramClient {
    pub fn new(api_url: String, bot_token: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Internal(format!("Telegram HTTP client init failed: {}", e)))?;
        Ok(Self {
            api_url,
            bot_token,
            client,
        })
    }

    /// Returns `Ok(None)` when `TELEGRAM_BOT_TOKEN` is not set.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        match &config.telegram_bot_token {
            Some(token) => Self::new(config.telegram_api_url.clone(), token.clone()).map(Some),
            None => Ok(None),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_url.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessageRequest {
                chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("Telegram sendMessage failed: {}", e)))?;

        let status = response.status();
        let body: TelegramApiResponse = response.json().await.map_err(|e| {
            AppError::ExternalAPI(format!("Telegram sendMessage parse failed: {}", e))
        })?;
        if !status.is_success() || !body.ok {
            return Err(AppError::ExternalAPI(format!(
                "Telegram sendMessage rejected ({}): {}",
                status,
                body.description.unwrap_or_default()
            )));
        }
        Ok(())
    }
}
