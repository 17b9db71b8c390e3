use crate::constants::{
    DEFAULT_BRIAN_API_URL, DEFAULT_BRIAN_CHAIN_ID, DEFAULT_BRIAN_TIMEOUT_SECS,
    DEFAULT_PENDING_TX_TTL_SECONDS, DEFAULT_TELEGRAM_API_URL, DEFAULT_TX_POLL_ATTEMPTS,
    DEFAULT_TX_POLL_INTERVAL_MS, DEFAULT_TX_WAIT_TIMEOUT_SECS,
};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Blockchain
    pub starknet_rpc_url: String,
    pub starknet_chain_id: String,

    // Transaction signer (bot-managed keypair)
    pub backend_account_address: Option<String>,
    pub backend_private_key: Option<String>,

    // Intent classifier
    pub brian_api_url: String,
    pub brian_api_key: Option<String>,
    pub brian_chain_id: String,
    pub brian_timeout_secs: u64,

    // Telegram bot
    pub telegram_bot_token: Option<String>,
    pub telegram_webhook_secret: Option<String>,
    pub telegram_api_url: String,
    /// Chats allowed to drive the bot signer. Empty means none.
    pub telegram_allowed_chat_ids: Vec<i64>,

    // Confirm gate / execution
    pub pending_tx_ttl_seconds: u64,
    pub tx_poll_attempts: usize,
    pub tx_poll_interval_ms: u64,
    pub tx_wait_timeout_secs: u64,

    // CORS
    pub cors_allowed_origins: String,
}

// Internal helper that reads optional, non-blank env values.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// Internal helper that parses positive numeric env values with a default.
fn positive_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_var(name) {
        None => Ok(default),
        Some(raw) => {
            let value: T = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("{} is not a valid number: {}", name, e))?;
            if value <= T::default() {
                anyhow::bail!("{} must be greater than zero", name);
            }
            Ok(value)
        }
    }
}

// Internal helper that parses a comma-separated list of Telegram chat ids.
fn parse_chat_ids(name: &str, raw: &str) -> anyhow::Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<i64>()
                .map_err(|e| anyhow::anyhow!("{} has an invalid chat id '{}': {}", name, item, e))
        })
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            starknet_rpc_url: env::var("STARKNET_RPC_URL")?,
            starknet_chain_id: env::var("STARKNET_CHAIN_ID")
                .unwrap_or_else(|_| "SN_MAIN".to_string()),

            backend_account_address: optional_var("BACKEND_ACCOUNT_ADDRESS"),
            backend_private_key: optional_var("BACKEND_PRIVATE_KEY"),

            brian_api_url: optional_var("BRIAN_API_URL")
                .unwrap_or_else(|| DEFAULT_BRIAN_API_URL.to_string()),
            brian_api_key: optional_var("BRIAN_API_KEY"),
            brian_chain_id: optional_var("BRIAN_CHAIN_ID")
                .unwrap_or_else(|| DEFAULT_BRIAN_CHAIN_ID.to_string()),
            brian_timeout_secs: positive_var("BRIAN_TIMEOUT_SECS", DEFAULT_BRIAN_TIMEOUT_SECS)?,

            telegram_bot_token: optional_var("TELEGRAM_BOT_TOKEN"),
            telegram_webhook_secret: optional_var("TELEGRAM_WEBHOOK_SECRET"),
            telegram_api_url: optional_var("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            telegram_allowed_chat_ids: match optional_var("TELEGRAM_ALLOWED_CHAT_IDS") {
                Some(raw) => parse_chat_ids("TELEGRAM_ALLOWED_CHAT_IDS", &raw)?,
                None => Vec::new(),
            },

            pending_tx_ttl_seconds: positive_var(
                "PENDING_TX_TTL_SECONDS",
                DEFAULT_PENDING_TX_TTL_SECONDS,
            )?,
            tx_poll_attempts: positive_var("TX_POLL_ATTEMPTS", DEFAULT_TX_POLL_ATTEMPTS)?,
            tx_poll_interval_ms: positive_var("TX_POLL_INTERVAL_MS", DEFAULT_TX_POLL_INTERVAL_MS)?,
            tx_wait_timeout_secs: positive_var(
                "TX_WAIT_TIMEOUT_SECS",
                DEFAULT_TX_WAIT_TIMEOUT_SECS,
            )?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.starknet_rpc_url.trim().is_empty() {
            anyhow::bail!("STARKNET_RPC_URL is empty");
        }
        if self.backend_account_address.is_some() != self.backend_private_key.is_some() {
            anyhow::bail!(
                "BACKEND_ACCOUNT_ADDRESS and BACKEND_PRIVATE_KEY must be set together"
            );
        }

        if !self.signer_configured() {
            tracing::warn!("No backend signer configured; confirmations will be rejected");
        }
        if self.brian_api_key.is_none() {
            tracing::warn!("BRIAN_API_KEY is not set; transaction previews will fail");
        }
        if self.telegram_bot_token.is_some() && self.telegram_webhook_secret.is_none() {
            tracing::warn!("TELEGRAM_WEBHOOK_SECRET is not set; webhook accepts any caller");
        }
        if self.telegram_bot_token.is_some() && self.telegram_allowed_chat_ids.is_empty() {
            tracing::warn!("TELEGRAM_ALLOWED_CHAT_IDS is empty; the bot will refuse every chat");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn signer_configured(&self) -> bool {
        self.backend_account_address.is_some() && self.backend_private_key.is_some()
    }

    pub fn telegram_chat_allowed(&self, chat_id: i64) -> bool {
        self.telegram_allowed_chat_ids.contains(&chat_id)
    }

    pub fn is_testnet(&self) -> bool {
        if self.environment == "development" || self.environment == "testnet" {
            return true;
        }
        let chain = self.starknet_chain_id.to_ascii_uppercase();
        chain.contains("SEPOLIA") || chain.contains("GOERLI")
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: "test".to_string(),
            starknet_rpc_url: "http://localhost:5050".to_string(),
            starknet_chain_id: "SN_SEPOLIA".to_string(),
            backend_account_address: None,
            backend_private_key: None,
            brian_api_url: DEFAULT_BRIAN_API_URL.to_string(),
            brian_api_key: None,
            brian_chain_id: DEFAULT_BRIAN_CHAIN_ID.to_string(),
            brian_timeout_secs: DEFAULT_BRIAN_TIMEOUT_SECS,
            telegram_bot_token: None,
            telegram_webhook_secret: None,
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            telegram_allowed_chat_ids: Vec::new(),
            pending_tx_ttl_seconds: DEFAULT_PENDING_TX_TTL_SECONDS,
            tx_poll_attempts: DEFAULT_TX_POLL_ATTEMPTS,
            tx_poll_interval_ms: DEFAULT_TX_POLL_INTERVAL_MS,
            tx_wait_timeout_secs: DEFAULT_TX_WAIT_TIMEOUT_SECS,
            cors_allowed_origins: "*".to_string(),
        }
    }
}
