/// Application constants

pub const API_VERSION: &str = "v1";

// Intent classifier (Brian AI)
pub const DEFAULT_BRIAN_API_URL: &str = "https://api.brianknows.org/api/v0/agent";
pub const DEFAULT_BRIAN_CHAIN_ID: &str = "4012"; // Starknet
pub const DEFAULT_BRIAN_TIMEOUT_SECS: u64 = 30;

// Telegram
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const TELEGRAM_SESSION_PREFIX: &str = "tg:";

// Confirm gate
pub const CONFIRM_KEYWORD: &str = "confirm";
pub const DEFAULT_PENDING_TX_TTL_SECONDS: u64 = 600;
pub const PENDING_SWEEP_INTERVAL_SECS: u64 = 60;

// Execution / finality wait
pub const DEFAULT_TX_POLL_ATTEMPTS: usize = 20;
pub const DEFAULT_TX_POLL_INTERVAL_MS: u64 = 1_500;
pub const DEFAULT_TX_WAIT_TIMEOUT_SECS: u64 = 120;
