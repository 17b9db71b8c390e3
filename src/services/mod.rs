// All service modules
pub mod agent_service;
pub mod confirm_gate;
pub mod executor;
pub mod onchain;
pub mod transaction_processor;

// Re-export for convenience
pub use agent_service::TradingAgent;
pub use confirm_gate::ConfirmGate;
pub use executor::{SequentialExecutor, WalletSession};
pub use onchain::StarknetAccountSession;

use crate::constants::PENDING_SWEEP_INTERVAL_SECS;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Start all background services
pub async fn start_background_services(gate: Arc<ConfirmGate>) {
    tracing::info!("Starting background services...");

    let mut ticker = interval(Duration::from_secs(PENDING_SWEEP_INTERVAL_SECS));
    loop {
        ticker.tick().await;
        let purged = gate.purge_expired().await;
        if purged > 0 {
            tracing::info!("Purged {} expired pending transaction(s)", purged);
        }
    }
}
