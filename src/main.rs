use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod error;
mod integrations;
mod models;
mod services;

use config::Config;
use constants::API_VERSION;
use integrations::{BrianClient, IntentClassifier, TelegramClient};
use services::{
    ConfirmGate, SequentialExecutor, StarknetAccountSession, TradingAgent, WalletSession,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "starkfinder_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting StarkFinder Backend Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);
    if config.is_testnet() {
        tracing::info!("Running against testnet chain {}", config.starknet_chain_id);
    }

    let classifier = BrianClient::from_config(&config)?
        .map(|client| Arc::new(client) as Arc<dyn IntentClassifier>);
    let wallet = StarknetAccountSession::from_config(&config)?
        .map(|session| Arc::new(session) as Arc<dyn WalletSession>);
    let telegram = TelegramClient::from_config(&config)?;

    let gate = Arc::new(ConfirmGate::new(config.pending_tx_ttl_seconds));
    let executor = SequentialExecutor::new(std::time::Duration::from_secs(
        config.tx_wait_timeout_secs,
    ));
    let agent = Arc::new(TradingAgent::new(
        classifier,
        gate.clone(),
        executor,
        wallet,
        config.backend_account_address.clone(),
    ));

    let app_state = api::AppState {
        config: config.clone(),
        agent,
        telegram,
    };

    // Build router
    let app = build_router(app_state);

    // Start background services
    tokio::spawn(services::start_background_services(gate));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Transaction preview / confirm
        .route(
            "/api/v1/transactions/preview",
            post(api::transactions::preview_transaction),
        )
        .route(
            "/api/v1/transactions/confirm",
            post(api::transactions::confirm_transaction),
        )
        .route(
            "/api/v1/transactions/cancel",
            post(api::transactions::cancel_transaction),
        )
        .route(
            "/api/v1/transactions/pending",
            get(api::transactions::get_pending_transaction),
        )
        // Telegram bot
        .route(
            "/api/v1/telegram/webhook",
            post(api::telegram::telegram_webhook),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
