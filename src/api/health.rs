use axum::{extract::State, Json};
use serde::Serialize;
use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub signer: String,
    pub classifier: String,
    pub telegram: String,
}

fn configured(flag: bool) -> String {
    if flag {
        "configured".to_string()
    } else {
        "missing".to_string()
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        signer: configured(state.agent.signer_configured()),
        classifier: configured(state.agent.classifier_configured()),
        telegram: configured(state.telegram.is_some()),
    })
}
