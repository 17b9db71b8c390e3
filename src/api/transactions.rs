use super::{require_session_id, AppState};
use crate::{
    error::Result,
    models::{ApiResponse, ExecutionResult, IntentRequest, ProcessedTransaction},
    services::confirm_gate::{render_preview, render_result, SessionState},
};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub session_id: String,
    pub prompt: String,
    pub address: String,
    #[serde(default)]
    pub chain_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub transaction_id: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub transaction: ProcessedTransaction,
    pub preview: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub session_id: String,
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub transaction_id: String,
    pub result: ExecutionResult,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub transaction_id: String,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResponse {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<ProcessedTransaction>,
}

impl From<SessionState> for PendingResponse {
    fn from(state: SessionState) -> Self {
        let name = state.name().to_string();
        match state {
            SessionState::Idle => Self {
                state: name,
                transaction_id: None,
                expires_at: None,
                transaction: None,
            },
            SessionState::Previewing(pending) => Self {
                state: name,
                transaction_id: Some(pending.id),
                expires_at: Some(pending.expires_at),
                transaction: Some(pending.transaction),
            },
            SessionState::Executing { transaction_id } => Self {
                state: name,
                transaction_id: Some(transaction_id),
                expires_at: None,
                transaction: None,
            },
        }
    }
}

/// POST /api/v1/transactions/preview
pub async fn preview_transaction(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<ApiResponse<PreviewResponse>>> {
    let session_id = require_session_id(&req.session_id)?.to_string();
    if req.prompt.trim().is_empty() {
        return Err(crate::error::AppError::BadRequest(
            "prompt is required".to_string(),
        ));
    }
    if req.address.trim().is_empty() {
        return Err(crate::error::AppError::BadRequest(
            "address is required".to_string(),
        ));
    }

    let request = IntentRequest {
        prompt: req.prompt.trim().to_string(),
        address: req.address.trim().to_string(),
        chain_id: req.chain_id,
    };
    let pending = state.agent.preview(&session_id, request).await?;
    let preview = render_preview(&pending.transaction);

    Ok(Json(ApiResponse::success(PreviewResponse {
        transaction_id: pending.id,
        session_id,
        expires_at: pending.expires_at,
        transaction: pending.transaction,
        preview,
    })))
}

/// POST /api/v1/transactions/confirm
pub async fn confirm_transaction(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ApiResponse<ConfirmResponse>>> {
    let session_id = require_session_id(&req.session_id)?;
    let transaction_id = req.transaction_id.trim();
    if transaction_id.is_empty() {
        return Err(crate::error::AppError::BadRequest(
            "transactionId is required".to_string(),
        ));
    }

    let outcome = state
        .agent
        .confirm(session_id, Some(transaction_id))
        .await?;
    let message = render_result(&outcome.pending.transaction, &outcome.result);

    Ok(Json(ApiResponse::success(ConfirmResponse {
        transaction_id: outcome.pending.id,
        result: outcome.result,
        message,
    })))
}

/// POST /api/v1/transactions/cancel
pub async fn cancel_transaction(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<ApiResponse<CancelResponse>>> {
    let session_id = require_session_id(&req.session_id)?;
    let pending = state.agent.cancel(session_id).await?;
    Ok(Json(ApiResponse::success(CancelResponse {
        transaction_id: pending.id,
        cancelled: true,
    })))
}

/// GET /api/v1/transactions/pending?sessionId=
pub async fn get_pending_transaction(
    State(state): State<AppState>,
    Query(query): Query<SessionRequest>,
) -> Result<Json<ApiResponse<PendingResponse>>> {
    let session_id = require_session_id(&query.session_id)?;
    let current = state.agent.pending(session_id).await;
    Ok(Json(ApiResponse::success(current.into())))
}
