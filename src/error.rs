use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Transaction plan has no steps")]
    EmptyTransaction,

    /// `index` is the position in the classifier's `data.steps`, before
    /// nested `approve`/`transactionData` calls are flattened.
    #[error("Malformed step {index}: {reason}")]
    MalformedStep { index: usize, reason: String },

    #[error("No pending transaction for this session")]
    NoPendingTransaction,

    #[error("Confirmation does not match the pending transaction: {0}")]
    StaleConfirmation(String),

    #[error("A transaction is already executing for this session")]
    ExecutionInProgress,

    #[error("Transaction signer is not configured")]
    SignerNotConfigured,

    #[error("Transaction was prepared for {planned} but the signer is {signer}")]
    SignerMismatch { planned: String, signer: String },

    #[error("Blockchain RPC error: {0}")]
    BlockchainRPC(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("External API error: {0}")]
    ExternalAPI(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::UnsupportedAction(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNSUPPORTED_ACTION")
            }
            AppError::EmptyTransaction => (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_TRANSACTION"),
            AppError::MalformedStep { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "MALFORMED_STEP")
            }
            AppError::NoPendingTransaction => (StatusCode::NOT_FOUND, "NO_PENDING_TRANSACTION"),
            AppError::StaleConfirmation(_) => (StatusCode::CONFLICT, "STALE_CONFIRMATION"),
            AppError::ExecutionInProgress => (StatusCode::CONFLICT, "EXECUTION_IN_PROGRESS"),
            AppError::SignerNotConfigured => {
                (StatusCode::SERVICE_UNAVAILABLE, "SIGNER_NOT_CONFIGURED")
            }
            AppError::SignerMismatch { .. } => (StatusCode::FORBIDDEN, "SIGNER_MISMATCH"),
            AppError::AuthError(_) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::ExternalAPI(_) => (StatusCode::BAD_GATEWAY, "EXTERNAL_API_ERROR"),
            AppError::BlockchainRPC(_) => (StatusCode::BAD_GATEWAY, "BLOCKCHAIN_RPC_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let details = match &self {
            AppError::MalformedStep { index, .. } => {
                Some(serde_json::json!({ "stepIndex": index }))
            }
            _ => None,
        };
        if status.is_server_error() {
            tracing::error!("{} ({})", self, code);
        }

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
