// src/models/mod.rs
pub mod transaction;

pub use transaction::{
    CallStep,
    ExecutionResult,
    ExtractedParams,
    FailureKind,
    IntentRequest,
    ProcessedTransaction,
    RawIntentData,
    RawIntentResponse,
    RawStep,
    TokenRef,
    TransactionAction,
};

use serde::Serialize;

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
