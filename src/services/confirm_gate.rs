use crate::{
    constants::CONFIRM_KEYWORD,
    error::{AppError, Result},
    models::{ExecutionResult, FailureKind, ProcessedTransaction},
    services::onchain::same_address,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub id: String,
    pub session_id: String,
    /// Account the plan was built for; only that account may execute it.
    pub address: String,
    pub transaction: ProcessedTransaction,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Previewing(PendingTransaction),
    Executing { transaction_id: String },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Previewing(_) => "previewing",
            SessionState::Executing { .. } => "executing",
        }
    }
}

/// Session-keyed preview/confirm state machine.
///
/// `Idle -> Previewing -> Executing -> Idle`, with `Previewing -> Idle` on
/// cancel or when a new prompt replaces the preview. A session holds at most
/// one pending transaction, and `confirm` hands it out at most once.
pub struct ConfirmGate {
    sessions: RwLock<HashMap<String, SessionState>>,
    ttl: Duration,
}

impl ConfirmGate {
    pub fn new(ttl_seconds: u64) -> Self {
        let ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::days(365));
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn state(&self, session_id: &str) -> SessionState {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(SessionState::Previewing(pending)) if is_expired(pending, Utc::now()) => {
                SessionState::Idle
            }
            Some(state) => state.clone(),
            None => SessionState::Idle,
        }
    }

    /// Stores `transaction` as the session's only pending transaction,
    /// discarding whatever preview was there before.
    pub async fn preview(
        &self,
        session_id: &str,
        address: &str,
        transaction: ProcessedTransaction,
    ) -> Result<PendingTransaction> {
        let mut sessions = self.sessions.write().await;
        if let Some(SessionState::Executing { .. }) = sessions.get(session_id) {
            return Err(AppError::ExecutionInProgress);
        }

        let now = Utc::now();
        let pending = PendingTransaction {
            id: new_transaction_id(),
            session_id: session_id.to_string(),
            address: address.trim().to_string(),
            transaction,
            created_at: now,
            expires_at: now + self.ttl,
        };
        let previous = sessions.insert(
            session_id.to_string(),
            SessionState::Previewing(pending.clone()),
        );
        if let Some(SessionState::Previewing(old)) = previous {
            tracing::info!(
                "Pending transaction replaced: session={} old={} new={}",
                session_id,
                old.id,
                pending.id
            );
        } else {
            tracing::info!(
                "Pending transaction created: session={} id={} steps={}",
                session_id,
                pending.id,
                pending.transaction.transactions.len()
            );
        }
        Ok(pending)
    }

    /// Drops the pending preview, if any. A session that is executing is
    /// left untouched.
    pub async fn discard(&self, session_id: &str) -> Result<Option<PendingTransaction>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session_id) {
            Some(SessionState::Executing { .. }) => return Err(AppError::ExecutionInProgress),
            Some(SessionState::Previewing(_)) => {}
            _ => return Ok(None),
        }

        match sessions.remove(session_id) {
            Some(SessionState::Previewing(pending)) => {
                tracing::info!(
                    "Pending transaction discarded: session={} id={}",
                    session_id,
                    pending.id
                );
                Ok(Some(pending))
            }
            _ => Ok(None),
        }
    }

    /// Moves the session from `Previewing` to `Executing` and returns the
    /// pending transaction. When `transaction_id` is given it must name the
    /// current preview. When `signer` is given it must be the account the
    /// preview was built for; a mismatch leaves the preview in place.
    pub async fn confirm(
        &self,
        session_id: &str,
        transaction_id: Option<&str>,
        signer: Option<&str>,
    ) -> Result<PendingTransaction> {
        let mut sessions = self.sessions.write().await;
        let pending = match sessions.get(session_id) {
            None | Some(SessionState::Idle) => return Err(AppError::NoPendingTransaction),
            Some(SessionState::Executing { .. }) => return Err(AppError::ExecutionInProgress),
            Some(SessionState::Previewing(pending)) => pending,
        };

        if is_expired(pending, Utc::now()) {
            tracing::info!(
                "Pending transaction expired before confirm: session={} id={}",
                session_id,
                pending.id
            );
            sessions.remove(session_id);
            return Err(AppError::NoPendingTransaction);
        }
        if let Some(requested) = transaction_id {
            if requested != pending.id {
                tracing::warn!(
                    "Stale confirmation rejected: session={} requested={} pending={}",
                    session_id,
                    requested,
                    pending.id
                );
                return Err(AppError::StaleConfirmation(requested.to_string()));
            }
        }
        if let Some(signer) = signer {
            if !same_address(&pending.address, signer) {
                tracing::warn!(
                    "Confirmation rejected: session={} id={} planned_for={} signer={}",
                    session_id,
                    pending.id,
                    pending.address,
                    signer
                );
                return Err(AppError::SignerMismatch {
                    planned: pending.address.clone(),
                    signer: signer.to_string(),
                });
            }
        }

        let pending = pending.clone();
        sessions.insert(
            session_id.to_string(),
            SessionState::Executing {
                transaction_id: pending.id.clone(),
            },
        );
        tracing::info!(
            "Pending transaction confirmed: session={} id={}",
            session_id,
            pending.id
        );
        Ok(pending)
    }

    /// Returns the session to `Idle` once execution of `transaction_id`
    /// finished, whatever its outcome.
    pub async fn complete(&self, session_id: &str, transaction_id: &str) {
        let mut sessions = self.sessions.write().await;
        let matches = matches!(
            sessions.get(session_id),
            Some(SessionState::Executing { transaction_id: current }) if current == transaction_id
        );
        if matches {
            sessions.remove(session_id);
        } else {
            tracing::warn!(
                "Completion ignored: session={} id={} is not executing",
                session_id,
                transaction_id
            );
        }
    }

    pub async fn cancel(&self, session_id: &str) -> Result<PendingTransaction> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session_id) {
            Some(SessionState::Executing { .. }) => return Err(AppError::ExecutionInProgress),
            Some(SessionState::Previewing(_)) => {}
            _ => return Err(AppError::NoPendingTransaction),
        }

        match sessions.remove(session_id) {
            Some(SessionState::Previewing(pending)) if !is_expired(&pending, Utc::now()) => {
                tracing::info!(
                    "Pending transaction cancelled: session={} id={}",
                    session_id,
                    pending.id
                );
                Ok(pending)
            }
            _ => Err(AppError::NoPendingTransaction),
        }
    }

    /// Removes expired previews and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, state| match state {
            SessionState::Previewing(pending) => !is_expired(pending, now),
            _ => true,
        });
        before - sessions.len()
    }
}

fn is_expired(pending: &PendingTransaction, now: DateTime<Utc>) -> bool {
    now >= pending.expires_at
}

fn new_transaction_id() -> String {
    format!("tx_{:016x}", rand::random::<u64>())
}

/// True when a chat message is the confirmation token.
pub fn is_confirmation(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(CONFIRM_KEYWORD)
}

pub fn render_preview(transaction: &ProcessedTransaction) -> String {
    let mut lines = vec![
        "Transaction Preview:".to_string(),
        format!("Type: {}", transaction.action.label()),
        format!("Description: {}", transaction.description),
    ];
    if let Some(token) = &transaction.from_token {
        lines.push(format!(
            "From: {} {}",
            transaction.from_amount.as_deref().unwrap_or("?"),
            token.symbol
        ));
    }
    if let Some(token) = &transaction.to_token {
        lines.push(format!(
            "To: {} {}",
            transaction.to_amount.as_deref().unwrap_or("?"),
            token.symbol
        ));
    }
    if let Some(receiver) = &transaction.receiver {
        lines.push(format!("Receiver: {}", receiver));
    }
    if let Some(protocol) = &transaction.protocol {
        lines.push(format!("Protocol: {}", protocol));
    }
    lines.push(format!(
        "Estimated Gas: {} USD",
        transaction.estimated_gas.as_deref().unwrap_or("Unknown")
    ));
    lines.push(format!("Steps ({}):", transaction.transactions.len()));
    for (index, call) in transaction.transactions.iter().enumerate() {
        lines.push(format!(
            "  {}. {} on {}",
            index + 1,
            call.entrypoint,
            call.contract_address
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "Reply with \"{}\" to execute this transaction.",
        CONFIRM_KEYWORD
    ));
    lines.join("\n")
}

pub fn render_result(transaction: &ProcessedTransaction, result: &ExecutionResult) -> String {
    if result.success {
        return format!(
            "Transaction executed: {}\nHash: {}",
            transaction.description,
            result.transaction_hash.as_deref().unwrap_or("unknown")
        );
    }

    let step = result.failed_at_step.unwrap_or(0);
    let total = transaction.transactions.len();
    let reason = match result.failure {
        Some(FailureKind::Timeout) => "timed out waiting for confirmation",
        Some(FailureKind::Reverted) => "reverted on-chain",
        Some(FailureKind::Submission) => "was rejected before submission",
        Some(FailureKind::Rpc) => "could not be tracked on Starknet RPC",
        None => "failed",
    };
    let mut message = format!(
        "Transaction failed at step {} of {}: step {}.\nError: {}",
        step + 1,
        total,
        reason,
        result.error.as_deref().unwrap_or("unknown error")
    );
    if !result.completed_hashes.is_empty() {
        message.push_str(&format!(
            "\n{} earlier step(s) already finalized on-chain and were not rolled back: {}",
            result.completed_hashes.len(),
            result.completed_hashes.join(", ")
        ));
    }
    message
}
