use crate::{
    error::{AppError, Result},
    integrations::brian::IntentClassifier,
    models::{ExecutionResult, IntentRequest},
    services::{
        confirm_gate::{
            is_confirmation, render_preview, render_result, ConfirmGate, PendingTransaction,
            SessionState,
        },
        executor::{SequentialExecutor, WalletSession},
        transaction_processor,
    },
};
use serde::Serialize;
use std::sync::Arc;

const HELP_TEXT: &str = "I turn plain requests into Starknet transactions.\n\n\
Try for example:\n\
  Swap 0.1 ETH to STRK\n\
  Transfer 10 USDC to 0x1234...\n\
  Deposit 100 STRK on Nostra\n\n\
I will show a preview first. Reply with \"confirm\" to execute it, or /cancel to drop it.\n\
Sending a new request replaces the pending one.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOutcome {
    pub pending: PendingTransaction,
    pub result: ExecutionResult,
}

/// Prompt -> preview -> confirm -> sequential execution, per session.
pub struct TradingAgent {
    classifier: Option<Arc<dyn IntentClassifier>>,
    gate: Arc<ConfirmGate>,
    executor: SequentialExecutor,
    wallet: Option<Arc<dyn WalletSession>>,
    default_address: Option<String>,
}

impl TradingAgent {
    pub fn new(
        classifier: Option<Arc<dyn IntentClassifier>>,
        gate: Arc<ConfirmGate>,
        executor: SequentialExecutor,
        wallet: Option<Arc<dyn WalletSession>>,
        default_address: Option<String>,
    ) -> Self {
        Self {
            classifier,
            gate,
            executor,
            wallet,
            default_address,
        }
    }

    pub fn classifier_configured(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn signer_configured(&self) -> bool {
        self.wallet.is_some()
    }

    /// Classifies `request` and stores the normalized plan as the session's
    /// pending transaction. Any earlier preview is dropped first, so a failed
    /// preview leaves the session idle.
    pub async fn preview(
        &self,
        session_id: &str,
        request: IntentRequest,
    ) -> Result<PendingTransaction> {
        self.gate.discard(session_id).await?;

        let classifier = self.classifier.as_ref().ok_or_else(|| {
            AppError::ExternalAPI("Intent classifier is not configured".to_string())
        })?;
        let raw = classifier.classify(&request).await?;
        let transaction = transaction_processor::process(&raw, &request)?;
        self.gate
            .preview(session_id, &request.address, transaction)
            .await
    }

    /// Executes the session's pending transaction.
    ///
    /// The pending transaction is left untouched when no signer is
    /// configured or when it was prepared for another account than the
    /// signer's. Execution runs on its own task so the session is
    /// released even if the caller goes away mid-flight.
    pub async fn confirm(
        &self,
        session_id: &str,
        transaction_id: Option<&str>,
    ) -> Result<ConfirmOutcome> {
        let wallet = self.wallet.clone().ok_or(AppError::SignerNotConfigured)?;
        let signer = wallet.address();
        let pending = self
            .gate
            .confirm(session_id, transaction_id, Some(&signer))
            .await?;

        let gate = self.gate.clone();
        let executor = self.executor;
        let session = session_id.to_string();
        let transaction_id = pending.id.clone();
        let transaction = pending.transaction.clone();
        let handle = tokio::spawn(async move {
            let result = executor.execute(&transaction, wallet.as_ref()).await;
            gate.complete(&session, &transaction_id).await;
            result
        });

        match handle.await {
            Ok(result) => Ok(ConfirmOutcome { pending, result }),
            Err(err) => {
                self.gate.complete(session_id, &pending.id).await;
                Err(AppError::Internal(format!("Execution task failed: {}", err)))
            }
        }
    }

    pub async fn cancel(&self, session_id: &str) -> Result<PendingTransaction> {
        self.gate.cancel(session_id).await
    }

    pub async fn pending(&self, session_id: &str) -> SessionState {
        self.gate.state(session_id).await
    }

    /// Routes one chat message and returns the reply text. Errors are
    /// rendered into the reply.
    pub async fn handle_chat_message(
        &self,
        session_id: &str,
        address: Option<&str>,
        text: &str,
    ) -> String {
        let text = text.trim();
        match command_name(text) {
            Some("start") | Some("help") => return HELP_TEXT.to_string(),
            Some("cancel") => return self.reply_cancel(session_id).await,
            _ => {}
        }

        if is_confirmation(text) {
            return self.reply_confirm(session_id).await;
        }

        let Some(address) = address.or(self.default_address.as_deref()) else {
            return "No wallet address is available for this chat. Configure the bot signer first."
                .to_string();
        };
        let request = IntentRequest {
            prompt: text.to_string(),
            address: address.to_string(),
            chain_id: None,
        };
        match self.preview(session_id, request).await {
            Ok(pending) => render_preview(&pending.transaction),
            Err(err) => {
                tracing::info!("Preview failed for session={}: {}", session_id, err);
                format!("Could not prepare a transaction: {}", err)
            }
        }
    }

    async fn reply_confirm(&self, session_id: &str) -> String {
        match self.confirm(session_id, None).await {
            Ok(outcome) => render_result(&outcome.pending.transaction, &outcome.result),
            Err(AppError::NoPendingTransaction) => {
                "There is no pending transaction to confirm. Describe what you want to do first."
                    .to_string()
            }
            Err(AppError::ExecutionInProgress) => {
                "A transaction is already executing for this chat. Please wait.".to_string()
            }
            Err(AppError::SignerMismatch { .. }) => {
                "This transaction was prepared for a different wallet than the bot signer. Send a new request."
                    .to_string()
            }
            Err(err) => format!("Could not execute the transaction: {}", err),
        }
    }

    async fn reply_cancel(&self, session_id: &str) -> String {
        match self.cancel(session_id).await {
            Ok(pending) => format!("Cancelled: {}", pending.transaction.description),
            Err(AppError::NoPendingTransaction) => "Nothing to cancel.".to_string(),
            Err(err) => format!("Could not cancel: {}", err),
        }
    }
}

// Internal helper that extracts the name of a `/command@bot` message.
fn command_name(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    Some(command.split('@').next().unwrap_or(command))
}
