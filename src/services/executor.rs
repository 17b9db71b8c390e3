use crate::models::{CallStep, ExecutionResult, FailureKind, ProcessedTransaction};
use thiserror::Error;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("submission failed: {0}")]
    Submission(String),

    #[error("transaction {hash} reverted: {reason}")]
    Reverted { hash: String, reason: String },

    #[error("timed out waiting for transaction {hash}")]
    Timeout { hash: String },

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl WalletError {
    pub fn kind(&self) -> FailureKind {
        match self {
            WalletError::Submission(_) => FailureKind::Submission,
            WalletError::Reverted { .. } => FailureKind::Reverted,
            WalletError::Timeout { .. } => FailureKind::Timeout,
            WalletError::Rpc(_) => FailureKind::Rpc,
        }
    }
}

/// Signing account the executor submits calls through.
#[async_trait::async_trait]
pub trait WalletSession: Send + Sync {
    /// Submits a single call and returns its transaction hash.
    async fn execute(&self, call: &CallStep) -> Result<String, WalletError>;

    /// Resolves once `transaction_hash` is final; errors on revert.
    async fn wait_for_transaction(&self, transaction_hash: &str) -> Result<(), WalletError>;

    /// Account address that signs the submitted calls.
    fn address(&self) -> String;
}

/// Runs the calls of a `ProcessedTransaction` strictly one after another.
///
/// Each call is submitted and then awaited to finality before the next one
/// starts. The first failure stops the run; nothing is retried.
#[derive(Debug, Clone, Copy)]
pub struct SequentialExecutor {
    wait_timeout: Duration,
}

impl SequentialExecutor {
    pub fn new(wait_timeout: Duration) -> Self {
        Self { wait_timeout }
    }

    pub async fn execute(
        &self,
        transaction: &ProcessedTransaction,
        wallet: &dyn WalletSession,
    ) -> ExecutionResult {
        let total = transaction.transactions.len();
        let mut completed: Vec<String> = Vec::with_capacity(total);

        for (step, call) in transaction.transactions.iter().enumerate() {
            tracing::info!(
                "Executing step {}/{}: {} on {}",
                step + 1,
                total,
                call.entrypoint,
                call.contract_address
            );

            let outcome = self.run_step(call, wallet).await;
            match outcome {
                Ok(hash) => {
                    tracing::info!("Step {}/{} finalized: tx={}", step + 1, total, hash);
                    completed.push(hash);
                }
                Err(err) => {
                    tracing::warn!(
                        "Step {}/{} failed ({:?}): {}; {} step(s) already finalized",
                        step + 1,
                        total,
                        err.kind(),
                        err,
                        completed.len()
                    );
                    return ExecutionResult::failed(step, err.kind(), err.to_string(), completed);
                }
            }
        }

        ExecutionResult::succeeded(completed)
    }

    async fn run_step(
        &self,
        call: &CallStep,
        wallet: &dyn WalletSession,
    ) -> Result<String, WalletError> {
        let hash = wallet.execute(call).await?;
        match timeout(self.wait_timeout, wallet.wait_for_transaction(&hash)).await {
            Ok(Ok(())) => Ok(hash),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(WalletError::Timeout { hash }),
        }
    }
}
