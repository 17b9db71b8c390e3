use crate::{
    config::Config,
    error::{AppError, Result},
    models::CallStep,
    services::executor::{WalletError, WalletSession},
};
use starknet_accounts::{Account, ConnectedAccount, ExecutionEncoding, SingleOwnerAccount};
use starknet_core::types::{
    BlockId, BlockTag, Call, ExecutionResult, Felt, TransactionFinalityStatus,
};
use starknet_core::utils::get_selector_from_name;
use starknet_providers::jsonrpc::{HttpTransport, JsonRpcClient};
use starknet_providers::Provider;
use starknet_signers::{LocalWallet, SigningKey};
use tokio::time::{sleep, Duration};
use url::Url;

/// Backend-held Starknet account used to sign and submit confirmed calls.
pub struct StarknetAccountSession {
    account: SingleOwnerAccount<JsonRpcClient<HttpTransport>, LocalWallet>,
    poll_attempts: usize,
    poll_interval: Duration,
}

impl StarknetAccountSession {
    /// Returns `Ok(None)` when no signer keypair is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let (Some(account_address), Some(private_key)) = (
            config.backend_account_address.as_deref(),
            config.backend_private_key.as_deref(),
        ) else {
            return Ok(None);
        };

        let rpc_url = Url::parse(&config.starknet_rpc_url)
            .map_err(|e| AppError::BlockchainRPC(format!("Invalid RPC URL: {}", e)))?;
        let provider = JsonRpcClient::new(HttpTransport::new(rpc_url));

        let private_key = parse_felt(private_key)?;
        let signer = LocalWallet::from_signing_key(SigningKey::from_secret_scalar(private_key));

        let account_address = parse_felt(account_address)?;
        let chain_id = parse_chain_id(&config.starknet_chain_id)?;

        let mut account = SingleOwnerAccount::new(
            provider,
            signer,
            account_address,
            chain_id,
            ExecutionEncoding::New,
        );
        // Some public RPC providers don't support "pre_confirmed" yet.
        account.set_block_id(BlockId::Tag(BlockTag::Latest));

        tracing::info!(
            "Starknet signer ready: account={:#x} chain={}",
            account_address,
            config.starknet_chain_id
        );

        Ok(Some(Self {
            account,
            poll_attempts: config.tx_poll_attempts.max(1),
            poll_interval: Duration::from_millis(config.tx_poll_interval_ms),
        }))
    }
}

#[async_trait::async_trait]
impl WalletSession for StarknetAccountSession {
    async fn execute(&self, step: &CallStep) -> std::result::Result<String, WalletError> {
        let call = call_from_step(step).map_err(|e| WalletError::Submission(e.to_string()))?;
        let result = self
            .account
            .execute_v3(vec![call])
            .send()
            .await
            .map_err(|e| WalletError::Submission(e.to_string()))?;
        Ok(format!("{:#x}", result.transaction_hash))
    }

    async fn wait_for_transaction(
        &self,
        transaction_hash: &str,
    ) -> std::result::Result<(), WalletError> {
        let tx_hash =
            parse_felt(transaction_hash).map_err(|e| WalletError::Rpc(e.to_string()))?;
        let mut last_error = String::new();
        let mut receipt_seen = false;

        for attempt in 0..self.poll_attempts {
            match self.account.provider().get_transaction_receipt(&tx_hash).await {
                Ok(receipt) => {
                    receipt_seen = true;
                    if let Some(outcome) = receipt_outcome(
                        transaction_hash,
                        receipt.receipt.execution_result(),
                        receipt.receipt.finality_status(),
                    ) {
                        return outcome;
                    }
                    last_error = "transaction still pre-confirmed".to_string();
                }
                Err(err) => {
                    last_error = err.to_string();
                }
            }
            if attempt + 1 < self.poll_attempts {
                sleep(self.poll_interval).await;
            }
        }

        tracing::warn!(
            "Transaction {} not final after {} polls: {}",
            transaction_hash,
            self.poll_attempts,
            last_error
        );
        Err(polls_exhausted(transaction_hash, receipt_seen, last_error))
    }

    fn address(&self) -> String {
        format!("{:#x}", self.account.address())
    }
}

/// Decides what a single receipt means for the caller. `None` keeps polling.
fn receipt_outcome(
    transaction_hash: &str,
    execution: &ExecutionResult,
    finality: &TransactionFinalityStatus,
) -> Option<std::result::Result<(), WalletError>> {
    if let ExecutionResult::Reverted { reason } = execution {
        return Some(Err(WalletError::Reverted {
            hash: transaction_hash.to_string(),
            reason: reason.clone(),
        }));
    }
    match finality {
        TransactionFinalityStatus::PreConfirmed => None,
        _ => Some(Ok(())),
    }
}

// Internal helper that supports `wait_for_transaction` operations.
fn polls_exhausted(transaction_hash: &str, receipt_seen: bool, last_error: String) -> WalletError {
    if receipt_seen {
        WalletError::Timeout {
            hash: transaction_hash.to_string(),
        }
    } else {
        WalletError::Rpc(last_error)
    }
}

/// Compares two account addresses as field elements, so `0x0abc` and `0xABC`
/// are the same account. Non-felt strings fall back to a case-insensitive match.
pub fn same_address(left: &str, right: &str) -> bool {
    match (parse_felt(left), parse_felt(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => left.trim().eq_ignore_ascii_case(right.trim()),
    }
}

/// Converts a normalized step into a Starknet `Call`.
pub fn call_from_step(step: &CallStep) -> Result<Call> {
    let to = parse_felt(&step.contract_address)?;
    let selector = get_selector_from_name(&step.entrypoint).map_err(|e| {
        AppError::BadRequest(format!("Invalid entrypoint '{}': {}", step.entrypoint, e))
    })?;
    let calldata = step
        .calldata
        .iter()
        .map(|value| parse_felt(value))
        .collect::<Result<Vec<_>>>()?;
    Ok(Call {
        to,
        selector,
        calldata,
    })
}

pub fn parse_chain_id(chain_id: &str) -> Result<Felt> {
    if chain_id.starts_with("0x") {
        return parse_felt(chain_id);
    }
    let hex = hex::encode(chain_id.as_bytes());
    parse_felt(&format!("0x{hex}"))
}

pub fn parse_felt(value: &str) -> Result<Felt> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Empty field element".to_string()));
    }
    if trimmed.starts_with("0x") {
        return Felt::from_hex(trimmed)
            .map_err(|e| AppError::BadRequest(format!("Invalid felt hex '{}': {}", trimmed, e)));
    }
    Felt::from_dec_str(trimmed)
        .map_err(|e| AppError::BadRequest(format!("Invalid felt dec '{}': {}", trimmed, e)))
}
