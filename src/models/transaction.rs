use crate::error::AppError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

// ==================== ACTION ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionAction {
    Swap,
    Transfer,
    Deposit,
    Withdraw,
    Bridge,
}

impl TransactionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionAction::Swap => "swap",
            TransactionAction::Transfer => "transfer",
            TransactionAction::Deposit => "deposit",
            TransactionAction::Withdraw => "withdraw",
            TransactionAction::Bridge => "bridge",
        }
    }

    /// Capitalized form used in previews ("Swap", "Bridge", ...).
    pub fn label(&self) -> &'static str {
        match self {
            TransactionAction::Swap => "Swap",
            TransactionAction::Transfer => "Transfer",
            TransactionAction::Deposit => "Deposit",
            TransactionAction::Withdraw => "Withdraw",
            TransactionAction::Bridge => "Bridge",
        }
    }
}

impl fmt::Display for TransactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "swap" => Ok(TransactionAction::Swap),
            "transfer" => Ok(TransactionAction::Transfer),
            "deposit" => Ok(TransactionAction::Deposit),
            "withdraw" => Ok(TransactionAction::Withdraw),
            "bridge" => Ok(TransactionAction::Bridge),
            other => Err(AppError::UnsupportedAction(other.to_string())),
        }
    }
}

// ==================== CLASSIFIER REQUEST ====================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRequest {
    pub prompt: String,
    pub address: String,
    #[serde(default)]
    pub chain_id: Option<String>,
}

// ==================== RAW CLASSIFIER RESPONSE ====================
// Everything is optional and `action` and the steps stay raw JSON: shape
// checks live in the processor so a bad plan is rejected with a step-level
// reason instead of failing the whole envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIntentResponse {
    #[serde(default)]
    pub action: Option<serde_json::Value>,
    #[serde(default)]
    pub solver: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<RawIntentData>,
    #[serde(default)]
    pub extracted_params: Option<ExtractedParams>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIntentData {
    #[serde(default)]
    pub description: Option<String>,
    /// Decoded into `RawStep` one by one by the processor.
    #[serde(default)]
    pub steps: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub from_token: Option<TokenRef>,
    #[serde(default)]
    pub to_token: Option<TokenRef>,
    #[serde(default, deserialize_with = "opaque_decimal")]
    pub from_amount: Option<String>,
    #[serde(default, deserialize_with = "opaque_decimal")]
    pub to_amount: Option<String>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default, deserialize_with = "opaque_decimal")]
    pub amount_to_approve: Option<String>,
    #[serde(default, rename = "gasCostUSD", deserialize_with = "opaque_decimal")]
    pub gas_cost_usd: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStep {
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub calldata: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub approve: Option<Box<RawStep>>,
    #[serde(default)]
    pub transaction_data: Option<Box<RawStep>>,
}

impl RawStep {
    #[cfg(test)]
    pub fn call(contract_address: &str, entrypoint: &str, calldata: &[&str]) -> Self {
        Self {
            contract_address: Some(contract_address.to_string()),
            entrypoint: Some(entrypoint.to_string()),
            calldata: Some(
                calldata
                    .iter()
                    .map(|arg| serde_json::Value::String(arg.to_string()))
                    .collect(),
            ),
            approve: None,
            transaction_data: None,
        }
    }

    #[cfg(test)]
    pub fn into_value(self) -> serde_json::Value {
        serde_json::to_value(self).expect("raw step serializes")
    }

    pub fn has_inline_call(&self) -> bool {
        self.contract_address.is_some() || self.entrypoint.is_some() || self.calldata.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedParams {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub token1: Option<String>,
    #[serde(default)]
    pub token2: Option<String>,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default, deserialize_with = "opaque_decimal")]
    pub amount: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, alias = "dest_chain")]
    pub destination_chain: Option<String>,
    #[serde(default)]
    pub destination_address: Option<String>,
}

// ==================== NORMALIZED TRANSACTION ====================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStep {
    pub contract_address: String,
    pub entrypoint: String,
    #[serde(default)]
    pub calldata: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedTransaction {
    pub action: TransactionAction,
    pub description: String,
    pub transactions: Vec<CallStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_token: Option<TokenRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_token: Option<TokenRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

// ==================== EXECUTION RESULT ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The wallet refused or could not submit the call.
    Submission,
    /// The call landed on-chain and reverted.
    Reverted,
    /// Finality was not observed within the wait bound.
    Timeout,
    /// The RPC node kept failing while we polled for the receipt.
    Rpc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// Index into the flattened call list (`ProcessedTransaction.transactions`),
    /// not into the classifier's `data.steps`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at_step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(default)]
    pub completed_hashes: Vec<String>,
}

impl ExecutionResult {
    pub fn succeeded(completed_hashes: Vec<String>) -> Self {
        Self {
            success: true,
            transaction_hash: completed_hashes.last().cloned(),
            failed_at_step: None,
            error: None,
            failure: None,
            completed_hashes,
        }
    }

    pub fn failed(
        step: usize,
        failure: FailureKind,
        error: String,
        completed_hashes: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            transaction_hash: None,
            failed_at_step: Some(step),
            error: Some(error),
            failure: Some(failure),
            completed_hashes,
        }
    }
}

// Accepts `"0.1"` or `0.1` and keeps the textual form. Amounts are never
// converted to floats on our side.
fn opaque_decimal<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(text)) => Ok(Some(text)),
        Some(serde_json::Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected decimal string or number, got {}",
            other
        ))),
    }
}
