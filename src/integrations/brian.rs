use crate::{
    config::Config,
    error::{AppError, Result},
    models::{IntentRequest, RawIntentResponse},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Turns a natural-language prompt into a raw transaction plan.
#[async_trait::async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, request: &IntentRequest) -> Result<RawIntentResponse>;
}

/// Brian AI `agent/transaction` client.
#[derive(Debug, Clone)]
pub struct BrianClient {
    api_key: String,
    api_url: String,
    default_chain_id: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrianTransactionRequest<'a> {
    prompt: &'a str,
    address: &'a str,
    chain_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct BrianEnvelope {
    #[serde(default)]
    result: Option<Vec<RawIntentResponse>>,
}

impl BrianClient {
    pub fn new(
        api_key: String,
        api_url: String,
        default_chain_id: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Brian HTTP client init failed: {}", e)))?;
        Ok(Self {
            api_key,
            api_url,
            default_chain_id,
            http,
        })
    }

    /// Returns `Ok(None)` when `BRIAN_API_KEY` is not set.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(api_key) = config.brian_api_key.clone() else {
            return Ok(None);
        };
        Self::new(
            api_key,
            config.brian_api_url.clone(),
            config.brian_chain_id.clone(),
            Duration::from_secs(config.brian_timeout_secs),
        )
        .map(Some)
    }

    fn endpoint(&self) -> String {
        format!("{}/transaction", self.api_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl IntentClassifier for BrianClient {
    async fn classify(&self, request: &IntentRequest) -> Result<RawIntentResponse> {
        let chain_id = request
            .chain_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.default_chain_id);
        let body = BrianTransactionRequest {
            prompt: &request.prompt,
            address: &request.address,
            chain_id,
        };

        tracing::debug!("Requesting Brian transaction plan: chain_id={}", chain_id);
        let response = self
            .http
            .post(self.endpoint())
            .header("X-Brian-Api-Key", self.api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("Brian request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|value| error_message(&value))
                .unwrap_or_else(|| text.chars().take(200).collect());
            return Err(AppError::ExternalAPI(format!(
                "Brian API returned {}: {}",
                status, detail
            )));
        }

        let envelope: Value = serde_json::from_str(&text)
            .map_err(|e| AppError::ExternalAPI(format!("Brian response parse failed: {}", e)))?;
        first_result(envelope)
    }
}

// Internal helper that supports `classify` operations.
fn first_result(envelope: Value) -> Result<RawIntentResponse> {
    if let Some(message) = error_message(&envelope) {
        return Err(AppError::ExternalAPI(format!("Brian API error: {}", message)));
    }
    let envelope: BrianEnvelope = serde_json::from_value(envelope)
        .map_err(|e| AppError::ExternalAPI(format!("Brian response parse failed: {}", e)))?;
    envelope
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| AppError::ExternalAPI("Brian returned no transaction plan".to_string()))
}

// Internal helper that extracts a readable message from an `error` field.
fn error_message(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Null => None,
        Value::String(message) if message.trim().is_empty() => None,
        Value::String(message) => Some(message.clone()),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_result_takes_first_plan() {
        let envelope = json!({
            "result": [
                { "action": "swap", "data": { "steps": [] } },
                { "action": "transfer" }
            ]
        });
        let plan = first_result(envelope).expect("plan");
        assert_eq!(plan.action, Some(json!("swap")));
    }

    #[test]
    fn first_result_reports_error_field() {
        let envelope = json!({ "error": "Insufficient balance" });
        let err = first_result(envelope).expect_err("error");
        assert!(matches!(err, AppError::ExternalAPI(message) if message.contains("Insufficient balance")));
    }

    #[test]
    fn first_result_rejects_empty_result() {
        let err = first_result(json!({ "result": [] })).expect_err("empty");
        assert!(matches!(err, AppError::ExternalAPI(_)));
        let err = first_result(json!({})).expect_err("missing");
        assert!(matches!(err, AppError::ExternalAPI(_)));
    }

    #[test]
    fn error_message_reads_nested_object() {
        let body = json!({ "error": { "message": "rate limited" } });
        assert_eq!(error_message(&body).as_deref(), Some("rate limited"));
        assert_eq!(error_message(&json!({ "error": null })), None);
    }

    #[test]
    fn request_body_uses_chain_id_key() {
        let body = BrianTransactionRequest {
            prompt: "Swap 0.1 ETH to STRK",
            address: "0xabc",
            chain_id: "4012",
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value["chainId"], "4012");
        assert_eq!(value["prompt"], "Swap 0.1 ETH to STRK");
    }

    #[test]
    fn from_config_without_key_is_none() {
        let config = Config::for_tests();
        assert!(BrianClient::from_config(&config).expect("config").is_none());

        let mut config = Config::for_tests();
        config.brian_api_key = Some("key".to_string());
        let client = BrianClient::from_config(&config).expect("config").expect("client");
        assert_eq!(
            client.endpoint(),
            "https://api.brianknows.org/api/v0/agent/transaction"
        );
    }
}
