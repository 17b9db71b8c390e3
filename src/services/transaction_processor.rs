use crate::{
    error::{AppError, Result},
    models::{
        CallStep, ExtractedParams, IntentRequest, ProcessedTransaction, RawIntentResponse,
        RawStep, TransactionAction,
    },
};
use serde_json::Value;

/// Turns a classifier plan into a `ProcessedTransaction`.
///
/// Fails closed: an unknown action, an empty plan, or any malformed step
/// rejects the whole plan. `origin` is only used for logging.
pub fn process(raw: &RawIntentResponse, origin: &IntentRequest) -> Result<ProcessedTransaction> {
    tracing::debug!(
        "Processing intent plan: prompt={:?} address={} chain_id={:?} solver={:?}",
        origin.prompt,
        origin.address,
        origin.chain_id,
        raw.solver
    );

    let action = parse_action(raw.action.as_ref())?;

    let data = raw.data.clone().unwrap_or_default();
    let steps = data.steps.as_deref().unwrap_or(&[]);
    if steps.is_empty() {
        return Err(AppError::EmptyTransaction);
    }

    let mut transactions = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let step = decode_step(index, step)?;
        transactions.extend(flatten_step(index, &step)?);
    }

    let params = raw.extracted_params.clone().unwrap_or_default();
    let description = data
        .description
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| describe_from_params(action, &params));

    let processed = ProcessedTransaction {
        action,
        description,
        transactions,
        from_token: data.from_token,
        to_token: data.to_token,
        from_amount: data.from_amount.or_else(|| params.amount.clone()),
        to_amount: data.to_amount.or_else(|| params.amount.clone()),
        receiver: data.receiver.or_else(|| params.address.clone()),
        estimated_gas: data.gas_cost_usd,
        solver: raw.solver.clone(),
        protocol: data.protocol.or_else(|| params.protocol.clone()),
    };

    tracing::info!(
        "Intent processed: action={} steps={} address={}",
        processed.action,
        processed.transactions.len(),
        origin.address
    );
    Ok(processed)
}

fn parse_action(action: Option<&Value>) -> Result<TransactionAction> {
    match action {
        Some(Value::String(value)) if !value.trim().is_empty() => value.trim().parse(),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            Err(AppError::UnsupportedAction("<missing>".to_string()))
        }
        Some(other) => Err(AppError::UnsupportedAction(other.to_string())),
    }
}

// Steps arrive as raw JSON; a wrongly typed field rejects only with the
// index of the step it sits in.
fn decode_step(index: usize, step: &Value) -> Result<RawStep> {
    if !step.is_object() {
        return Err(AppError::MalformedStep {
            index,
            reason: format!("step is not an object: {}", step),
        });
    }
    serde_json::from_value(step.clone()).map_err(|e| AppError::MalformedStep {
        index,
        reason: e.to_string(),
    })
}

// A raw step may carry an inline call and/or nested `approve` and
// `transactionData` calls. Output order: approve, transactionData, inline.
fn flatten_step(index: usize, step: &RawStep) -> Result<Vec<CallStep>> {
    let mut calls = Vec::new();

    if let Some(approve) = step.approve.as_deref() {
        calls.push(build_call(index, "approve", approve)?);
    }
    if let Some(transaction_data) = step.transaction_data.as_deref() {
        calls.push(build_call(index, "transactionData", transaction_data)?);
    }
    if step.has_inline_call() || calls.is_empty() {
        calls.push(build_call(index, "", step)?);
    }

    Ok(calls)
}

fn build_call(index: usize, label: &str, step: &RawStep) -> Result<CallStep> {
    let malformed = |reason: &str| AppError::MalformedStep {
        index,
        reason: if label.is_empty() {
            reason.to_string()
        } else {
            format!("{}: {}", label, reason)
        },
    };

    let contract_address = non_blank(step.contract_address.as_deref())
        .ok_or_else(|| malformed("missing contractAddress"))?;
    let entrypoint =
        non_blank(step.entrypoint.as_deref()).ok_or_else(|| malformed("missing entrypoint"))?;

    let mut calldata = Vec::new();
    for (position, arg) in step.calldata.iter().flatten().enumerate() {
        let value = match arg {
            serde_json::Value::String(text) if !text.trim().is_empty() => {
                text.trim().to_string()
            }
            serde_json::Value::Number(number) => number.to_string(),
            _ => {
                return Err(malformed(&format!(
                    "calldata[{}] is not a felt-encodable value",
                    position
                )))
            }
        };
        calldata.push(value);
    }

    Ok(CallStep {
        contract_address,
        entrypoint,
        calldata,
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn upper_or(value: Option<&str>, fallback: &str) -> String {
    non_blank(value)
        .map(|text| text.to_ascii_uppercase())
        .unwrap_or_else(|| fallback.to_string())
}

// Internal helper that builds a description when the classifier sent none.
fn describe_from_params(action: TransactionAction, params: &ExtractedParams) -> String {
    let Some(amount) = non_blank(params.amount.as_deref()) else {
        return format!("{} transaction", action.label());
    };
    let token = upper_or(params.token1.as_deref(), "tokens");

    match action {
        TransactionAction::Swap => format!(
            "Swap {} {} for {}",
            amount,
            token,
            upper_or(params.token2.as_deref(), "tokens")
        ),
        TransactionAction::Transfer => format!(
            "Transfer {} {} to {}",
            amount,
            token,
            non_blank(params.address.as_deref()).unwrap_or_else(|| "recipient".to_string())
        ),
        TransactionAction::Deposit => format!(
            "Deposit {} {} to {}",
            amount,
            token,
            upper_or(params.protocol.as_deref(), "protocol")
        ),
        TransactionAction::Withdraw => format!(
            "Withdraw {} {} from {}",
            amount,
            token,
            upper_or(params.protocol.as_deref(), "protocol")
        ),
        TransactionAction::Bridge => {
            let destination = non_blank(params.destination_chain.as_deref())
                .map(|chain| chain.replace("_MAINNET", ""))
                .unwrap_or_else(|| "destination chain".to_string());
            format!("Bridge {} {} to {}", amount, token, destination)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawIntentData, TokenRef};

    fn origin() -> IntentRequest {
        IntentRequest {
            prompt: "Swap 0.1 ETH to STRK".to_string(),
            address: "0xUSER".to_string(),
            chain_id: Some("4012".to_string()),
        }
    }

    fn raw_with_steps(action: &str, steps: Vec<RawStep>) -> RawIntentResponse {
        RawIntentResponse {
            action: Some(Value::String(action.to_string())),
            solver: Some("Avnu".to_string()),
            kind: Some("write".to_string()),
            data: Some(RawIntentData {
                description: Some("Swap 0.1 ETH for STRK".to_string()),
                steps: Some(steps.into_iter().map(RawStep::into_value).collect()),
                ..Default::default()
            }),
            extracted_params: None,
        }
    }

    fn swap_example() -> RawIntentResponse {
        raw_with_steps(
            "swap",
            vec![
                RawStep::call(
                    "0xETH_ADDR",
                    "approve",
                    &["0xROUTER", "100000000000000000", "0"],
                ),
                RawStep::call(
                    "0xROUTER",
                    "swap",
                    &["0xETH_ADDR", "0xSTRK_ADDR", "100000000000000000"],
                ),
            ],
        )
    }

    #[test]
    fn process_preserves_step_order() {
        // Memastikan urutan approve -> swap tidak berubah
        let processed = process(&swap_example(), &origin()).expect("process");
        assert_eq!(processed.action, TransactionAction::Swap);
        assert_eq!(processed.transactions.len(), 2);
        assert_eq!(processed.transactions[0].entrypoint, "approve");
        assert_eq!(processed.transactions[0].contract_address, "0xETH_ADDR");
        assert_eq!(
            processed.transactions[0].calldata,
            vec!["0xROUTER", "100000000000000000", "0"]
        );
        assert_eq!(processed.transactions[1].entrypoint, "swap");
        assert_eq!(processed.transactions[1].contract_address, "0xROUTER");
    }

    #[test]
    fn process_keeps_length_for_many_steps() {
        let steps: Vec<RawStep> = (0..7)
            .map(|i| RawStep::call(&format!("0x{:x}", i + 1), &format!("call_{}", i), &[]))
            .collect();
        let processed = process(&raw_with_steps("transfer", steps), &origin()).expect("process");
        let entrypoints: Vec<&str> = processed
            .transactions
            .iter()
            .map(|call| call.entrypoint.as_str())
            .collect();
        assert_eq!(
            entrypoints,
            vec!["call_0", "call_1", "call_2", "call_3", "call_4", "call_5", "call_6"]
        );
    }

    #[test]
    fn process_rejects_empty_steps() {
        let err = process(&raw_with_steps("swap", vec![]), &origin()).expect_err("must fail");
        assert!(matches!(err, AppError::EmptyTransaction));
    }

    #[test]
    fn process_rejects_missing_data() {
        let raw = RawIntentResponse {
            action: Some(Value::String("transfer".to_string())),
            ..Default::default()
        };
        let err = process(&raw, &origin()).expect_err("must fail");
        assert!(matches!(err, AppError::EmptyTransaction));
    }

    #[test]
    fn process_rejects_unknown_action_before_steps() {
        // Action dicek lebih dulu, bahkan ketika steps kosong
        let err = process(&raw_with_steps("stake", vec![]), &origin()).expect_err("must fail");
        assert!(matches!(err, AppError::UnsupportedAction(ref a) if a == "stake"));

        let raw = RawIntentResponse::default();
        let err = process(&raw, &origin()).expect_err("must fail");
        assert!(matches!(err, AppError::UnsupportedAction(_)));
    }

    #[test]
    fn process_rejects_whole_plan_on_malformed_step() {
        let mut broken = RawStep::call("0xROUTER", "swap", &[]);
        broken.entrypoint = Some("   ".to_string());
        let steps = vec![RawStep::call("0x1", "approve", &["1"]), broken];
        let err = process(&raw_with_steps("swap", steps), &origin()).expect_err("must fail");
        match err {
            AppError::MalformedStep { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("entrypoint"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn process_rejects_wrongly_typed_step_field_by_index() {
        let raw: RawIntentResponse = serde_json::from_value(serde_json::json!({
            "action": "swap",
            "data": {
                "steps": [
                    {"contractAddress": "0x1", "entrypoint": "approve", "calldata": ["1"]},
                    {"contractAddress": "0x2", "entrypoint": "swap", "calldata": []},
                    {"contractAddress": 123, "entrypoint": "transfer", "calldata": []}
                ]
            }
        }))
        .expect("envelope");
        let err = process(&raw, &origin()).expect_err("must fail");
        match err {
            AppError::MalformedStep { index, reason } => {
                assert_eq!(index, 2);
                assert!(reason.contains("invalid type"), "{}", reason);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let raw: RawIntentResponse = serde_json::from_value(serde_json::json!({
            "action": "swap",
            "data": { "steps": [{"contractAddress": "0x1", "entrypoint": ["swap"]}, "0xdead"] }
        }))
        .expect("envelope");
        let err = process(&raw, &origin()).expect_err("must fail");
        assert!(matches!(err, AppError::MalformedStep { index: 0, .. }));
    }

    #[test]
    fn process_rejects_non_object_step() {
        let raw: RawIntentResponse = serde_json::from_value(serde_json::json!({
            "action": "transfer",
            "data": { "steps": [{"contractAddress": "0x1", "entrypoint": "transfer"}, 42] }
        }))
        .expect("envelope");
        let err = process(&raw, &origin()).expect_err("must fail");
        match err {
            AppError::MalformedStep { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("not an object"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn process_rejects_non_string_action() {
        let raw: RawIntentResponse = serde_json::from_value(serde_json::json!({
            "action": 7,
            "data": { "steps": [{"contractAddress": "0x1", "entrypoint": "transfer"}] }
        }))
        .expect("envelope");
        let err = process(&raw, &origin()).expect_err("must fail");
        assert!(matches!(err, AppError::UnsupportedAction(ref a) if a == "7"));

        let raw = RawIntentResponse {
            action: Some(Value::String("  ".to_string())),
            ..Default::default()
        };
        let err = process(&raw, &origin()).expect_err("must fail");
        assert!(matches!(err, AppError::UnsupportedAction(ref a) if a == "<missing>"));
    }

    #[test]
    fn process_rejects_step_without_any_call() {
        let err = process(&raw_with_steps("transfer", vec![RawStep::default()]), &origin())
            .expect_err("must fail");
        assert!(matches!(err, AppError::MalformedStep { index: 0, .. }));
    }

    #[test]
    fn process_rejects_structured_calldata() {
        let mut step = RawStep::call("0x1", "transfer", &["0x2"]);
        if let Some(calldata) = step.calldata.as_mut() {
            calldata.push(serde_json::json!({"low": "1"}));
        }
        let err = process(&raw_with_steps("transfer", vec![step]), &origin())
            .expect_err("must fail");
        match err {
            AppError::MalformedStep { index, reason } => {
                assert_eq!(index, 0);
                assert!(reason.contains("calldata[1]"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn process_defaults_missing_calldata_to_empty() {
        let mut step = RawStep::call("0x1", "claim", &[]);
        step.calldata = None;
        let processed =
            process(&raw_with_steps("withdraw", vec![step]), &origin()).expect("process");
        assert!(processed.transactions[0].calldata.is_empty());
    }

    #[test]
    fn process_keeps_numeric_calldata_as_text() {
        let mut step = RawStep::call("0x1", "transfer", &["0x2"]);
        if let Some(calldata) = step.calldata.as_mut() {
            calldata.push(serde_json::json!(1000));
        }
        let processed =
            process(&raw_with_steps("transfer", vec![step]), &origin()).expect("process");
        assert_eq!(processed.transactions[0].calldata, vec!["0x2", "1000"]);
    }

    #[test]
    fn process_flattens_nested_approve_and_transaction_data() {
        // Memastikan step bertingkat dari solver dipecah: approve dulu baru transactionData
        let nested = RawStep {
            approve: Some(Box::new(RawStep::call("0xTOKEN", "approve", &["0xROUTER", "5", "0"]))),
            transaction_data: Some(Box::new(RawStep::call("0xROUTER", "multi_route_swap", &["5"]))),
            ..Default::default()
        };
        let tail = RawStep::call("0xTOKEN", "transfer", &["0xFEE", "1", "0"]);
        let processed =
            process(&raw_with_steps("swap", vec![nested, tail]), &origin()).expect("process");
        let entrypoints: Vec<&str> = processed
            .transactions
            .iter()
            .map(|call| call.entrypoint.as_str())
            .collect();
        assert_eq!(entrypoints, vec!["approve", "multi_route_swap", "transfer"]);
    }

    #[test]
    fn process_reports_nested_failure_with_label() {
        let nested = RawStep {
            approve: Some(Box::new(RawStep {
                entrypoint: Some("approve".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        };
        let err = process(&raw_with_steps("swap", vec![nested]), &origin())
            .expect_err("must fail");
        match err {
            AppError::MalformedStep { index, reason } => {
                assert_eq!(index, 0);
                assert_eq!(reason, "approve: missing contractAddress");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn process_passes_amounts_through_untouched() {
        let mut raw = swap_example();
        if let Some(data) = raw.data.as_mut() {
            data.from_amount = Some("100000000000000000".to_string());
            data.to_amount = Some("523.118400000000000001".to_string());
            data.gas_cost_usd = Some("0.0042".to_string());
            data.from_token = Some(TokenRef {
                symbol: "ETH".to_string(),
                address: Some("0xETH_ADDR".to_string()),
                decimals: Some(18),
            });
        }
        let processed = process(&raw, &origin()).expect("process");
        assert_eq!(processed.from_amount.as_deref(), Some("100000000000000000"));
        assert_eq!(processed.to_amount.as_deref(), Some("523.118400000000000001"));
        assert_eq!(processed.estimated_gas.as_deref(), Some("0.0042"));
        assert_eq!(processed.solver.as_deref(), Some("Avnu"));
        assert_eq!(
            processed.from_token.map(|t| t.symbol),
            Some("ETH".to_string())
        );
    }

    #[test]
    fn process_falls_back_to_extracted_params() {
        let mut raw = raw_with_steps("deposit", vec![RawStep::call("0x1", "mint", &["1"])]);
        if let Some(data) = raw.data.as_mut() {
            data.description = Some("  ".to_string());
        }
        raw.extracted_params = Some(ExtractedParams {
            token1: Some("strk".to_string()),
            amount: Some("25".to_string()),
            protocol: Some("nostra".to_string()),
            address: Some("0xUSER".to_string()),
            ..Default::default()
        });
        let processed = process(&raw, &origin()).expect("process");
        assert_eq!(processed.description, "Deposit 25 STRK to NOSTRA");
        assert_eq!(processed.from_amount.as_deref(), Some("25"));
        assert_eq!(processed.receiver.as_deref(), Some("0xUSER"));
        assert_eq!(processed.protocol.as_deref(), Some("nostra"));
    }

    #[test]
    fn describe_from_params_covers_bridge_and_default() {
        let params = ExtractedParams {
            token1: Some("eth".to_string()),
            amount: Some("0.5".to_string()),
            destination_chain: Some("BASE_MAINNET".to_string()),
            ..Default::default()
        };
        assert_eq!(
            describe_from_params(TransactionAction::Bridge, &params),
            "Bridge 0.5 ETH to BASE"
        );
        assert_eq!(
            describe_from_params(TransactionAction::Swap, &ExtractedParams::default()),
            "Swap transaction"
        );
    }
}
