//! Contract ABI handling: the submission event, the result write and the
//! farmer registry lookup.

use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::{Event, Function, JsonAbi};
use alloy_primitives::{hex, Address, B256};

use crate::error::ContractError;
use crate::types::FarmerRecord;

/// Entry point that records a verdict: `AI_solution(string itemUrl, string verdict)`.
pub const RECORD_RESULT_FN: &str = "AI_solution";
/// Public mapping getter: `farmer_map(address)`.
pub const FARMER_LOOKUP_FN: &str = "farmer_map";
/// Event emitted for every submission.
pub const SUBMISSION_EVENT: &str = "ImageSubmitted";

/// Fallback schema used when the configured ABI does not describe the event.
const SUBMISSION_EVENT_JSON: &str = r#"[{
    "anonymous": false,
    "inputs": [
        {"indexed": false, "internalType": "address", "name": "_user", "type": "address"},
        {"indexed": false, "internalType": "string", "name": "imageUrl", "type": "string"}
    ],
    "name": "ImageSubmitted",
    "type": "event"
}]"#;

/// Parsed contract interface bound to a deployment address.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    address: Address,
    submission_event: Event,
    record_result: Function,
    farmer_lookup: Function,
}

impl ContractAbi {
    /// Parse `abi_json` and resolve every entry point the worker needs.
    pub fn new(address: Address, abi_json: &str) -> Result<Self, ContractError> {
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .map_err(|e| ContractError::InvalidAbi(e.to_string()))?;

        let submission_event = match abi.event(SUBMISSION_EVENT).and_then(|v| v.first()) {
            Some(event) => event.clone(),
            None => builtin_submission_event()?,
        };

        Ok(Self {
            address,
            submission_event,
            record_result: find_function(&abi, RECORD_RESULT_FN)?,
            farmer_lookup: find_function(&abi, FARMER_LOOKUP_FN)?,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn submission_event(&self) -> &Event {
        &self.submission_event
    }

    /// topic0 of `ImageSubmitted(address,string)`.
    pub fn submission_topic(&self) -> B256 {
        self.submission_event.selector()
    }

    /// Calldata for `AI_solution(item_url, verdict)`.
    pub fn encode_record_result(&self, item_url: &str, verdict: &str) -> Result<Vec<u8>, ContractError> {
        self.record_result
            .abi_encode_input(&[
                DynSolValue::String(item_url.to_string()),
                DynSolValue::String(verdict.to_string()),
            ])
            .map_err(|e| ContractError::Encode {
                function: RECORD_RESULT_FN.into(),
                reason: e.to_string(),
            })
    }

    /// Calldata for `farmer_map(submitter)`.
    pub fn encode_farmer_lookup(&self, submitter: Address) -> Result<Vec<u8>, ContractError> {
        self.farmer_lookup
            .abi_encode_input(&[DynSolValue::Address(submitter)])
            .map_err(|e| ContractError::Encode {
                function: FARMER_LOOKUP_FN.into(),
                reason: e.to_string(),
            })
    }

    /// Decode the `farmer_map` return data. The identity is the second field.
    pub fn decode_farmer_record(
        &self,
        submitter: Address,
        data: &[u8],
    ) -> Result<FarmerRecord, ContractError> {
        let decode_err = |reason: String| ContractError::Decode {
            function: FARMER_LOOKUP_FN.into(),
            reason,
        };

        let mut fields = self
            .farmer_lookup
            .abi_decode_output(data, true)
            .map_err(|e| decode_err(e.to_string()))?;

        // A getter returning a single struct yields one tuple; flatten it.
        if fields.len() == 1 {
            if let DynSolValue::Tuple(inner) = &fields[0] {
                fields = inner.clone();
            }
        }

        let identity = fields
            .get(1)
            .map(render_value)
            .ok_or_else(|| decode_err(format!("expected at least 2 fields, got {}", fields.len())))?;

        Ok(FarmerRecord {
            address: submitter,
            identity,
        })
    }
}

fn find_function(abi: &JsonAbi, name: &str) -> Result<Function, ContractError> {
    abi.function(name)
        .and_then(|overloads| overloads.first())
        .cloned()
        .ok_or_else(|| ContractError::MissingFunction { name: name.into() })
}

fn builtin_submission_event() -> Result<Event, ContractError> {
    let abi: JsonAbi = serde_json::from_str(SUBMISSION_EVENT_JSON)
        .map_err(|e| ContractError::InvalidAbi(e.to_string()))?;
    abi.event(SUBMISSION_EVENT)
        .and_then(|v| v.first())
        .cloned()
        .ok_or_else(|| ContractError::InvalidAbi("builtin event schema".into()))
}

/// Text form of a decoded identity field.
fn render_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Uint(n, _) => n.to_string(),
        DynSolValue::Int(n, _) => n.to_string(),
        DynSolValue::Address(a) => a.to_string(),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Bytes(b) => hex::encode_prefixed(b),
        DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..*size]),
        other => format!("{other:?}"),
    }
}
