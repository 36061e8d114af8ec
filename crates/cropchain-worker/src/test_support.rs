//! Shared fixtures for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{address, hex, Address, Bytes, B256};
use async_trait::async_trait;
use cropchain_rpc_core::{JsonRpcRequest, JsonRpcResponse, RpcTransport, TransportError};
use serde_json::{json, Value};

use crate::contract::ContractAbi;
use crate::error::PublishError;
use crate::publisher::{PublishReport, Publisher};

pub const CONTRACT_ADDRESS: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
pub const FARMER_ADDRESS: Address = address!("0000000000000000000000000000000000000abc");

/// Anvil dev account #0.
pub const SIGNER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const SIGNER_ADDRESS: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

pub const TEST_ABI: &str = r#"[
  {"type":"function","name":"AI_solution","stateMutability":"nonpayable",
   "inputs":[{"name":"imageUrl","type":"string","internalType":"string"},
             {"name":"result","type":"string","internalType":"string"}],
   "outputs":[]},
  {"type":"function","name":"farmer_map","stateMutability":"view",
   "inputs":[{"name":"","type":"address","internalType":"address"}],
   "outputs":[{"name":"name","type":"string","internalType":"string"},
              {"name":"aadhar_id","type":"string","internalType":"string"},
              {"name":"submissions","type":"uint256","internalType":"uint256"}]}
]"#;

pub fn contract_abi() -> ContractAbi {
    ContractAbi::new(CONTRACT_ADDRESS, TEST_ABI).unwrap()
}

/// ABI-encoded `farmer_map` return data carrying `identity`.
pub fn farmer_output(identity: &str) -> Bytes {
    DynSolValue::Tuple(vec![
        DynSolValue::String("Ramesh".into()),
        DynSolValue::String(identity.into()),
        DynSolValue::Uint(alloy_primitives::U256::from(1), 256),
    ])
    .abi_encode_params()
    .into()
}

/// `ImageSubmitted` log from [`FARMER_ADDRESS`] as a node would deliver it.
pub fn submission_log(topic: B256, packed: &str) -> Value {
    let data = DynSolValue::Tuple(vec![
        DynSolValue::Address(FARMER_ADDRESS),
        DynSolValue::String(packed.into()),
    ])
    .abi_encode_params();
    json!({
        "address": CONTRACT_ADDRESS,
        "topics": [topic],
        "data": hex::encode_prefixed(data),
        "blockNumber": "0x64",
        "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
        "logIndex": "0x0",
        "removed": false
    })
}

/// Publisher that records its calls and fails for one item url.
#[derive(Default)]
pub struct RecordingPublisher {
    pub calls: Mutex<Vec<(String, String, Address)>>,
    pub fail_on: Option<&'static str>,
}

impl RecordingPublisher {
    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _, _)| u.clone()).collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        item_url: &str,
        verdict: &str,
        submitter: Address,
    ) -> Result<PublishReport, PublishError> {
        self.calls
            .lock()
            .unwrap()
            .push((item_url.to_string(), verdict.to_string(), submitter));
        if self.fail_on == Some(item_url) {
            return Err(PublishError::Connectivity {
                url: "mock://node".into(),
            });
        }
        Ok(PublishReport {
            tx_hash: B256::ZERO,
            block_number: Some(1),
            gas_used: Some(21_000),
            notified: true,
        })
    }
}

enum Reply {
    Ok(Value),
    Fail(String),
}

/// Transport answering by method name. Queued replies are consumed in
/// order; the last one sticks.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, method: &str, result: Value) {
        self.push(method, Reply::Ok(result));
    }

    pub fn fail(&self, method: &str, reason: &str) {
        self.push(method, Reply::Fail(reason.into()));
    }

    fn push(&self, method: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(m, _)| m == method).count()
    }

    /// Params of every call to `method`, oldest first.
    pub fn params(&self, method: &str) -> Vec<Vec<Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((req.method.clone(), req.params.clone()));

        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(&req.method)
            .ok_or_else(|| TransportError::Other(format!("unscripted method {}", req.method)))?;
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().map(|r| match r {
                Reply::Ok(v) => Reply::Ok(v.clone()),
                Reply::Fail(s) => Reply::Fail(s.clone()),
            })
        };

        match reply {
            Some(Reply::Ok(result)) => Ok(JsonRpcResponse::success(req.id, result)),
            Some(Reply::Fail(reason)) => Err(TransportError::Http(reason)),
            None => Err(TransportError::Other(format!("no reply for {}", req.method))),
        }
    }

    fn url(&self) -> &str {
        "mock://node"
    }
}
