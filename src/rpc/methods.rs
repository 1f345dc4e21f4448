//! RPC Method Implementations
//!
//! Each method maps onto one ledger operation. Parameters are positional
//! (a JSON array); a single scalar or object is accepted in place of a
//! one-element array.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mining::{ConsensusMode, MiningMode};
use crate::node::Ledger;
use crate::validation::{Transaction, TransactionFields};

pub const RPC_METHOD_NOT_FOUND: i32 = -32601;
pub const RPC_INVALID_PARAMS: i32 = -32602;
pub const RPC_INTERNAL_ERROR: i32 = -32603;
/// Requested block or wallet does not exist
pub const RPC_NOT_FOUND: i32 = -5;
/// Transaction or import payload rejected by the ledger
pub const RPC_REJECTED: i32 = -26;

const DEFAULT_TEST_DATA_COUNT: usize = 5;
/// Largest batch `addtestdata` generates in one request
pub const MAX_TEST_DATA_COUNT: usize = 1_000;

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<Value>,
    pub id: Value,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// JSON-RPC Error
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
            id,
        }
    }
}

/// RPC Handler State
#[derive(Clone)]
pub struct RpcState {
    pub ledger: Ledger,
}

type RpcResult = Result<Value, (i32, String)>;

/// Process a JSON-RPC request and return a response
pub async fn handle_request(state: &RpcState, request: JsonRpcRequest) -> JsonRpcResponse {
    let ledger = &state.ledger;
    let params = request.params;

    let result = match request.method.as_str() {
        "addtransaction" => add_transaction(ledger, params),
        "addsignedtransaction" => add_signed_transaction(ledger, params),
        "signtransaction" => sign_transaction(ledger, params),
        "mine" => to_value(ledger.mine_new_block().await),
        "cancelmining" => {
            ledger.cancel_mining();
            Ok(json!(true))
        }
        "getchain" => to_value(ledger.get_chain()),
        "getblock" => get_block(ledger, params),
        "gettransactions" => to_value(ledger.get_all_transactions()),
        "validatechain" => Ok(json!(ledger.is_chain_valid())),
        "getstats" => to_value(ledger.get_stats()),
        "createwallet" => to_value(ledger.create_wallet()),
        "importwallet" => import_wallet(ledger, params),
        "getwallet" => get_wallet(ledger, params),
        "listwallets" => to_value(ledger.get_all_wallets()),
        "setminingmode" => set_mining_mode(ledger, params),
        "setconsensusmode" => set_consensus_mode(ledger, params),
        "addtestdata" => add_test_data(ledger, params).await,
        "export" => ledger
            .export_blockchain()
            .map(Value::String)
            .map_err(|e| (RPC_INTERNAL_ERROR, e.to_string())),
        "import" => import(ledger, params),
        "reset" => {
            ledger.reset_chain();
            Ok(json!(true))
        }
        _ => Err((RPC_METHOD_NOT_FOUND, format!("Method not found: {}", request.method))),
    };

    match result {
        Ok(value) => JsonRpcResponse::success(request.id, value),
        Err((code, message)) => JsonRpcResponse::error(request.id, code, message),
    }
}

fn to_value<T: Serialize>(value: T) -> RpcResult {
    serde_json::to_value(value).map_err(|e| (RPC_INTERNAL_ERROR, e.to_string()))
}

/// Positional parameter `index`, or the bare value for index 0
fn param(params: &Option<Value>, index: usize) -> Option<&Value> {
    match params {
        Some(Value::Array(items)) => items.get(index),
        Some(Value::Null) | None => None,
        Some(value) if index == 0 => Some(value),
        Some(_) => None,
    }
}

fn required<T: DeserializeOwned>(params: &Option<Value>, index: usize, expected: &str) -> Result<T, (i32, String)> {
    let value = param(params, index)
        .ok_or_else(|| (RPC_INVALID_PARAMS, format!("Invalid params: expected {}", expected)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| (RPC_INVALID_PARAMS, format!("Invalid params: {}: {}", expected, e)))
}

/// Params: [fields]
fn add_transaction(ledger: &Ledger, params: Option<Value>) -> RpcResult {
    let fields: TransactionFields = required(&params, 0, "transaction fields")?;
    Ok(json!(ledger.add_transaction(fields)))
}

/// Params: [signed transaction]
fn add_signed_transaction(ledger: &Ledger, params: Option<Value>) -> RpcResult {
    let tx: Transaction = required(&params, 0, "signed transaction")?;
    ledger
        .add_signed_transaction(tx)
        .map(|id| json!(id))
        .map_err(|e| (RPC_REJECTED, e.to_string()))
}

/// Params: [fields, private_key]
fn sign_transaction(ledger: &Ledger, params: Option<Value>) -> RpcResult {
    let fields: TransactionFields = required(&params, 0, "transaction fields")?;
    let private_key: String = required(&params, 1, "private key")?;
    to_value(ledger.sign_transaction(fields, &private_key))
}

/// Params: [block_id]
fn get_block(ledger: &Ledger, params: Option<Value>) -> RpcResult {
    let block_id: u64 = required(&params, 0, "block id")?;
    match ledger.get_block_by_id(block_id) {
        Some(block) => to_value(block),
        None => Err((RPC_NOT_FOUND, format!("Block {} not found", block_id))),
    }
}

/// Params: [private_key]
fn import_wallet(ledger: &Ledger, params: Option<Value>) -> RpcResult {
    let private_key: String = required(&params, 0, "private key")?;
    let wallet = ledger
        .import_wallet(&private_key)
        .map_err(|e| (RPC_INVALID_PARAMS, e.to_string()))?;
    to_value(wallet)
}

/// Params: [address]
fn get_wallet(ledger: &Ledger, params: Option<Value>) -> RpcResult {
    let address: String = required(&params, 0, "address")?;
    match ledger.get_wallet(&address) {
        Some(wallet) => to_value(wallet),
        None => Err((RPC_NOT_FOUND, format!("Wallet {} not found", address))),
    }
}

/// Params: [mode]
fn set_mining_mode(ledger: &Ledger, params: Option<Value>) -> RpcResult {
    let mode: String = required(&params, 0, "mining mode")?;
    let mode: MiningMode = mode.parse().map_err(|e| (RPC_INVALID_PARAMS, e))?;
    ledger.set_mining_mode(mode);
    Ok(json!(mode))
}

/// Params: [mode]
fn set_consensus_mode(ledger: &Ledger, params: Option<Value>) -> RpcResult {
    let mode: String = required(&params, 0, "consensus mode")?;
    let mode: ConsensusMode = mode.parse().map_err(|e| (RPC_INVALID_PARAMS, e))?;
    ledger.set_consensus_mode(mode);
    Ok(json!(mode))
}

/// Params: [count] (optional, at most [`MAX_TEST_DATA_COUNT`])
async fn add_test_data(ledger: &Ledger, params: Option<Value>) -> RpcResult {
    let count = match param(&params, 0) {
        Some(value) => value
            .as_u64()
            .and_then(|count| usize::try_from(count).ok())
            .filter(|count| *count <= MAX_TEST_DATA_COUNT)
            .ok_or_else(|| {
                (
                    RPC_INVALID_PARAMS,
                    format!("Invalid params: expected count up to {}", MAX_TEST_DATA_COUNT),
                )
            })?,
        None => DEFAULT_TEST_DATA_COUNT,
    };
    let blocks = ledger.add_test_data(count).await;
    Ok(json!({ "transactions": count, "blocks": blocks }))
}

/// Params: [exported_json]
fn import(ledger: &Ledger, params: Option<Value>) -> RpcResult {
    let data: String = required(&params, 0, "exported blockchain")?;
    ledger
        .import_blockchain(&data)
        .map(|()| json!(true))
        .map_err(|e| (RPC_REJECTED, e.to_string()))
}
