//! Axum handlers: JSON-RPC dispatch and seeding endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::NodeState;
use crate::types::*;

/// Shared application state
pub type AppState = Arc<NodeState>;

/// Error type for the non-RPC endpoints
pub enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, message).into_response()
    }
}

/// POST /
/// JSON-RPC 2.0 endpoint; errors travel inside the response body
pub async fn rpc(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    log::debug!("RPC {} {}", request.method, request.params);

    let response = match dispatch(&state, &request.method, &request.params) {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(error) => {
            log::debug!("RPC {} failed: {}", request.method, error);
            JsonRpcResponse::failure(request.id, error)
        }
    };
    Json(response)
}

pub fn dispatch(state: &NodeState, method: &str, params: &Value) -> Result<Value, JsonRpcError> {
    match method {
        "chain_getBlockHash" => {
            // Only block zero is known; no argument means the best block
            let number = params.get(0).and_then(Value::as_u64);
            match number {
                Some(0) | None => Ok(json!(state.genesis_hash())),
                Some(_) => Ok(Value::Null),
            }
        }
        "system_chain" => Ok(json!(state.chain_name())),
        "state_getStorage" => {
            let key = string_param(params, 0, "storage key")?;
            Ok(state.storage(key).map(Value::String).unwrap_or(Value::Null))
        }
        "state_queryStorageAt" => {
            let keys = params
                .get(0)
                .and_then(Value::as_array)
                .ok_or_else(|| JsonRpcError::invalid_params("expected an array of storage keys"))?;

            let mut changes = Vec::with_capacity(keys.len());
            for key in keys {
                let key = key
                    .as_str()
                    .ok_or_else(|| JsonRpcError::invalid_params("storage keys must be strings"))?;
                changes.push((key.to_string(), state.storage(key)));
            }

            let change_set = StorageChangeSet {
                block: state.genesis_hash().to_string(),
                changes,
            };
            Ok(json!([change_set]))
        }
        "state_call" => {
            let name = string_param(params, 0, "runtime api name")?;
            let data = params.get(1).and_then(Value::as_str).unwrap_or("0x");
            state
                .call(name, data)
                .map(Value::String)
                .ok_or_else(|| JsonRpcError {
                    code: JsonRpcError::SERVER_ERROR,
                    message: format!("Runtime call {} is not available", name),
                })
        }
        other => Err(JsonRpcError::method_not_found(other)),
    }
}

fn string_param<'a>(params: &'a Value, index: usize, what: &str) -> Result<&'a str, JsonRpcError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("missing {}", what)))
}

// ============================================================================
// SEEDING ENDPOINTS (not part of the Substrate RPC surface)
// ============================================================================

/// POST /mock/storage
/// Insert or replace raw storage entries
pub async fn seed_storage(
    State(state): State<AppState>,
    Json(req): Json<SeedStorageRequest>,
) -> Result<Json<SeedResponse>, ApiError> {
    for entry in &req.entries {
        if hex::decode(entry.key.trim_start_matches("0x")).is_err()
            || hex::decode(entry.value.trim_start_matches("0x")).is_err()
        {
            return Err(ApiError::BadRequest(format!("Invalid hex in entry {}", entry.key)));
        }
    }
    for entry in &req.entries {
        state.put_storage(&entry.key, &entry.value);
    }

    log::info!("Seeded {} storage entries", req.entries.len());
    Ok(Json(SeedResponse {
        stored: req.entries.len(),
    }))
}

/// POST /mock/call
/// Register the result of a runtime call
pub async fn seed_call(
    State(state): State<AppState>,
    Json(req): Json<SeedCallRequest>,
) -> Result<Json<SeedResponse>, ApiError> {
    if hex::decode(req.result.trim_start_matches("0x")).is_err() {
        return Err(ApiError::BadRequest("Invalid hex result".to_string()));
    }
    state.put_call(&req.method, req.data.as_deref(), &req.result);

    log::info!("Seeded runtime call {}", req.method);
    Ok(Json(SeedResponse { stored: 1 }))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
