//! Substrate JSON-RPC client
//!
//! `ChainApi` is the seam the fetch workers talk through; `RpcClient` is the
//! HTTP implementation. Tests substitute an in-memory implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::chains::Chain;
use crate::error::RpcError;

#[async_trait]
pub trait ChainApi: Send + Sync {
    /// Hash of block zero, `0x`-prefixed lowercase hex
    async fn genesis_hash(&self) -> Result<String, RpcError>;

    /// Read several storage keys at the best block in one request
    async fn storage_batch(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>, RpcError>;

    async fn storage(&self, key: &[u8]) -> Result<Option<Vec<u8>>, RpcError> {
        let mut values = self.storage_batch(&[key.to_vec()]).await?;
        Ok(values.pop().flatten())
    }

    /// Runtime API call (`state_call`)
    async fn call(&self, method: &str, data: &[u8]) -> Result<Vec<u8>, RpcError>;
}

/// Hands out a `ChainApi` per chain
pub trait ApiProvider: Send + Sync {
    fn api_for(&self, chain: &Chain) -> Result<Arc<dyn ChainApi>, RpcError>;
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct StorageChangeSet {
    changes: Vec<(String, Option<String>)>,
}

pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        log::debug!("RPC {} -> {}", method, self.url);
        let response: RpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl ChainApi for RpcClient {
    async fn genesis_hash(&self) -> Result<String, RpcError> {
        let hash: String = self.request("chain_getBlockHash", json!([0])).await?;
        Ok(hash.to_lowercase())
    }

    async fn storage_batch(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>, RpcError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let hex_keys: Vec<String> = keys.iter().map(|k| format!("0x{}", hex::encode(k))).collect();
        let change_sets: Vec<StorageChangeSet> = self
            .request("state_queryStorageAt", json!([hex_keys]))
            .await?;

        let mut found: HashMap<String, Option<String>> = HashMap::new();
        for set in change_sets {
            for (key, value) in set.changes {
                found.insert(key.to_lowercase(), value);
            }
        }

        hex_keys
            .iter()
            .map(|key| -> Result<Option<Vec<u8>>, RpcError> {
                match found.get(key).cloned().flatten() {
                    Some(value) => Ok(Some(decode_hex(&value)?)),
                    None => Ok(None),
                }
            })
            .collect()
    }

    async fn call(&self, method: &str, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let result: String = self
            .request("state_call", json!([method, format!("0x{}", hex::encode(data))]))
            .await?;
        decode_hex(&result)
    }
}

fn decode_hex(value: &str) -> Result<Vec<u8>, RpcError> {
    Ok(hex::decode(value.trim_start_matches("0x"))?)
}

/// `ApiProvider` backed by `RpcClient`s, one per endpoint URL
pub struct HttpApiProvider {
    client: reqwest::Client,
    clients: RwLock<HashMap<String, Arc<RpcClient>>>,
}

impl HttpApiProvider {
    pub fn new(request_timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            clients: RwLock::new(HashMap::new()),
        })
    }
}

impl ApiProvider for HttpApiProvider {
    fn api_for(&self, chain: &Chain) -> Result<Arc<dyn ChainApi>, RpcError> {
        // Fast path: client for this endpoint already exists (read lock)
        {
            let clients = self
                .clients
                .read()
                .map_err(|_| RpcError::InvalidResponse("client cache poisoned".into()))?;
            if let Some(client) = clients.get(&chain.rpc_url) {
                return Ok(client.clone());
            }
        }

        let mut clients = self
            .clients
            .write()
            .map_err(|_| RpcError::InvalidResponse("client cache poisoned".into()))?;
        let client = clients
            .entry(chain.rpc_url.clone())
            .or_insert_with(|| {
                log::info!("Creating RPC client for {} at {}", chain.name, chain.rpc_url);
                Arc::new(RpcClient::with_client(self.client.clone(), chain.rpc_url.clone()))
            })
            .clone();
        Ok(client)
    }
}
