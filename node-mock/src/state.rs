//! In-memory chain state served by the mock node
//!
//! Storage is a flat map of hex key to hex SCALE value, which is all the
//! balance queries ever read. Runtime calls return canned results.

use std::collections::HashMap;
use std::sync::RwLock;

/// Normalize to lowercase `0x`-prefixed hex
pub fn normalize_hex(value: &str) -> String {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", digits.to_lowercase())
}

#[derive(Debug)]
pub struct NodeState {
    genesis_hash: String,
    chain_name: String,
    storage: RwLock<HashMap<String, String>>,
    /// (method, hex argument) -> hex result; an empty argument matches any call
    calls: RwLock<HashMap<(String, String), String>>,
}

impl NodeState {
    pub fn new(genesis_hash: &str, chain_name: &str) -> Self {
        Self {
            genesis_hash: normalize_hex(genesis_hash),
            chain_name: chain_name.to_string(),
            storage: RwLock::new(HashMap::new()),
            calls: RwLock::new(HashMap::new()),
        }
    }

    pub fn genesis_hash(&self) -> &str {
        &self.genesis_hash
    }

    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    pub fn put_storage(&self, key: &str, value: &str) {
        let mut storage = match self.storage.write() {
            Ok(storage) => storage,
            Err(poisoned) => poisoned.into_inner(),
        };
        storage.insert(normalize_hex(key), normalize_hex(value));
    }

    /// Store raw bytes under a raw key
    pub fn put_storage_bytes(&self, key: &[u8], value: &[u8]) {
        self.put_storage(&hex::encode(key), &hex::encode(value));
    }

    pub fn remove_storage(&self, key: &str) {
        let mut storage = match self.storage.write() {
            Ok(storage) => storage,
            Err(poisoned) => poisoned.into_inner(),
        };
        storage.remove(&normalize_hex(key));
    }

    pub fn storage(&self, key: &str) -> Option<String> {
        let storage = match self.storage.read() {
            Ok(storage) => storage,
            Err(poisoned) => poisoned.into_inner(),
        };
        storage.get(&normalize_hex(key)).cloned()
    }

    pub fn storage_len(&self) -> usize {
        match self.storage.read() {
            Ok(storage) => storage.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn put_call(&self, method: &str, data: Option<&str>, result: &str) {
        let mut calls = match self.calls.write() {
            Ok(calls) => calls,
            Err(poisoned) => poisoned.into_inner(),
        };
        let data = data.map(normalize_hex).unwrap_or_default();
        calls.insert((method.to_string(), data), normalize_hex(result));
    }

    /// Exact (method, argument) match first, then a method-wide result
    pub fn call(&self, method: &str, data: &str) -> Option<String> {
        let calls = match self.calls.read() {
            Ok(calls) => calls,
            Err(poisoned) => poisoned.into_inner(),
        };
        calls
            .get(&(method.to_string(), normalize_hex(data)))
            .or_else(|| calls.get(&(method.to_string(), String::new())))
            .cloned()
    }
}
