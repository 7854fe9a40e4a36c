//! Error types for balance aggregation
//!
//! Chain RPC failures, cache persistence problems and malformed worker
//! messages each get their own enum so the aggregator can keep them apart
//! from "not loaded yet".

use thiserror::Error;

/// Top-level error for aggregator operations
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Unknown asset {0}")]
    UnknownAsset(u32),

    #[error("Already fetching {0}")]
    AlreadyFetching(String),

    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Price feed error: {0}")]
    PriceFeed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache actor stopped")]
    CacheClosed,
}

/// Cache persistence errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// JSON-RPC transport and decoding errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Node returned error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("SCALE decode error: {0}")]
    Decode(#[from] codec::Error),

    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// SS58 address errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("not base58: {0}")]
    Base58(String),

    #[error("unsupported length {0}")]
    Length(usize),

    #[error("bad checksum")]
    Checksum,

    #[error("invalid prefix {0}")]
    Prefix(u16),
}

/// Why a worker run ended without a message
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("RPC failure on {chain}: {reason}")]
    Rpc { chain: String, reason: String },

    #[error("Worker for {chain} timed out after {secs}s")]
    Timeout { chain: String, secs: u64 },

    #[error("No chain metadata for {0}")]
    MissingChain(String),

    #[error("Malformed worker message: {0}")]
    Malformed(String),

    #[error("Endpoint for {chain} serves genesis {actual}")]
    GenesisMismatch { chain: String, actual: String },

    #[error("Worker for {0} aborted")]
    Aborted(String),
}

impl FetchError {
    pub fn rpc(chain: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Rpc {
            chain: chain.into(),
            reason: err.to_string(),
        }
    }
}
