//! Chain RPC plumbing
//!
//! - `ss58.rs` - address codec
//! - `keys.rs` - storage key hashing
//! - `scale.rs` - SCALE layouts of the values we read
//! - `client.rs` - `ChainApi` seam and the HTTP JSON-RPC client
//! - `queries.rs` - typed batched reads

pub mod client;
pub mod keys;
pub mod queries;
pub mod scale;
pub mod ss58;

pub use client::{ApiProvider, ChainApi, HttpApiProvider, RpcClient};
pub use ss58::AccountId;
