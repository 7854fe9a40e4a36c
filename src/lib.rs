//! PolkaGate balances: multi-chain balance aggregation and caching
//!
//! Fetches the balances of a set of accounts on many Substrate chains,
//! merges them into one persisted envelope and serves a per-address,
//! per-chain view that keeps "not loaded", "loading" and "failed" apart
//! from a real zero.
//!
//! # Architecture
//!
//! - **Chain registry**: genesis hash to chain metadata, asset whitelists
//!   and the worker category of each chain
//! - **Fetch workers**: one isolated task per chain covering every address
//!   in a single batched storage read
//! - **Cache actor**: the only writer of the envelope; merges from chains
//!   finishing together are applied one by one
//! - **Aggregator**: staleness check, fan-out, merge-as-they-arrive and the
//!   consolidated view
//!
//! # Example
//!
//! ```ignore
//! use polkagate_balances::{AggregatorConfig, BalanceAggregator};
//! use polkagate_balances::chains::POLKADOT_GENESIS;
//!
//! let aggregator = BalanceAggregator::from_config(&AggregatorConfig::from_env())?;
//!
//! let addresses = vec!["15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5".to_string()];
//! let chains = vec![POLKADOT_GENESIS.to_string()];
//! let report = aggregator.refresh(&addresses, &chains).await?;
//!
//! let view = aggregator.view(&addresses, Some(&chains));
//! ```

// Public modules
pub mod aggregator;
pub mod balance;
pub mod cache;
pub mod chains;
pub mod config;
pub mod error;
pub mod fetch_state;
pub mod pool;
pub mod prices;
pub mod rpc;
pub mod staleness;
pub mod workers;

// Re-exports for convenience
pub use aggregator::{BalanceAggregator, BalancesView, ChainOutcome, OutcomeStatus, RefreshReport, RefreshStatus};
pub use balance::{AccountBalances, AssetBalance, AssetInfo, Balance, BalanceBreakdown, BalanceState};
pub use cache::{CacheEnvelope, CacheHandle, CacheStore, FileStore, MemoryStore, ASSETS_NAME_IN_STORAGE};
pub use chains::{Chain, ChainCategory, ChainRegistry};
pub use config::AggregatorConfig;
pub use error::{AddressError, AggregatorError, FetchError, RpcError, StorageError};
pub use fetch_state::{FetchClaim, FetchKey, FetchKind, FetchStateRegistry, FetchStatus};
pub use prices::{PriceFeed, PriceSnapshot};
pub use rpc::{ApiProvider, ChainApi, HttpApiProvider, RpcClient};
pub use staleness::StalenessPolicy;
pub use workers::{spawn_worker, WorkerMessage, WorkerRequest};

pub type Result<T> = std::result::Result<T, AggregatorError>;
