//! Fetch workers
//!
//! One worker run covers one chain and every requested address. Requests
//! and replies are tagged, validated structures; the reply's wire form is a
//! JSON string keyed by address with every number written as a decimal
//! string, and an empty string when nothing was found.
//!
//! - `relay.rs` - native token on relay and single-token chains
//! - `asset_hub.rs` - native token plus whitelisted `Assets` pallet balances
//! - `multi_asset.rs` - native token plus whitelisted `Tokens` pallet balances

pub mod asset_hub;
pub mod multi_asset;
pub mod relay;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::balance::{AssetBalance, Balance, BalanceBreakdown};
use crate::cache::ChainBalances;
use crate::chains::{AssetDescriptor, AssetKind, Chain, ChainCategory};
use crate::error::FetchError;
use crate::rpc::{ss58, AccountId, ChainApi};

/// Batch request handed to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum WorkerRequest {
    #[serde(rename_all = "camelCase")]
    Relay {
        addresses: Vec<String>,
        chain_name: String,
    },
    #[serde(rename_all = "camelCase")]
    AssetHub {
        addresses: Vec<String>,
        chain_name: String,
        assets_to_be_fetched: Vec<AssetDescriptor>,
    },
    #[serde(rename_all = "camelCase")]
    MultiAsset {
        addresses: Vec<String>,
        chain_name: String,
        assets_to_be_fetched: Vec<AssetDescriptor>,
    },
}

impl WorkerRequest {
    /// Build the request a chain's category calls for
    pub fn for_chain(chain: &Chain, category: ChainCategory, addresses: Vec<String>) -> Self {
        let chain_name = chain.name.clone();
        match category {
            ChainCategory::Relay | ChainCategory::SingleToken => WorkerRequest::Relay {
                addresses,
                chain_name,
            },
            ChainCategory::AssetHub => WorkerRequest::AssetHub {
                addresses,
                chain_name,
                assets_to_be_fetched: chain.assets.clone(),
            },
            ChainCategory::MultiAsset => WorkerRequest::MultiAsset {
                addresses,
                chain_name,
                assets_to_be_fetched: chain.assets.clone(),
            },
        }
    }

    pub fn from_json(json: &str) -> Result<Self, FetchError> {
        serde_json::from_str(json).map_err(|e| FetchError::Malformed(e.to_string()))
    }

    pub fn addresses(&self) -> &[String] {
        match self {
            WorkerRequest::Relay { addresses, .. }
            | WorkerRequest::AssetHub { addresses, .. }
            | WorkerRequest::MultiAsset { addresses, .. } => addresses,
        }
    }

    pub fn chain_name(&self) -> &str {
        match self {
            WorkerRequest::Relay { chain_name, .. }
            | WorkerRequest::AssetHub { chain_name, .. }
            | WorkerRequest::MultiAsset { chain_name, .. } => chain_name,
        }
    }

    pub fn assets(&self) -> &[AssetDescriptor] {
        match self {
            WorkerRequest::Relay { .. } => &[],
            WorkerRequest::AssetHub {
                assets_to_be_fetched,
                ..
            }
            | WorkerRequest::MultiAsset {
                assets_to_be_fetched,
                ..
            } => assets_to_be_fetched,
        }
    }

    /// Check the request against the chain it is about to run on
    pub fn validate(&self, chain: &Chain) -> Result<(), FetchError> {
        if !self.chain_name().eq_ignore_ascii_case(&chain.name) {
            return Err(FetchError::Malformed(format!(
                "request for {} sent to {}",
                self.chain_name(),
                chain.name
            )));
        }
        if self.addresses().is_empty() {
            return Err(FetchError::Malformed("no addresses".into()));
        }

        let wrong_kind = match self {
            WorkerRequest::Relay { .. } => None,
            WorkerRequest::AssetHub {
                assets_to_be_fetched,
                ..
            } => assets_to_be_fetched
                .iter()
                .find(|a| a.kind != AssetKind::PalletAsset),
            WorkerRequest::MultiAsset {
                assets_to_be_fetched,
                ..
            } => assets_to_be_fetched
                .iter()
                .find(|a| !matches!(a.kind, AssetKind::Token { .. })),
        };
        match wrong_kind {
            Some(asset) => Err(FetchError::Malformed(format!(
                "asset {} ({}) cannot be fetched by this worker",
                asset.id, asset.symbol
            ))),
            None => Ok(()),
        }
    }
}

/// One record of a worker reply; numerics are decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<u32>,
    pub total_balance: String,
    pub chain_name: String,
    pub decimal: String,
    pub genesis_hash: String,
    pub price_id: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<BalanceBreakdown>,
}

impl MessageBody {
    pub(crate) fn native(chain: &Chain, breakdown: BalanceBreakdown) -> Self {
        Self {
            asset_id: None,
            total_balance: breakdown.total().to_string(),
            chain_name: chain.name.clone(),
            decimal: chain.decimal.to_string(),
            genesis_hash: chain.genesis_hash.clone(),
            price_id: chain.price_id.clone(),
            token: chain.token.clone(),
            breakdown: Some(breakdown),
        }
    }

    pub(crate) fn asset(chain: &Chain, asset: &AssetDescriptor, total: Balance) -> Self {
        Self {
            asset_id: Some(asset.id),
            total_balance: total.to_string(),
            chain_name: chain.name.clone(),
            decimal: asset.decimal.to_string(),
            genesis_hash: chain.genesis_hash.clone(),
            price_id: asset.price_id.clone(),
            token: asset.symbol.clone(),
            breakdown: None,
        }
    }

    pub fn into_record(self) -> Result<AssetBalance, FetchError> {
        let total_balance = self
            .total_balance
            .parse::<Balance>()
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        let decimal = self
            .decimal
            .parse::<u8>()
            .map_err(|_| FetchError::Malformed(format!("invalid decimal '{}'", self.decimal)))?;

        Ok(AssetBalance {
            asset_id: self.asset_id,
            total_balance,
            chain_name: self.chain_name,
            decimal,
            genesis_hash: self.genesis_hash,
            price_id: self.price_id,
            token: self.token,
            breakdown: self.breakdown,
        })
    }
}

/// Worker reply, keyed by address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerMessage(pub BTreeMap<String, Vec<MessageBody>>);

impl WorkerMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, address: &str, body: MessageBody) {
        self.0.entry(address.to_string()).or_default().push(body);
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Wire form; an empty reply is the empty string
    pub fn to_wire(&self) -> Result<String, FetchError> {
        if self.is_empty() {
            return Ok(String::new());
        }
        serde_json::to_string(&self.0).map_err(|e| FetchError::Malformed(e.to_string()))
    }

    pub fn from_wire(wire: &str) -> Result<Self, FetchError> {
        if wire.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(wire).map_err(|e| FetchError::Malformed(e.to_string()))
    }

    /// Typed records for one chain.
    ///
    /// Every record must carry `genesis_hash`; a reply mixing chains is rejected.
    pub fn into_balances(self, genesis_hash: &str) -> Result<ChainBalances, FetchError> {
        let mut balances = ChainBalances::new();
        for (address, bodies) in self.0 {
            let mut records = Vec::with_capacity(bodies.len());
            for body in bodies {
                if !body.genesis_hash.eq_ignore_ascii_case(genesis_hash) {
                    return Err(FetchError::Malformed(format!(
                        "record for {} in a reply for {}",
                        body.genesis_hash, genesis_hash
                    )));
                }
                records.push(body.into_record()?);
            }
            balances.insert(address, records);
        }
        Ok(balances)
    }
}

/// Run one worker to completion on the current task
pub async fn run_worker(
    request: &WorkerRequest,
    chain: &Chain,
    api: &dyn ChainApi,
) -> Result<WorkerMessage, FetchError> {
    request.validate(chain)?;

    let genesis = api
        .genesis_hash()
        .await
        .map_err(|e| FetchError::rpc(&chain.name, e))?;
    if !genesis.eq_ignore_ascii_case(&chain.genesis_hash) {
        return Err(FetchError::GenesisMismatch {
            chain: chain.name.clone(),
            actual: genesis,
        });
    }

    let accounts = decode_addresses(request.addresses());
    if accounts.is_empty() {
        return Err(FetchError::Malformed(format!(
            "no valid addresses for {}",
            chain.name
        )));
    }

    let result = match request {
        WorkerRequest::Relay { .. } => relay::fetch(api, chain, &accounts).await,
        WorkerRequest::AssetHub {
            assets_to_be_fetched,
            ..
        } => asset_hub::fetch(api, chain, &accounts, assets_to_be_fetched).await,
        WorkerRequest::MultiAsset {
            assets_to_be_fetched,
            ..
        } => multi_asset::fetch(api, chain, &accounts, assets_to_be_fetched).await,
    };

    result.map_err(|e| FetchError::rpc(&chain.name, e))
}

/// Run a worker on its own task, bounded by `timeout`.
///
/// The handle resolves exactly once with the reply for the whole batch.
pub fn spawn_worker(
    request: WorkerRequest,
    chain: Chain,
    api: Arc<dyn ChainApi>,
    timeout: Duration,
) -> JoinHandle<Result<WorkerMessage, FetchError>> {
    tokio::spawn(async move {
        log::debug!(
            "Worker for {} started with {} address(es)",
            chain.name,
            request.addresses().len()
        );
        match tokio::time::timeout(timeout, run_worker(&request, &chain, api.as_ref())).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                chain: chain.name.clone(),
                secs: timeout.as_secs(),
            }),
        }
    })
}

/// Decode SS58 addresses, dropping the ones that do not parse
fn decode_addresses(addresses: &[String]) -> Vec<(String, AccountId)> {
    addresses
        .iter()
        .filter_map(|address| match ss58::account_id(address) {
            Ok(account) => Some((address.clone(), account)),
            Err(e) => {
                log::warn!("Skipping invalid address {}: {}", address, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::chains::{AssetDescriptor, AssetKind, Chain};

    pub const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    pub const GENESIS: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";

    pub fn test_chain(name: &str) -> Chain {
        Chain {
            name: name.to_string(),
            display_name: name.to_string(),
            genesis_hash: GENESIS.to_string(),
            token: "UNIT".to_string(),
            decimal: 12,
            ss58_prefix: 42,
            price_id: "unit".to_string(),
            rpc_url: "http://127.0.0.1:9944".to_string(),
            existential_deposit: crate::balance::Balance(10),
            assets: Vec::new(),
        }
    }

    pub fn pallet_asset(id: u32, symbol: &str) -> AssetDescriptor {
        AssetDescriptor {
            id,
            symbol: symbol.to_string(),
            decimal: 6,
            price_id: symbol.to_lowercase(),
            kind: AssetKind::PalletAsset,
        }
    }

    pub fn token(id: u32, symbol: &str, currency_id_hex: &str) -> AssetDescriptor {
        AssetDescriptor {
            id,
            symbol: symbol.to_string(),
            decimal: 12,
            price_id: symbol.to_lowercase(),
            kind: AssetKind::Token {
                currency_id_hex: currency_id_hex.to_string(),
            },
        }
    }
}
