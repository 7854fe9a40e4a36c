//! Chain registry
//!
//! Static genesis-hash → chain metadata mapping, plus the relay and
//! asset-hub membership lists that decide which fetch worker a chain gets.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::balance::Balance;
use crate::error::AggregatorError;

pub const POLKADOT_GENESIS: &str =
    "0x91b171bb158e2d3848fa23a9f1c25182fb8e20313b2c1eb49219da7a70ce90c3";
pub const KUSAMA_GENESIS: &str =
    "0xb0a8d493285c2df73290dfb7e61f870f17b41801197a149ca93654499ea3dafe";
pub const WESTEND_GENESIS: &str =
    "0xe143f23803ac50e8f6f8e62695d1ce9e4e1d68aa36c1cd2cfd15340213f3423e";
pub const STATEMINT_GENESIS: &str =
    "0x68d56f15f85d3136970ec16946040bc1752654e906147f7e43e9d539d7c3de2f";
pub const STATEMINE_GENESIS: &str =
    "0x48239ef607d7928874027a43a67689209727dfb3d3dc5e5b03a39bdc2eda771a";
pub const WESTMINT_GENESIS: &str =
    "0x67f9723393ef76214df0118c34bbbd3dbebc8ed46a10973a8c969d48fe7598c9";
pub const ACALA_GENESIS: &str =
    "0xfc41b9bd8ef8fe53d58c7ea67c794c7ec9a73daf05e6d54b14ff6342c99ba64c";
pub const KARURA_GENESIS: &str =
    "0xbaf5aabe40646d11f0ee8abbdc64f4a4b7674925cba08e4a05ff9ebed6e2126b";
pub const ASTAR_GENESIS: &str =
    "0x9eb76c5184c4ab8679d2d5d819fdf90b9c001403e9e17da2e14b6d8aec4029c6";
pub const HYDRATION_GENESIS: &str =
    "0xafdc188f45c71dacbaa0b62e16a91f726c7b8699a9748cdf715459de6b7f366d";

pub const RELAY_CHAINS_GENESISHASH: [&str; 3] = [WESTEND_GENESIS, KUSAMA_GENESIS, POLKADOT_GENESIS];
pub const ASSET_HUBS: [&str; 3] = [WESTMINT_GENESIS, STATEMINE_GENESIS, STATEMINT_GENESIS];

/// Which fetch worker serves a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainCategory {
    Relay,
    AssetHub,
    MultiAsset,
    SingleToken,
}

/// How an asset's balance is stored on chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AssetKind {
    /// `pallet-assets`, keyed by numeric asset id
    PalletAsset,
    /// `orml-tokens`, keyed by the SCALE-encoded currency id
    #[serde(rename_all = "camelCase")]
    Token { currency_id_hex: String },
}

/// A whitelisted asset to fetch on a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    pub id: u32,
    pub symbol: String,
    pub decimal: u8,
    pub price_id: String,
    #[serde(flatten)]
    pub kind: AssetKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub name: String,
    pub display_name: String,
    pub genesis_hash: String,
    pub token: String,
    pub decimal: u8,
    pub ss58_prefix: u16,
    pub price_id: String,
    pub rpc_url: String,
    #[serde(default)]
    pub existential_deposit: Balance,
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
}

/// Selected chains split by fetch worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainPartition {
    pub relay: Vec<Chain>,
    pub asset_hubs: Vec<Chain>,
    pub multi_asset: Vec<Chain>,
    pub single_token: Vec<Chain>,
    /// Selected genesis hashes with no registry entry
    pub unknown: Vec<String>,
}

impl ChainPartition {
    pub fn len(&self) -> usize {
        self.relay.len() + self.asset_hubs.len() + self.multi_asset.len() + self.single_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: BTreeMap<String, Chain>,
}

/// TOML layout of a user-added chains file
#[derive(Debug, Deserialize)]
struct CustomChainsFile {
    #[serde(default, rename = "chain")]
    chains: Vec<Chain>,
}

impl ChainRegistry {
    pub fn new(chains: impl IntoIterator<Item = Chain>) -> Self {
        let chains = chains
            .into_iter()
            .map(|mut c| {
                c.genesis_hash = c.genesis_hash.to_lowercase();
                (c.genesis_hash.clone(), c)
            })
            .collect();
        Self { chains }
    }

    /// Registry of the chains shipped with the wallet
    pub fn builtin() -> Self {
        Self::new(builtin_chains())
    }

    /// Add chains from a TOML file, replacing builtin entries with the same genesis hash
    pub fn with_custom_chains(mut self, path: &Path) -> Result<Self, AggregatorError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AggregatorError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let parsed: CustomChainsFile = toml::from_str(&contents)
            .map_err(|e| AggregatorError::Config(format!("invalid chains file: {}", e)))?;

        for mut chain in parsed.chains {
            chain.genesis_hash = chain.genesis_hash.to_lowercase();
            log::info!("Registering custom chain {} ({})", chain.name, chain.genesis_hash);
            self.chains.insert(chain.genesis_hash.clone(), chain);
        }
        Ok(self)
    }

    /// Replace RPC endpoints, keyed by lowercase chain name
    pub fn with_rpc_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for chain in self.chains.values_mut() {
            if let Some(url) = overrides.get(&chain.name.to_lowercase()) {
                log::debug!("RPC override for {}: {}", chain.name, url);
                chain.rpc_url = url.clone();
            }
        }
        self
    }

    pub fn by_genesis(&self, genesis_hash: &str) -> Option<&Chain> {
        self.chains.get(&genesis_hash.to_lowercase())
    }

    pub fn by_name(&self, name: &str) -> Option<&Chain> {
        self.chains.values().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn name_of(&self, genesis_hash: &str) -> Option<&str> {
        self.by_genesis(genesis_hash).map(|c| c.name.as_str())
    }

    pub fn all(&self) -> impl Iterator<Item = &Chain> {
        self.chains.values()
    }

    pub fn category_of(&self, genesis_hash: &str) -> Option<ChainCategory> {
        self.by_genesis(genesis_hash).map(category_of_chain)
    }

    /// Split the selected chains by worker category
    pub fn partition(&self, selected: &[String]) -> ChainPartition {
        let mut partition = ChainPartition::default();

        for genesis_hash in selected {
            let Some(chain) = self.by_genesis(genesis_hash) else {
                partition.unknown.push(genesis_hash.clone());
                continue;
            };

            let target = match category_of_chain(chain) {
                ChainCategory::Relay => &mut partition.relay,
                ChainCategory::AssetHub => &mut partition.asset_hubs,
                ChainCategory::MultiAsset => &mut partition.multi_asset,
                ChainCategory::SingleToken => &mut partition.single_token,
            };
            if !target.iter().any(|c| c.genesis_hash == chain.genesis_hash) {
                target.push(chain.clone());
            }
        }

        partition
    }
}

pub fn category_of_chain(chain: &Chain) -> ChainCategory {
    let genesis = chain.genesis_hash.to_lowercase();
    if RELAY_CHAINS_GENESISHASH.contains(&genesis.as_str()) {
        ChainCategory::Relay
    } else if ASSET_HUBS.contains(&genesis.as_str()) {
        ChainCategory::AssetHub
    } else if !chain.assets.is_empty() {
        ChainCategory::MultiAsset
    } else {
        ChainCategory::SingleToken
    }
}

#[allow(clippy::too_many_arguments)]
fn chain(
    name: &str,
    display_name: &str,
    genesis_hash: &str,
    token: &str,
    decimal: u8,
    ss58_prefix: u16,
    price_id: &str,
    rpc_url: &str,
) -> Chain {
    Chain {
        name: name.to_string(),
        display_name: display_name.to_string(),
        genesis_hash: genesis_hash.to_string(),
        token: token.to_string(),
        decimal,
        ss58_prefix,
        price_id: price_id.to_string(),
        rpc_url: rpc_url.to_string(),
        existential_deposit: Balance::ZERO,
        assets: Vec::new(),
    }
}

fn with_ed(mut chain: Chain, existential_deposit: u128) -> Chain {
    chain.existential_deposit = Balance(existential_deposit);
    chain
}

fn pallet_asset(id: u32, symbol: &str, decimal: u8, price_id: &str) -> AssetDescriptor {
    AssetDescriptor {
        id,
        symbol: symbol.to_string(),
        decimal,
        price_id: price_id.to_string(),
        kind: AssetKind::PalletAsset,
    }
}

fn orml_token(id: u32, symbol: &str, decimal: u8, price_id: &str, currency_id_hex: &str) -> AssetDescriptor {
    AssetDescriptor {
        id,
        symbol: symbol.to_string(),
        decimal,
        price_id: price_id.to_string(),
        kind: AssetKind::Token {
            currency_id_hex: currency_id_hex.to_string(),
        },
    }
}

fn builtin_chains() -> Vec<Chain> {
    let mut statemint = chain(
        "polkadotassethub", "Polkadot Asset Hub", STATEMINT_GENESIS, "DOT", 10, 0, "polkadot",
        "https://polkadot-asset-hub-rpc.polkadot.io",
    );
    statemint.existential_deposit = Balance(100_000_000);
    statemint.assets = vec![
        pallet_asset(1984, "USDt", 6, "tether"),
        pallet_asset(1337, "USDC", 6, "usd-coin"),
    ];

    let mut statemine = chain(
        "kusamaassethub", "Kusama Asset Hub", STATEMINE_GENESIS, "KSM", 12, 2, "kusama",
        "https://kusama-asset-hub-rpc.polkadot.io",
    );
    statemine.existential_deposit = Balance(3_333_333);
    statemine.assets = vec![
        pallet_asset(1984, "USDt", 6, "tether"),
        pallet_asset(8, "RMRK", 10, "rmrk"),
    ];

    let mut westmint = chain(
        "westendassethub", "Westend Asset Hub", WESTMINT_GENESIS, "WND", 12, 42, "",
        "https://westend-asset-hub-rpc.polkadot.io",
    );
    westmint.existential_deposit = Balance(1_000_000_000);
    westmint.assets = vec![pallet_asset(1984, "USDt", 6, "tether")];

    // orml CurrencyId::Token(TokenSymbol) encodes as [0x00, symbol index]
    let mut acala = chain(
        "acala", "Acala", ACALA_GENESIS, "ACA", 12, 10, "acala",
        "https://acala-rpc-0.aca-api.network",
    );
    acala.existential_deposit = Balance(100_000_000_000);
    acala.assets = vec![
        orml_token(1, "aUSD", 12, "acala-dollar", "0x0001"),
        orml_token(2, "DOT", 10, "polkadot", "0x0002"),
        orml_token(3, "LDOT", 10, "liquid-staking-dot", "0x0003"),
    ];

    let mut karura = chain(
        "karura", "Karura", KARURA_GENESIS, "KAR", 12, 8, "karura",
        "https://karura-rpc-0.aca-api.network",
    );
    karura.existential_deposit = Balance(100_000_000_000);
    karura.assets = vec![
        orml_token(129, "aUSD", 12, "acala-dollar", "0x0081"),
        orml_token(130, "KSM", 12, "kusama", "0x0082"),
        orml_token(131, "LKSM", 12, "liquid-ksm", "0x0083"),
    ];

    vec![
        with_ed(chain("polkadot", "Polkadot", POLKADOT_GENESIS, "DOT", 10, 0, "polkadot", "https://rpc.polkadot.io"), 10_000_000_000),
        with_ed(chain("kusama", "Kusama", KUSAMA_GENESIS, "KSM", 12, 2, "kusama", "https://kusama-rpc.polkadot.io"), 333_333_333),
        with_ed(chain("westend", "Westend", WESTEND_GENESIS, "WND", 12, 42, "", "https://westend-rpc.polkadot.io"), 10_000_000_000),
        statemint,
        statemine,
        westmint,
        acala,
        karura,
        with_ed(chain("astar", "Astar", ASTAR_GENESIS, "ASTR", 18, 5, "astar", "https://rpc.astar.network"), 1_000_000),
        with_ed(chain("hydradx", "Hydration", HYDRATION_GENESIS, "HDX", 12, 63, "hydradx", "https://rpc.hydradx.cloud"), 1_000_000_000_000),
    ]
}
