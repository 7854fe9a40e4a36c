//! Balance aggregator
//!
//! Fans out one worker per selected chain, merges each reply into the cache
//! as soon as it arrives, and combines the cache with the fetch-state
//! registry into a per-address, per-chain view.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use crate::balance::{AccountBalances, AssetBalance, AssetInfo, Balance, BalanceState};
use crate::cache::{CacheEnvelope, CacheHandle, FileStore, ASSETS_NAME_IN_STORAGE};
use crate::chains::{category_of_chain, Chain, ChainRegistry};
use crate::config::AggregatorConfig;
use crate::error::{AggregatorError, FetchError};
use crate::fetch_state::{FetchClaim, FetchKey, FetchKind, FetchStateRegistry, FetchStatus};
use crate::pool;
use crate::prices::{PriceFeed, PriceSnapshot};
use crate::rpc::scale::AssetAccountStatus;
use crate::rpc::{queries, ss58, ApiProvider, HttpApiProvider};
use crate::staleness::{now_millis, StalenessPolicy};
use crate::workers::{spawn_worker, WorkerMessage, WorkerRequest};
use crate::Result;

/// Balance states of every requested slot: address -> genesis hash -> state
pub type BalancesView = BTreeMap<String, BTreeMap<String, BalanceState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RefreshStatus {
    /// Workers were dispatched
    Ran,
    /// The cache was fresh and the chain selection unchanged
    SkippedFresh,
    NoAddresses,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OutcomeStatus {
    Merged { slots: usize },
    /// The worker found nothing; cached data was left alone
    Empty,
    AlreadyFetching,
    Failed { error: String },
    MissingChain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainOutcome {
    pub genesis_hash: String,
    pub chain_name: Option<String>,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub run_id: String,
    pub status: RefreshStatus,
    pub outcomes: Vec<ChainOutcome>,
}

impl RefreshReport {
    fn new(run_id: String, status: RefreshStatus) -> Self {
        Self {
            run_id,
            status,
            outcomes: Vec::new(),
        }
    }

    pub fn skipped(&self) -> bool {
        self.status != RefreshStatus::Ran
    }

    pub fn outcome(&self, genesis_hash: &str) -> Option<&OutcomeStatus> {
        self.outcomes
            .iter()
            .find(|o| o.genesis_hash.eq_ignore_ascii_case(genesis_hash))
            .map(|o| &o.status)
    }
}

pub struct BalanceAggregator {
    registry: Arc<ChainRegistry>,
    apis: Arc<dyn ApiProvider>,
    cache: CacheHandle,
    fetch_state: FetchStateRegistry,
    policy: StalenessPolicy,
    worker_timeout: Duration,
    prices: PriceFeed,
    currency: String,
    last_selection: Mutex<Option<Vec<String>>>,
}

impl BalanceAggregator {
    pub fn new(
        registry: Arc<ChainRegistry>,
        apis: Arc<dyn ApiProvider>,
        cache: CacheHandle,
        fetch_state: FetchStateRegistry,
        policy: StalenessPolicy,
        config: &AggregatorConfig,
    ) -> Self {
        Self {
            registry,
            apis,
            cache,
            fetch_state,
            policy,
            worker_timeout: config.worker_timeout,
            prices: PriceFeed::new(config.price_url.clone()),
            currency: config.currency.clone(),
            last_selection: Mutex::new(None),
        }
    }

    /// File-backed cache and HTTP RPC clients. Must be called inside a tokio runtime.
    pub fn from_config(config: &AggregatorConfig) -> Result<Self> {
        let registry = config.chain_registry()?;
        let store = Arc::new(FileStore::new_with_base_dir(config.cache_dir.clone()));
        let cache = CacheHandle::spawn(store, ASSETS_NAME_IN_STORAGE)?;
        let apis = Arc::new(HttpApiProvider::new(config.worker_timeout)?);

        log::info!(
            "Balance aggregator ready with {} chain(s)",
            registry.all().count()
        );
        Ok(Self::new(
            Arc::new(registry),
            apis,
            cache,
            FetchStateRegistry::new(),
            StalenessPolicy::new(config.validity),
            config,
        ))
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn fetch_state(&self) -> &FetchStateRegistry {
        &self.fetch_state
    }

    /// Refresh balances unless the cache is fresh and the selection is unchanged
    pub async fn refresh(&self, addresses: &[String], selected: &[String]) -> Result<RefreshReport> {
        self.run(addresses, selected, false).await
    }

    /// Refresh balances regardless of cache age
    pub async fn force_refresh(
        &self,
        addresses: &[String],
        selected: &[String],
    ) -> Result<RefreshReport> {
        self.run(addresses, selected, true).await
    }

    async fn run(&self, addresses: &[String], selected: &[String], force: bool) -> Result<RefreshReport> {
        let run_id = Uuid::new_v4().to_string();

        let addresses = normalize_addresses(addresses);
        if addresses.is_empty() {
            log::info!("[{}] No addresses to fetch balances for", run_id);
            return Ok(RefreshReport::new(run_id, RefreshStatus::NoAddresses));
        }

        let selection = normalize_selection(selected);
        let selection_changed = self.swap_selection(&selection);
        if !force && !selection_changed && self.policy.should_skip_refresh(self.cache.time_stamp()) {
            log::debug!("[{}] Cached balances are fresh, skipping refresh", run_id);
            return Ok(RefreshReport::new(run_id, RefreshStatus::SkippedFresh));
        }

        let partition = self.registry.partition(&selection);
        let mut report = RefreshReport::new(run_id.clone(), RefreshStatus::Ran);

        for genesis_hash in &partition.unknown {
            log::error!("[{}] Can not find chain by genesis hash {}", run_id, genesis_hash);
            report.outcomes.push(ChainOutcome {
                genesis_hash: genesis_hash.clone(),
                chain_name: None,
                status: OutcomeStatus::MissingChain,
            });
        }

        let chains = partition
            .relay
            .iter()
            .chain(&partition.asset_hubs)
            .chain(&partition.multi_asset)
            .chain(&partition.single_token);

        let mut pending = FuturesUnordered::new();
        for chain in chains {
            let keys: Vec<FetchKey> = addresses
                .iter()
                .map(|a| FetchKey::new(a, &chain.genesis_hash, FetchKind::Assets))
                .collect();

            let Some(claim) = self.fetch_state.claim_all(keys) else {
                log::info!("[{}] {} is already being fetched", run_id, chain.name);
                report.outcomes.push(outcome(chain, OutcomeStatus::AlreadyFetching));
                continue;
            };

            let api = match self.apis.api_for(chain) {
                Ok(api) => api,
                Err(e) => {
                    let error = FetchError::rpc(&chain.name, e);
                    log::error!("[{}] {}", run_id, error);
                    claim.fail(error.to_string());
                    report.outcomes.push(outcome(chain, OutcomeStatus::Failed { error: error.to_string() }));
                    continue;
                }
            };

            let request = WorkerRequest::for_chain(chain, category_of_chain(chain), addresses.clone());
            let handle = spawn_worker(request, chain.clone(), api, self.worker_timeout);
            let chain = chain.clone();
            pending.push(async move {
                let result = handle
                    .await
                    .unwrap_or_else(|_| Err(FetchError::Aborted(chain.name.clone())));
                (chain, claim, result)
            });
        }

        log::info!(
            "[{}] Dispatched {} worker(s) for {} address(es)",
            run_id,
            pending.len(),
            addresses.len()
        );

        // Merge in completion order
        while let Some((chain, claim, result)) = pending.next().await {
            let status = self.settle(&chain, claim, result).await;
            report.outcomes.push(outcome(&chain, status));
        }

        Ok(report)
    }

    /// Apply one worker result to the cache and the fetch-state registry
    async fn settle(
        &self,
        chain: &Chain,
        claim: FetchClaim,
        result: std::result::Result<WorkerMessage, FetchError>,
    ) -> OutcomeStatus {
        let message = match result {
            Ok(message) => message,
            Err(error) => {
                log::error!("Fetching balances on {} failed: {}", chain.name, error);
                claim.fail(error.to_string());
                return OutcomeStatus::Failed {
                    error: error.to_string(),
                };
            }
        };

        if message.is_empty() {
            log::info!("No assets found on {}", chain.name);
            claim.finish();
            return OutcomeStatus::Empty;
        }

        let merged = match message.into_balances(&chain.genesis_hash) {
            Ok(balances) => self.cache.merge(&chain.genesis_hash, balances).await,
            Err(error) => Err(AggregatorError::Fetch(error)),
        };

        match merged {
            Ok(slots) => {
                claim.finish();
                OutcomeStatus::Merged { slots }
            }
            Err(error) => {
                log::error!("Could not merge balances of {}: {}", chain.name, error);
                claim.fail(error.to_string());
                OutcomeStatus::Failed {
                    error: error.to_string(),
                }
            }
        }
    }

    /// Consolidated view of the given addresses on the selected chains.
    ///
    /// `selected = None` means every registered chain.
    pub fn view(&self, addresses: &[String], selected: Option<&[String]>) -> BalancesView {
        let chains: Vec<String> = match selected {
            Some(selected) => normalize_selection(selected),
            None => self.registry.all().map(|c| c.genesis_hash.to_lowercase()).collect(),
        };
        let snapshot = self.cache.snapshot();

        addresses
            .iter()
            .map(|address| {
                let per_chain = chains
                    .iter()
                    .map(|genesis| (genesis.clone(), self.state_of(&snapshot, address, genesis)))
                    .collect();
                (address.clone(), per_chain)
            })
            .collect()
    }

    pub fn balance_state(&self, address: &str, genesis_hash: &str) -> BalanceState {
        self.state_of(&self.cache.snapshot(), address, &genesis_hash.to_lowercase())
    }

    fn state_of(&self, snapshot: &CacheEnvelope, address: &str, genesis_hash: &str) -> BalanceState {
        let cached = snapshot.get(address, genesis_hash).map(<[AssetBalance]>::to_vec);
        let key = FetchKey::new(address, genesis_hash, FetchKind::Assets);

        match self.fetch_state.status(&key) {
            FetchStatus::Fetching => BalanceState::Loading { last_known: cached },
            FetchStatus::Failed { reason } => BalanceState::Failed {
                error: reason,
                last_known: cached,
            },
            FetchStatus::Idle => match cached {
                Some(records) => BalanceState::Loaded {
                    records,
                    fetched_at: snapshot.time_stamp,
                },
                None => BalanceState::NotLoaded,
            },
        }
    }

    /// Detailed native balances of one account, also written to the cache
    pub async fn account_balances(&self, address: &str, genesis_hash: &str) -> Result<AccountBalances> {
        let chain = self.chain(genesis_hash)?;
        let key = FetchKey::new(address, &chain.genesis_hash, FetchKind::Balances);
        let Some(claim) = self.fetch_state.claim_all(vec![key]) else {
            return Err(AggregatorError::AlreadyFetching(format!(
                "balances of {} on {}",
                address, chain.name
            )));
        };

        match self.fetch_account_balances(address, &chain).await {
            Ok(balances) => {
                claim.finish();
                Ok(balances)
            }
            Err(e) => {
                log::error!("Fetching balances of {} on {} failed: {}", address, chain.name, e);
                claim.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch_account_balances(&self, address: &str, chain: &Chain) -> Result<AccountBalances> {
        let account = ss58::account_id(address)?;
        let api = self.apis.api_for(chain)?;

        let info = queries::account(api.as_ref(), &account).await?;
        let pooled = pool::pooled_balance(api.as_ref(), &account).await?;
        let data = info.map(|i| i.data).unwrap_or_default();

        let free = Balance(data.free);
        let reserved = Balance(data.reserved);
        let locked = Balance(data.locked());
        let untouchable = locked.saturating_sub(reserved).max(chain.existential_deposit);

        let balances = AccountBalances {
            address: address.to_string(),
            chain_name: chain.name.clone(),
            genesis_hash: chain.genesis_hash.clone(),
            token: chain.token.clone(),
            decimal: chain.decimal,
            free_balance: free,
            reserved_balance: reserved,
            locked_balance: locked,
            pooled_balance: pooled,
            available_balance: free.saturating_sub(untouchable),
            existential_deposit: chain.existential_deposit,
            date: now_millis(),
        };

        let breakdown = balances.breakdown();
        let record = AssetBalance {
            asset_id: None,
            total_balance: breakdown.total(),
            chain_name: chain.name.clone(),
            decimal: chain.decimal,
            genesis_hash: chain.genesis_hash.clone(),
            price_id: chain.price_id.clone(),
            token: chain.token.clone(),
            breakdown: Some(breakdown),
        };
        self.cache.upsert_native(address, record).await?;

        Ok(balances)
    }

    /// Stake of one account in a nomination pool, pending rewards included
    pub async fn pooled_balance(&self, address: &str, genesis_hash: &str) -> Result<Balance> {
        let chain = self.chain(genesis_hash)?;
        let key = FetchKey::new(address, &chain.genesis_hash, FetchKind::PooledBalance);
        let Some(claim) = self.fetch_state.claim_all(vec![key]) else {
            return Err(AggregatorError::AlreadyFetching(format!(
                "pooled balance of {} on {}",
                address, chain.name
            )));
        };

        let result = async {
            let account = ss58::account_id(address)?;
            let api = self.apis.api_for(&chain)?;
            Ok::<Balance, AggregatorError>(pool::pooled_balance(api.as_ref(), &account).await?)
        }
        .await;

        match &result {
            Ok(_) => claim.finish(),
            Err(e) => {
                log::error!("Fetching pooled balance of {} on {} failed: {}", address, chain.name, e);
                claim.fail(e.to_string());
            }
        }
        result
    }

    /// Balance and metadata of one `Assets` pallet asset
    pub async fn asset_info(&self, address: &str, genesis_hash: &str, asset_id: u32) -> Result<AssetInfo> {
        let chain = self.chain(genesis_hash)?;
        let account = ss58::account_id(address)?;
        let api = self.apis.api_for(&chain)?;

        let details = queries::asset_details(api.as_ref(), asset_id)
            .await?
            .ok_or(AggregatorError::UnknownAsset(asset_id))?;
        let metadata = queries::asset_metadata(api.as_ref(), asset_id).await?;
        let holding = queries::asset_accounts(api.as_ref(), &[asset_id], &[account])
            .await?
            .pop()
            .flatten();

        let whitelisted = chain.assets.iter().find(|a| a.id == asset_id);
        let (token, decimal) = match (&metadata, whitelisted) {
            (Some(metadata), _) => (metadata.symbol(), metadata.decimals),
            (None, Some(asset)) => (asset.symbol.clone(), asset.decimal),
            (None, None) => (asset_id.to_string(), 0),
        };

        let free = holding.as_ref().map(|h| h.balance).unwrap_or_default();
        let available = match holding.map(|h| h.status) {
            Some(AssetAccountStatus::Liquid) => free,
            _ => 0,
        };

        Ok(AssetInfo {
            asset_id,
            chain_name: chain.name.clone(),
            genesis_hash: chain.genesis_hash.clone(),
            token,
            decimal,
            free_balance: Balance(free),
            available_balance: Balance(available),
            min_balance: Balance(details.min_balance),
        })
    }

    /// Receiver notified after every cache change
    pub fn subscribe(&self) -> watch::Receiver<CacheEnvelope> {
        self.cache.subscribe()
    }

    /// Prices of `ids`, or of every registered token when `ids` is empty
    pub async fn prices(&self, ids: &[String], currency: Option<&str>) -> Result<PriceSnapshot> {
        let ids: Vec<String> = if ids.is_empty() {
            self.registry
                .all()
                .flat_map(|c| {
                    std::iter::once(c.price_id.clone()).chain(c.assets.iter().map(|a| a.price_id.clone()))
                })
                .filter(|id| !id.is_empty())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            ids.to_vec()
        };
        self.prices
            .fetch(&ids, currency.unwrap_or(&self.currency))
            .await
    }

    fn chain(&self, genesis_hash: &str) -> Result<Chain> {
        self.registry.by_genesis(genesis_hash).cloned().ok_or_else(|| {
            log::error!("Can not find chain by genesis hash {}", genesis_hash);
            AggregatorError::UnknownChain(genesis_hash.to_string())
        })
    }

    /// Store the new selection; true if it differs from the previous run's
    fn swap_selection(&self, selection: &[String]) -> bool {
        let mut last = match self.last_selection.lock() {
            Ok(last) => last,
            Err(poisoned) => poisoned.into_inner(),
        };
        let changed = last.as_deref().is_some_and(|previous| previous != selection);
        *last = Some(selection.to_vec());
        changed
    }

}

fn outcome(chain: &Chain, status: OutcomeStatus) -> ChainOutcome {
    ChainOutcome {
        genesis_hash: chain.genesis_hash.clone(),
        chain_name: Some(chain.name.clone()),
        status,
    }
}

/// Trimmed addresses in first-seen order, duplicates and blanks removed
fn normalize_addresses(addresses: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    addresses
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty() && seen.insert(*a))
        .map(str::to_string)
        .collect()
}

/// Lowercase, sorted, deduplicated genesis hashes
fn normalize_selection(selected: &[String]) -> Vec<String> {
    selected
        .iter()
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
