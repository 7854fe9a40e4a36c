//! Common test utilities for balance aggregation integration tests
//!
//! This module provides shared test infrastructure including:
//! - An in-memory chain (`FakeChain`) with optional latency and failure
//! - A provider handing out one fake chain per genesis hash
//! - Test environment with a file-backed cache in a temp directory

use async_trait::async_trait;
use codec::Encode;
use polkagate_balances::rpc::scale::{AccountData, AccountInfo};
use polkagate_balances::rpc::{ss58, AccountId};
use polkagate_balances::{
    AggregatorConfig, ApiProvider, BalanceAggregator, CacheEnvelope, CacheHandle, Chain,
    ChainApi, ChainRegistry, FetchStateRegistry, FileStore, RpcError, StalenessPolicy,
    ASSETS_NAME_IN_STORAGE,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tempfile::TempDir;

pub const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
pub const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn account(address: &str) -> AccountId {
    ss58::account_id(address).expect("valid test address")
}

/// `System.Account` value using the frozen/flags layout
pub fn account_info(free: u128, reserved: u128, frozen: u128) -> AccountInfo {
    AccountInfo {
        providers: 1,
        data: AccountData {
            free,
            reserved,
            frozen,
            flags: 1 << 127,
        },
        ..Default::default()
    }
}

/// In-memory chain answering storage reads from a map
pub struct FakeChain {
    genesis: String,
    storage: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    delay: Duration,
    failing: AtomicBool,
    batches: AtomicUsize,
}

impl FakeChain {
    pub fn new(genesis: &str) -> Self {
        Self {
            genesis: genesis.to_lowercase(),
            storage: RwLock::new(HashMap::new()),
            delay: Duration::ZERO,
            failing: AtomicBool::new(false),
            batches: AtomicUsize::new(0),
        }
    }

    /// Every storage read waits this long first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn put<T: Encode>(&self, key: Vec<u8>, value: &T) {
        self.storage.write().unwrap().insert(key, value.encode());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainApi for FakeChain {
    async fn genesis_hash(&self) -> Result<String, RpcError> {
        Ok(self.genesis.clone())
    }

    async fn storage_batch(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>, RpcError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RpcError::InvalidResponse("connection refused".into()));
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        let storage = self.storage.read().unwrap();
        Ok(keys.iter().map(|k| storage.get(k).cloned()).collect())
    }

    async fn call(&self, method: &str, _data: &[u8]) -> Result<Vec<u8>, RpcError> {
        Err(RpcError::Node {
            code: -32601,
            message: format!("{} not available", method),
        })
    }
}

/// Provider keyed by genesis hash; chains without a fake have no endpoint
#[derive(Default)]
pub struct FakeProvider {
    chains: RwLock<HashMap<String, Arc<FakeChain>>>,
}

impl FakeProvider {
    pub fn add(&self, chain: Arc<FakeChain>) {
        self.chains
            .write()
            .unwrap()
            .insert(chain.genesis.clone(), chain);
    }
}

impl ApiProvider for FakeProvider {
    fn api_for(&self, chain: &Chain) -> Result<Arc<dyn ChainApi>, RpcError> {
        let chains = self.chains.read().unwrap();
        match chains.get(&chain.genesis_hash.to_lowercase()) {
            Some(fake) => Ok(fake.clone()),
            None => Err(RpcError::InvalidResponse(format!(
                "no endpoint for {}",
                chain.name
            ))),
        }
    }
}

/// Test environment with automatic cleanup
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub provider: Arc<FakeProvider>,
    pub aggregator: BalanceAggregator,
}

impl TestEnvironment {
    pub fn new(chains: Vec<Arc<FakeChain>>) -> anyhow::Result<Self> {
        Self::with_config(chains, AggregatorConfig::default())
    }

    /// Builtin chain registry; `cache_dir` is replaced by the temp directory
    pub fn with_config(chains: Vec<Arc<FakeChain>>, mut config: AggregatorConfig) -> anyhow::Result<Self> {
        init_logger();

        let temp_dir = TempDir::new()?;
        log::info!("📁 Test directory: {:?}", temp_dir.path());
        config.cache_dir = temp_dir.path().to_path_buf();

        let provider = Arc::new(FakeProvider::default());
        for chain in chains {
            provider.add(chain);
        }

        let store = Arc::new(FileStore::new_with_base_dir(config.cache_dir.clone()));
        let cache = CacheHandle::spawn(store, ASSETS_NAME_IN_STORAGE)?;

        let aggregator = BalanceAggregator::new(
            Arc::new(ChainRegistry::builtin()),
            provider.clone(),
            cache,
            FetchStateRegistry::new(),
            StalenessPolicy::new(config.validity),
            &config,
        );

        Ok(Self {
            temp_dir,
            provider,
            aggregator,
        })
    }

    /// Envelope as a fresh cache actor would load it from disk
    pub fn reload_cache(&self) -> anyhow::Result<CacheEnvelope> {
        let store = Arc::new(FileStore::new_with_base_dir(self.temp_dir.path().to_path_buf()));
        let cache = CacheHandle::spawn(store, ASSETS_NAME_IN_STORAGE)?;
        Ok(cache.snapshot())
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        log::info!("🧹 Cleaning up test environment (temp dir will auto-remove)");
    }
}
