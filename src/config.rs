//! Aggregator configuration from environment variables
//!
//! Controls where the cache lives, how long balances stay fresh, how long a
//! worker may run, and which RPC endpoint each chain uses.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::chains::ChainRegistry;
use crate::error::AggregatorError;
use crate::prices::DEFAULT_PRICE_URL;
use crate::staleness::BALANCE_VALIDITY_PERIOD;

const RPC_URL_PREFIX: &str = "RPC_URL_";

#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    /// Directory of the file-backed cache
    pub cache_dir: PathBuf,
    /// Freshness window for cached balances
    pub validity: Duration,
    /// Upper bound on a single worker run
    pub worker_timeout: Duration,
    pub price_url: String,
    pub currency: String,
    /// Optional TOML file with user-added chains
    pub chains_file: Option<PathBuf>,
    /// RPC endpoint overrides keyed by lowercase chain name
    pub rpc_overrides: HashMap<String, String>,
}

impl AggregatorConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BALANCES_CACHE_DIR`: cache directory (default `./balances_cache`)
    /// - `BALANCES_VALIDITY_SECS`: freshness window (default 60)
    /// - `BALANCES_WORKER_TIMEOUT_SECS`: worker timeout (default 30)
    /// - `BALANCES_PRICE_URL`: simple-price endpoint (default CoinGecko)
    /// - `BALANCES_CURRENCY`: price currency (default `usd`)
    /// - `BALANCES_CHAINS_FILE`: TOML file of extra chains (optional)
    /// - `RPC_URL_<CHAIN>`: endpoint for one chain, e.g. `RPC_URL_KUSAMA`
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Point Polkadot at a local node and keep balances fresh for 5 minutes
    /// RPC_URL_POLKADOT=http://localhost:9944 BALANCES_VALIDITY_SECS=300 cargo run -p balances-server
    /// ```
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let cache_dir = env::var("BALANCES_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);
        log::info!("📁 Cache directory: {}", cache_dir.display());

        let validity = secs_var("BALANCES_VALIDITY_SECS").unwrap_or(defaults.validity);
        let worker_timeout =
            secs_var("BALANCES_WORKER_TIMEOUT_SECS").unwrap_or(defaults.worker_timeout);
        log::info!(
            "⏱️  Balances valid for {}s, worker timeout {}s",
            validity.as_secs(),
            worker_timeout.as_secs()
        );

        let price_url = env::var("BALANCES_PRICE_URL").unwrap_or(defaults.price_url);
        let currency = env::var("BALANCES_CURRENCY")
            .map(|c| c.to_lowercase())
            .unwrap_or(defaults.currency);

        let chains_file = env::var("BALANCES_CHAINS_FILE").ok().map(PathBuf::from);
        if let Some(ref path) = chains_file {
            log::info!("🔗 Extra chains from {}", path.display());
        }

        let rpc_overrides = rpc_overrides_from(env::vars());
        for (chain, url) in &rpc_overrides {
            log::info!("📡 RPC endpoint for {}: {}", chain, url);
        }

        Self {
            cache_dir,
            validity,
            worker_timeout,
            price_url,
            currency,
            chains_file,
            rpc_overrides,
        }
    }

    /// Builtin chains plus the configured extra chains and endpoint overrides
    pub fn chain_registry(&self) -> Result<ChainRegistry, AggregatorError> {
        let mut registry = ChainRegistry::builtin();
        if let Some(path) = &self.chains_file {
            registry = registry.with_custom_chains(path)?;
        }
        Ok(registry.with_rpc_overrides(&self.rpc_overrides))
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./balances_cache"),
            validity: BALANCE_VALIDITY_PERIOD,
            worker_timeout: Duration::from_secs(30),
            price_url: DEFAULT_PRICE_URL.to_string(),
            currency: "usd".to_string(),
            chains_file: None,
            rpc_overrides: HashMap::new(),
        }
    }
}

fn secs_var(name: &str) -> Option<Duration> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            log::warn!("⚠️  Ignoring {}={}: not a number of seconds", name, raw);
            None
        }
    }
}

fn rpc_overrides_from(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    vars.filter_map(|(key, value)| {
        let chain = key.strip_prefix(RPC_URL_PREFIX)?;
        if chain.is_empty() || value.trim().is_empty() {
            return None;
        }
        Some((chain.to_lowercase(), value))
    })
    .collect()
}
