//! Cache envelope: every cached balance, per address and chain

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::balance::AssetBalance;
use crate::error::StorageError;

pub type AssetsBalancesPerChain = BTreeMap<String, Vec<AssetBalance>>;
pub type AssetsBalancesPerAddress = BTreeMap<String, AssetsBalancesPerChain>;

/// Records fetched by one worker run, keyed by address
pub type ChainBalances = BTreeMap<String, Vec<AssetBalance>>;

/// Persisted balances with the time of the last successful merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    #[serde(default)]
    pub balances: AssetsBalancesPerAddress,
    #[serde(rename = "timeStamp", default)]
    pub time_stamp: Option<i64>,
}

impl CacheEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn get(&self, address: &str, genesis_hash: &str) -> Option<&[AssetBalance]> {
        self.balances
            .get(address)
            .and_then(|chains| chains.get(genesis_hash))
            .map(Vec::as_slice)
    }

    /// Upsert one chain's records for each address present in `result`.
    ///
    /// Slots of other chains are never touched. Addresses with an empty
    /// record list keep whatever was cached before. Returns how many
    /// (address, chain) slots were written; the timestamp only moves when
    /// at least one was.
    pub fn merge(&mut self, genesis_hash: &str, result: ChainBalances, now: i64) -> usize {
        let mut written = 0;

        for (address, records) in result {
            if records.is_empty() {
                continue;
            }
            // Records must all belong to the chain being merged
            let records: Vec<AssetBalance> = records
                .into_iter()
                .filter(|r| r.genesis_hash.eq_ignore_ascii_case(genesis_hash))
                .collect();
            if records.is_empty() {
                log::warn!(
                    "Dropping records for {} that do not belong to {}",
                    address,
                    genesis_hash
                );
                continue;
            }

            self.balances
                .entry(address)
                .or_default()
                .insert(genesis_hash.to_string(), records);
            written += 1;
        }

        if written > 0 {
            self.time_stamp = Some(now);
        }
        written
    }

    /// Replace the native-token record of one slot, keeping cached asset records
    pub fn upsert_native(&mut self, address: &str, record: AssetBalance, now: i64) {
        let slot = self
            .balances
            .entry(address.to_string())
            .or_default()
            .entry(record.genesis_hash.clone())
            .or_default();

        slot.retain(|r| !r.is_native());
        slot.insert(0, record);
        self.time_stamp = Some(now);
    }

    pub fn addresses(&self) -> impl Iterator<Item = &String> {
        self.balances.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::Balance;

    fn record(genesis: &str, chain: &str, asset_id: Option<u32>, amount: u128) -> AssetBalance {
        AssetBalance {
            asset_id,
            total_balance: Balance(amount),
            chain_name: chain.to_string(),
            decimal: 10,
            genesis_hash: genesis.to_string(),
            price_id: chain.to_string(),
            token: "DOT".to_string(),
            breakdown: None,
        }
    }

    #[test]
    fn test_merge_keeps_other_chains() {
        let mut envelope = CacheEnvelope::new();
        let mut a = ChainBalances::new();
        a.insert("alice".into(), vec![record("0xaa", "polkadot", None, 5)]);
        envelope.merge("0xaa", a, 1);

        let mut b = ChainBalances::new();
        b.insert("alice".into(), vec![record("0xbb", "kusama", None, 7)]);
        envelope.merge("0xbb", b, 2);

        let mut a2 = ChainBalances::new();
        a2.insert("alice".into(), vec![record("0xaa", "polkadot", None, 9)]);
        envelope.merge("0xaa", a2, 3);

        assert_eq!(envelope.get("alice", "0xaa").unwrap()[0].total_balance, Balance(9));
        assert_eq!(envelope.get("alice", "0xbb").unwrap()[0].total_balance, Balance(7));
        assert_eq!(envelope.time_stamp, Some(3));
    }

    #[test]
    fn test_empty_result_leaves_cache_untouched() {
        let mut envelope = CacheEnvelope::new();
        let mut first = ChainBalances::new();
        first.insert("alice".into(), vec![record("0xaa", "polkadot", None, 5)]);
        envelope.merge("0xaa", first, 10);

        let mut empty = ChainBalances::new();
        empty.insert("alice".into(), Vec::new());
        assert_eq!(envelope.merge("0xaa", empty, 20), 0);
        assert_eq!(envelope.merge("0xaa", ChainBalances::new(), 30), 0);

        assert_eq!(envelope.get("alice", "0xaa").unwrap().len(), 1);
        assert_eq!(envelope.time_stamp, Some(10));
    }

    #[test]
    fn test_merge_drops_foreign_records() {
        let mut envelope = CacheEnvelope::new();
        let mut result = ChainBalances::new();
        result.insert("alice".into(), vec![record("0xbb", "kusama", None, 1)]);
        assert_eq!(envelope.merge("0xaa", result, 1), 0);
        assert!(envelope.get("alice", "0xaa").is_none());
    }

    #[test]
    fn test_upsert_native_keeps_assets() {
        let mut envelope = CacheEnvelope::new();
        let mut result = ChainBalances::new();
        result.insert(
            "alice".into(),
            vec![
                record("0xaa", "hub", None, 1),
                record("0xaa", "hub", Some(1984), 2),
            ],
        );
        envelope.merge("0xaa", result, 1);

        envelope.upsert_native("alice", record("0xaa", "hub", None, 100), 2);
        let slot = envelope.get("alice", "0xaa").unwrap();
        assert_eq!(slot.len(), 2);
        assert_eq!(slot[0].total_balance, Balance(100));
        assert_eq!(slot[1].asset_id, Some(1984));
    }

    #[test]
    fn test_json_round_trip() {
        let mut envelope = CacheEnvelope::new();
        let mut result = ChainBalances::new();
        result.insert("alice".into(), vec![record("0xaa", "polkadot", None, u128::MAX - 1)]);
        envelope.merge("0xaa", result, 1_700_000_000_000);

        let json = envelope.to_json().unwrap();
        assert!(json.contains("\"timeStamp\":1700000000000"));
        assert!(json.contains(&format!("\"totalBalance\":\"{}\"", u128::MAX - 1)));

        let back = CacheEnvelope::from_json(&json).unwrap();
        assert_eq!(back, envelope);
    }
}
