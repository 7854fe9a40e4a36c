//! Single-writer cache actor
//!
//! One task owns the envelope and the store. Every mutation goes through
//! its queue, so merges from chains finishing at the same time are applied
//! one after another and none is lost. Readers get the latest envelope
//! from a watch channel without touching the store.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

use super::envelope::{CacheEnvelope, ChainBalances};
use super::store::CacheStore;
use crate::balance::AssetBalance;
use crate::error::{AggregatorError, StorageError};
use crate::staleness::now_millis;

const QUEUE_DEPTH: usize = 64;

enum CacheCommand {
    Merge {
        genesis_hash: String,
        balances: ChainBalances,
        reply: oneshot::Sender<Result<usize, StorageError>>,
    },
    UpsertNative {
        address: String,
        record: AssetBalance,
        reply: oneshot::Sender<Result<(), StorageError>>,
    },
    Clear {
        reply: oneshot::Sender<Result<(), StorageError>>,
    },
}

/// Clonable handle to the cache actor
#[derive(Clone)]
pub struct CacheHandle {
    commands: mpsc::Sender<CacheCommand>,
    snapshots: watch::Receiver<CacheEnvelope>,
}

struct CacheActor {
    key: String,
    store: Arc<dyn CacheStore>,
    envelope: CacheEnvelope,
    publisher: watch::Sender<CacheEnvelope>,
}

impl CacheHandle {
    /// Load the envelope stored under `key` and start the actor task.
    ///
    /// An unreadable envelope is logged and replaced by an empty one.
    pub fn spawn(store: Arc<dyn CacheStore>, key: &str) -> Result<Self, StorageError> {
        let envelope = match store.load(key)? {
            Some(json) => CacheEnvelope::from_json(&json).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable cache envelope '{}': {}", key, e);
                CacheEnvelope::new()
            }),
            None => CacheEnvelope::new(),
        };
        log::debug!(
            "Cache '{}' loaded with {} address(es)",
            key,
            envelope.balances.len()
        );

        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let (publisher, snapshots) = watch::channel(envelope.clone());

        let actor = CacheActor {
            key: key.to_string(),
            store,
            envelope,
            publisher,
        };
        tokio::spawn(actor.run(rx));

        Ok(Self {
            commands: tx,
            snapshots,
        })
    }

    /// Merge one chain's worker result; returns the number of slots written
    pub async fn merge(
        &self,
        genesis_hash: &str,
        balances: ChainBalances,
    ) -> Result<usize, AggregatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CacheCommand::Merge {
            genesis_hash: genesis_hash.to_string(),
            balances,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| AggregatorError::CacheClosed)??)
    }

    pub async fn upsert_native(
        &self,
        address: &str,
        record: AssetBalance,
    ) -> Result<(), AggregatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CacheCommand::UpsertNative {
            address: address.to_string(),
            record,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| AggregatorError::CacheClosed)??)
    }

    pub async fn clear(&self) -> Result<(), AggregatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CacheCommand::Clear { reply }).await?;
        Ok(rx.await.map_err(|_| AggregatorError::CacheClosed)??)
    }

    /// Latest envelope, including every merge that has been acknowledged
    pub fn snapshot(&self) -> CacheEnvelope {
        self.snapshots.borrow().clone()
    }

    pub fn time_stamp(&self) -> Option<i64> {
        self.snapshots.borrow().time_stamp
    }

    /// Receiver that is notified after every applied change
    pub fn subscribe(&self) -> watch::Receiver<CacheEnvelope> {
        self.snapshots.clone()
    }

    async fn send(&self, command: CacheCommand) -> Result<(), AggregatorError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AggregatorError::CacheClosed)
    }
}

impl CacheActor {
    async fn run(mut self, mut commands: mpsc::Receiver<CacheCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                CacheCommand::Merge {
                    genesis_hash,
                    balances,
                    reply,
                } => {
                    let written = self.envelope.merge(&genesis_hash, balances, now_millis());
                    let result = if written > 0 {
                        self.publish_and_persist().map(|_| written)
                    } else {
                        log::info!("No new balances to merge for {}", genesis_hash);
                        Ok(0)
                    };
                    let _ = reply.send(result);
                }
                CacheCommand::UpsertNative {
                    address,
                    record,
                    reply,
                } => {
                    self.envelope.upsert_native(&address, record, now_millis());
                    let _ = reply.send(self.publish_and_persist());
                }
                CacheCommand::Clear { reply } => {
                    self.envelope = CacheEnvelope::new();
                    self.publisher.send_replace(self.envelope.clone());
                    let _ = reply.send(self.store.remove(&self.key));
                }
            }
        }
        log::debug!("Cache actor for '{}' stopped", self.key);
    }

    /// The in-memory envelope stays authoritative when persisting fails
    fn publish_and_persist(&mut self) -> Result<(), StorageError> {
        self.publisher.send_replace(self.envelope.clone());

        let json = self.envelope.to_json()?;
        self.store.save(&self.key, &json).map_err(|e| {
            log::error!("Failed to persist cache '{}': {}", self.key, e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::Balance;
    use crate::cache::store::{MemoryStore, ASSETS_NAME_IN_STORAGE};

    fn record(genesis: &str, amount: u128) -> AssetBalance {
        AssetBalance {
            asset_id: None,
            total_balance: Balance(amount),
            chain_name: "test".to_string(),
            decimal: 12,
            genesis_hash: genesis.to_string(),
            price_id: String::new(),
            token: "UNIT".to_string(),
            breakdown: None,
        }
    }

    fn result(address: &str, genesis: &str, amount: u128) -> ChainBalances {
        let mut balances = ChainBalances::new();
        balances.insert(address.to_string(), vec![record(genesis, amount)]);
        balances
    }

    #[tokio::test]
    async fn test_concurrent_merges_are_all_kept() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheHandle::spawn(store.clone(), ASSETS_NAME_IN_STORAGE).unwrap();

        let merges = (0..16u128).map(|i| {
            let cache = cache.clone();
            let genesis = format!("0x{:02x}", i);
            tokio::spawn(async move { cache.merge(&genesis, result("alice", &genesis, i)).await })
        });
        for handle in futures::future::join_all(merges).await {
            assert_eq!(handle.unwrap().unwrap(), 1);
        }

        let persisted = CacheEnvelope::from_json(&store.load(ASSETS_NAME_IN_STORAGE).unwrap().unwrap()).unwrap();
        assert_eq!(persisted.balances["alice"].len(), 16);
        assert_eq!(cache.snapshot(), persisted);
    }

    #[tokio::test]
    async fn test_loads_existing_envelope() {
        let store = Arc::new(MemoryStore::new());
        let mut envelope = CacheEnvelope::new();
        envelope.merge("0xaa", result("bob", "0xaa", 3), 42);
        store.save("k", &envelope.to_json().unwrap()).unwrap();

        let cache = CacheHandle::spawn(store, "k").unwrap();
        assert_eq!(cache.time_stamp(), Some(42));
        assert_eq!(cache.snapshot().get("bob", "0xaa").unwrap()[0].total_balance, Balance(3));
    }

    #[tokio::test]
    async fn test_corrupt_envelope_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.save("k", "not json").unwrap();
        let cache = CacheHandle::spawn(store, "k").unwrap();
        assert_eq!(cache.snapshot(), CacheEnvelope::new());
    }

    #[tokio::test]
    async fn test_subscribers_see_merges() {
        let cache = CacheHandle::spawn(Arc::new(MemoryStore::new()), "k").unwrap();
        let mut rx = cache.subscribe();

        cache.merge("0xaa", result("carol", "0xaa", 1)).await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().get("carol", "0xaa").is_some());

        cache.clear().await.unwrap();
        assert!(cache.snapshot().balances.is_empty());
    }
}
