//! Per-(address, chain) fetch bookkeeping
//!
//! Owned by one aggregator and shared with its workers. Prevents the same
//! slot from being fetched twice at once and remembers why the last fetch
//! failed so callers can tell "failed" from "still loading".

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// What is being fetched for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchKind {
    /// Batched balances from a fetch worker
    Assets,
    /// Detailed native balances of one account
    Balances,
    PooledBalance,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub address: String,
    pub genesis_hash: String,
    pub kind: FetchKind,
}

impl FetchKey {
    pub fn new(address: &str, genesis_hash: &str, kind: FetchKind) -> Self {
        Self {
            address: address.to_string(),
            genesis_hash: genesis_hash.to_lowercase(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FetchStatus {
    Idle,
    Fetching,
    Failed { reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct FetchStateRegistry {
    inner: Arc<RwLock<HashMap<FetchKey, FetchStatus>>>,
}

impl FetchStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the slot as fetching. Returns `false` if it already is.
    pub fn try_begin(&self, key: &FetchKey) -> bool {
        let mut states = match self.inner.write() {
            Ok(states) => states,
            Err(poisoned) => poisoned.into_inner(),
        };
        if states.get(key) == Some(&FetchStatus::Fetching) {
            log::debug!(
                "{:?} for {} on {} is already being fetched",
                key.kind,
                key.address,
                key.genesis_hash
            );
            return false;
        }
        states.insert(key.clone(), FetchStatus::Fetching);
        true
    }

    /// Claim every key or none of them
    pub fn try_begin_all(&self, keys: &[FetchKey]) -> bool {
        let mut states = match self.inner.write() {
            Ok(states) => states,
            Err(poisoned) => poisoned.into_inner(),
        };
        if keys
            .iter()
            .any(|k| states.get(k) == Some(&FetchStatus::Fetching))
        {
            return false;
        }
        for key in keys {
            states.insert(key.clone(), FetchStatus::Fetching);
        }
        true
    }

    /// Claim every key or none of them, returning a guard that settles them.
    ///
    /// Keys still held when the guard is dropped are marked failed, so a
    /// cancelled caller never leaves a slot stuck in `Fetching`.
    pub fn claim_all(&self, keys: Vec<FetchKey>) -> Option<FetchClaim> {
        if !self.try_begin_all(&keys) {
            return None;
        }
        Some(FetchClaim {
            registry: self.clone(),
            keys,
        })
    }

    pub fn finish(&self, key: &FetchKey) {
        self.set(key, FetchStatus::Idle);
    }

    pub fn fail(&self, key: &FetchKey, reason: impl Into<String>) {
        self.set(
            key,
            FetchStatus::Failed {
                reason: reason.into(),
            },
        );
    }

    pub fn status(&self, key: &FetchKey) -> FetchStatus {
        let states = match self.inner.read() {
            Ok(states) => states,
            Err(poisoned) => poisoned.into_inner(),
        };
        states.get(key).cloned().unwrap_or(FetchStatus::Idle)
    }

    pub fn is_fetching(&self, key: &FetchKey) -> bool {
        self.status(key) == FetchStatus::Fetching
    }

    /// Number of slots currently in flight
    pub fn in_flight(&self) -> usize {
        let states = match self.inner.read() {
            Ok(states) => states,
            Err(poisoned) => poisoned.into_inner(),
        };
        states
            .values()
            .filter(|s| **s == FetchStatus::Fetching)
            .count()
    }

    fn set(&self, key: &FetchKey, status: FetchStatus) {
        let mut states = match self.inner.write() {
            Ok(states) => states,
            Err(poisoned) => poisoned.into_inner(),
        };
        states.insert(key.clone(), status);
    }
}

/// Keys claimed by one fetch; see [`FetchStateRegistry::claim_all`]
#[derive(Debug)]
pub struct FetchClaim {
    registry: FetchStateRegistry,
    keys: Vec<FetchKey>,
}

impl FetchClaim {
    pub fn keys(&self) -> &[FetchKey] {
        &self.keys
    }

    pub fn finish(mut self) {
        for key in self.keys.drain(..) {
            self.registry.finish(&key);
        }
    }

    pub fn fail(mut self, reason: impl Into<String>) {
        let reason = reason.into();
        for key in self.keys.drain(..) {
            self.registry.fail(&key, reason.clone());
        }
    }
}

impl Drop for FetchClaim {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        log::warn!("Fetch of {} slot(s) was cancelled before it settled", self.keys.len());
        for key in self.keys.drain(..) {
            self.registry.fail(&key, "cancelled");
        }
    }
}
