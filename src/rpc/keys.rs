//! Storage key construction
//!
//! Substrate storage keys are `twox128(pallet) ++ twox128(item)` followed by
//! one hashed segment per map key.

use blake2::digest::consts::U16;
use blake2::{Blake2b, Digest};
use codec::Encode;
use std::hash::Hasher;
use twox_hash::XxHash64;

use super::ss58::AccountId;

type Blake2b128 = Blake2b<U16>;

const POOLS_PALLET_ID: &[u8; 8] = b"py/nopls";
const MODULE_PREFIX: &[u8; 4] = b"modl";

pub fn twox_64(data: &[u8]) -> [u8; 8] {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish().to_le_bytes()
}

pub fn twox_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (seed, chunk) in out.chunks_mut(8).enumerate() {
        let mut hasher = XxHash64::with_seed(seed as u64);
        hasher.write(data);
        chunk.copy_from_slice(&hasher.finish().to_le_bytes());
    }
    out
}

pub fn blake2_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Blake2b128::digest(data));
    out
}

pub fn twox_64_concat(data: &[u8]) -> Vec<u8> {
    let mut out = twox_64(data).to_vec();
    out.extend_from_slice(data);
    out
}

pub fn blake2_128_concat(data: &[u8]) -> Vec<u8> {
    let mut out = blake2_128(data).to_vec();
    out.extend_from_slice(data);
    out
}

/// `twox128(pallet) ++ twox128(item)`
pub fn storage_prefix(pallet: &str, item: &str) -> Vec<u8> {
    let mut key = twox_128(pallet.as_bytes()).to_vec();
    key.extend_from_slice(&twox_128(item.as_bytes()));
    key
}

fn map_key(pallet: &str, item: &str, segments: &[Vec<u8>]) -> Vec<u8> {
    let mut key = storage_prefix(pallet, item);
    for segment in segments {
        key.extend_from_slice(segment);
    }
    key
}

pub fn system_account(account: &AccountId) -> Vec<u8> {
    map_key("System", "Account", &[blake2_128_concat(account)])
}

pub fn assets_account(asset_id: u32, account: &AccountId) -> Vec<u8> {
    map_key(
        "Assets",
        "Account",
        &[blake2_128_concat(&asset_id.encode()), blake2_128_concat(account)],
    )
}

pub fn assets_asset(asset_id: u32) -> Vec<u8> {
    map_key("Assets", "Asset", &[blake2_128_concat(&asset_id.encode())])
}

pub fn assets_metadata(asset_id: u32) -> Vec<u8> {
    map_key("Assets", "Metadata", &[blake2_128_concat(&asset_id.encode())])
}

/// orml-tokens balance; `currency_id` is already SCALE-encoded
pub fn tokens_accounts(account: &AccountId, currency_id: &[u8]) -> Vec<u8> {
    map_key(
        "Tokens",
        "Accounts",
        &[blake2_128_concat(account), twox_64_concat(currency_id)],
    )
}

pub fn pool_members(account: &AccountId) -> Vec<u8> {
    map_key("NominationPools", "PoolMembers", &[twox_64_concat(account)])
}

pub fn bonded_pools(pool_id: u32) -> Vec<u8> {
    map_key("NominationPools", "BondedPools", &[twox_64_concat(&pool_id.encode())])
}

pub fn staking_bonded(stash: &AccountId) -> Vec<u8> {
    map_key("Staking", "Bonded", &[twox_64_concat(stash)])
}

pub fn staking_ledger(controller: &AccountId) -> Vec<u8> {
    map_key("Staking", "Ledger", &[blake2_128_concat(controller)])
}

/// Stash account that bonds a nomination pool's funds
pub fn pool_bonded_account(pool_id: u32) -> AccountId {
    // ("modl", PalletId, (AccountType::Bonded, pool_id)) zero-padded to 32 bytes
    let mut account = [0u8; 32];
    let mut encoded = Vec::with_capacity(17);
    encoded.extend_from_slice(MODULE_PREFIX);
    encoded.extend_from_slice(POOLS_PALLET_ID);
    encoded.push(0);
    encoded.extend_from_slice(&pool_id.encode());
    account[..encoded.len()].copy_from_slice(&encoded);
    account
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_prefixes() {
        assert_eq!(
            hex::encode(storage_prefix("System", "Account")),
            "26aa394eea5630e07c48ae0c9558cef7b99d880ec681799c0cf30e8886371da9"
        );
        assert_eq!(
            hex::encode(twox_128(b"Assets")),
            "682a59d51ab9e48a8c8cc418ff9708d2"
        );
    }

    #[test]
    fn test_system_account_key_layout() {
        let account = [7u8; 32];
        let key = system_account(&account);
        assert_eq!(key.len(), 32 + 16 + 32);
        assert_eq!(&key[48..], &account);
    }

    #[test]
    fn test_double_map_key_layout() {
        let account = [1u8; 32];
        let key = tokens_accounts(&account, &[0x00, 0x02]);
        // prefix + blake2_128_concat(account) + twox_64_concat(currency)
        assert_eq!(key.len(), 32 + 48 + 10);
        assert_eq!(&key[key.len() - 2..], &[0x00, 0x02]);
    }

    #[test]
    fn test_pool_bonded_account() {
        let account = pool_bonded_account(12);
        assert_eq!(&account[..4], b"modl");
        assert_eq!(&account[4..12], b"py/nopls");
        assert_eq!(account[12], 0);
        assert_eq!(&account[13..17], &12u32.to_le_bytes());
        assert!(account[17..].iter().all(|b| *b == 0));
    }
}
