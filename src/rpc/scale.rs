//! SCALE layouts of the storage values we read
//!
//! Only the leading fields are declared where a value has a long tail we
//! do not need; decoding stops once they are read.

use codec::{Decode, Encode};
use std::collections::BTreeMap;

use super::ss58::AccountId;
use crate::balance::Balance;

/// Set on `AccountData::flags` by runtimes using the frozen/flags layout
const IS_NEW_LOGIC: u128 = 0x8000_0000_0000_0000_0000_0000_0000_0000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct AccountData {
    pub free: u128,
    pub reserved: u128,
    /// `frozen`, or `misc_frozen` on legacy runtimes
    pub frozen: u128,
    /// `flags`, or `fee_frozen` on legacy runtimes
    pub flags: u128,
}

impl AccountData {
    pub fn locked(&self) -> u128 {
        if self.flags & IS_NEW_LOGIC != 0 {
            self.frozen
        } else {
            self.frozen.max(self.flags)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct AccountInfo {
    pub nonce: u32,
    pub consumers: u32,
    pub providers: u32,
    pub sufficients: u32,
    pub data: AccountData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum AssetAccountStatus {
    Liquid,
    Frozen,
    Blocked,
}

/// Leading fields of `pallet_assets::AssetAccount`
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct AssetAccount {
    pub balance: u128,
    pub status: AssetAccountStatus,
}

/// Leading fields of `pallet_assets::AssetDetails`
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct AssetDetails {
    pub owner: AccountId,
    pub issuer: AccountId,
    pub admin: AccountId,
    pub freezer: AccountId,
    pub supply: u128,
    pub deposit: u128,
    pub min_balance: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct AssetMetadata {
    pub deposit: u128,
    pub name: Vec<u8>,
    pub symbol: Vec<u8>,
    pub decimals: u8,
    pub is_frozen: bool,
}

impl AssetMetadata {
    pub fn symbol(&self) -> String {
        String::from_utf8_lossy(&self.symbol).into_owned()
    }
}

/// `orml_tokens::AccountData`
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct OrmlAccountData {
    pub free: u128,
    pub reserved: u128,
    pub frozen: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PoolMember {
    pub pool_id: u32,
    pub points: u128,
    pub last_recorded_reward_counter: u128,
    pub unbonding_eras: BTreeMap<u32, u128>,
}

impl PoolMember {
    pub fn unbonding(&self) -> Balance {
        self.unbonding_eras.values().map(|v| Balance(*v)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CommissionChangeRate {
    pub max_increase: u32,
    pub min_delay: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum CommissionClaimPermission {
    Permissionless,
    Account(AccountId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Commission {
    pub current: Option<(u32, AccountId)>,
    pub max: Option<u32>,
    pub change_rate: Option<CommissionChangeRate>,
    pub throttle_from: Option<u32>,
    pub claim_permission: Option<CommissionClaimPermission>,
}

/// Leading fields of `pallet_nomination_pools::BondedPoolInner`
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct BondedPoolInner {
    pub commission: Commission,
    pub member_counter: u32,
    pub points: u128,
}

/// Leading fields of `pallet_staking::StakingLedger`
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct StakingLedger {
    pub stash: AccountId,
    #[codec(compact)]
    pub total: u128,
    #[codec(compact)]
    pub active: u128,
}

/// Decode a storage value, ignoring trailing fields we do not model
pub fn decode_prefix<T: Decode>(bytes: &[u8]) -> Result<T, codec::Error> {
    let mut input = bytes;
    T::decode(&mut input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_new_layout() {
        let data = AccountData {
            free: 100,
            reserved: 0,
            frozen: 40,
            flags: IS_NEW_LOGIC,
        };
        assert_eq!(data.locked(), 40);
    }

    #[test]
    fn test_locked_legacy_layout() {
        let data = AccountData {
            free: 100,
            reserved: 0,
            frozen: 30,
            flags: 55,
        };
        assert_eq!(data.locked(), 55);
    }

    #[test]
    fn test_decode_ignores_tail() {
        let ledger = StakingLedger {
            stash: [3u8; 32],
            total: 500,
            active: 400,
        };
        let mut bytes = ledger.encode();
        // unlocking chunks and legacy claimed rewards follow on chain
        bytes.extend_from_slice(&[0x00, 0x00]);
        let decoded: StakingLedger = decode_prefix(&bytes).unwrap();
        assert_eq!(decoded, ledger);
    }

    #[test]
    fn test_pool_member_unbonding_sum() {
        let mut eras = BTreeMap::new();
        eras.insert(10, 5);
        eras.insert(11, 7);
        let member = PoolMember {
            pool_id: 1,
            points: 0,
            last_recorded_reward_counter: 0,
            unbonding_eras: eras,
        };
        let decoded: PoolMember = decode_prefix(&member.encode()).unwrap();
        assert_eq!(decoded.unbonding(), Balance(12));
    }
}
