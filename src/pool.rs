//! Nomination-pool stake of an account
//!
//! The pooled balance is the member's share of the pool's active stake,
//! plus rewards not yet claimed, plus everything still unbonding.

use codec::Encode;

use crate::balance::Balance;
use crate::error::RpcError;
use crate::rpc::keys;
use crate::rpc::queries::decode_batch;
use crate::rpc::scale::{self, BondedPoolInner, PoolMember, StakingLedger};
use crate::rpc::{AccountId, ChainApi};

pub const PENDING_REWARDS_API: &str = "NominationPoolsApi_pending_rewards";

/// Pooled balance of a single account
pub async fn pooled_balance(api: &dyn ChainApi, account: &AccountId) -> Result<Balance, RpcError> {
    let mut balances = pooled_balances(api, std::slice::from_ref(account)).await?;
    Ok(balances.pop().unwrap_or_default())
}

/// Pooled balances of several accounts, in order
pub async fn pooled_balances(
    api: &dyn ChainApi,
    accounts: &[AccountId],
) -> Result<Vec<Balance>, RpcError> {
    let members: Vec<Option<PoolMember>> =
        decode_batch(api, accounts.iter().map(keys::pool_members).collect()).await?;

    let mut balances = Vec::with_capacity(accounts.len());
    for (account, member) in accounts.iter().zip(members) {
        let balance = match member {
            Some(member) => member_balance(api, account, &member).await?,
            None => Balance::ZERO,
        };
        balances.push(balance);
    }
    Ok(balances)
}

async fn member_balance(
    api: &dyn ChainApi,
    account: &AccountId,
    member: &PoolMember,
) -> Result<Balance, RpcError> {
    let pool: Option<BondedPoolInner> = api
        .storage(&keys::bonded_pools(member.pool_id))
        .await?
        .map(|bytes| scale::decode_prefix(&bytes))
        .transpose()?;

    let Some(pool) = pool else {
        log::warn!("Pool {} not found, treating pooled balance as zero", member.pool_id);
        return Ok(Balance::ZERO);
    };

    let active = pool_active_stake(api, member.pool_id).await?;
    let staked = share_of(member.points, active, pool.points);
    let rewards = pending_rewards(api, account).await;

    Ok(Balance(staked) + rewards + member.unbonding())
}

/// Active stake held by the pool's bonded account
async fn pool_active_stake(api: &dyn ChainApi, pool_id: u32) -> Result<u128, RpcError> {
    let stash = keys::pool_bonded_account(pool_id);

    // Ledgers are keyed by controller; pools bond with controller == stash
    let controller: AccountId = api
        .storage(&keys::staking_bonded(&stash))
        .await?
        .map(|bytes| scale::decode_prefix(&bytes))
        .transpose()?
        .unwrap_or(stash);

    let ledger: Option<StakingLedger> = api
        .storage(&keys::staking_ledger(&controller))
        .await?
        .map(|bytes| scale::decode_prefix(&bytes))
        .transpose()?;

    Ok(ledger.map(|l| l.active).unwrap_or_default())
}

async fn pending_rewards(api: &dyn ChainApi, account: &AccountId) -> Balance {
    let result = match api.call(PENDING_REWARDS_API, &account.encode()).await {
        Ok(bytes) => scale::decode_prefix::<u128>(&bytes).map_err(RpcError::from),
        Err(e) => Err(e),
    };
    match result {
        Ok(rewards) => Balance(rewards),
        Err(e) => {
            log::warn!("Could not read pending pool rewards: {}", e);
            Balance::ZERO
        }
    }
}

/// `points * active / pool_points` without overflowing
fn share_of(points: u128, active: u128, pool_points: u128) -> u128 {
    if points == 0 {
        return 0;
    }
    mul_div(points, active, pool_points.max(1))
}

/// `a * b / d` with a 256-bit intermediate product; saturates if the quotient does not fit
fn mul_div(a: u128, b: u128, d: u128) -> u128 {
    let (hi, lo) = widening_mul(a, b);
    if hi == 0 {
        return lo / d;
    }
    if hi >= d {
        return u128::MAX;
    }

    let mut remainder = hi;
    let mut quotient: u128 = 0;
    for i in (0..128).rev() {
        let carry = remainder >> 127;
        remainder = (remainder << 1) | ((lo >> i) & 1);
        quotient <<= 1;
        if carry == 1 || remainder >= d {
            remainder = remainder.wrapping_sub(d);
            quotient |= 1;
        }
    }
    quotient
}

/// Full product as (high, low) 128-bit halves
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a1, a0) = (a >> 64, a & MASK);
    let (b1, b0) = (b >> 64, b & MASK);

    let p00 = a0 * b0;
    let p01 = a0 * b1;
    let p10 = a1 * b0;
    let p11 = a1 * b1;

    let mid = (p00 >> 64) + (p01 & MASK) + (p10 & MASK);
    let lo = (p00 & MASK) | ((mid & MASK) << 64);
    let hi = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);
    (hi, lo)
}
