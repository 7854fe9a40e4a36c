//! End-to-end tests over JSON-RPC
//!
//! Starts `node-mock` on an ephemeral port, seeds SCALE-encoded storage and
//! drives the real HTTP client and the aggregator against it.
//!
//! Run with: cargo test --test rpc_end_to_end_test -- --nocapture

mod common;

use codec::Encode;
use common::*;
use node_mock::MockNode;
use polkagate_balances::chains::{KUSAMA_GENESIS, POLKADOT_GENESIS};
use polkagate_balances::pool::PENDING_REWARDS_API;
use polkagate_balances::rpc::keys;
use polkagate_balances::rpc::scale::{BondedPoolInner, Commission, PoolMember, StakingLedger};
use polkagate_balances::{
    AggregatorConfig, Balance, BalanceAggregator, ChainApi, OutcomeStatus, RefreshStatus,
    RpcClient,
};
use std::collections::{BTreeMap, HashMap};
use tempfile::TempDir;

async fn polkadot_node() -> MockNode {
    MockNode::spawn(POLKADOT_GENESIS, "Polkadot")
        .await
        .expect("mock node")
}

/// Pool 1 holds 4000 active for 1000 points; ALICE owns 250 of them
fn seed_pool_member(node: &MockNode) {
    let alice = account(ALICE);
    let state = node.state();

    let member = PoolMember {
        pool_id: 1,
        points: 250,
        last_recorded_reward_counter: 0,
        unbonding_eras: BTreeMap::from([(5, 30)]),
    };
    state.put_storage_bytes(&keys::pool_members(&alice), &member.encode());

    let pool = BondedPoolInner {
        commission: Commission::default(),
        member_counter: 4,
        points: 1_000,
    };
    state.put_storage_bytes(&keys::bonded_pools(1), &pool.encode());

    let stash = keys::pool_bonded_account(1);
    let ledger = StakingLedger {
        stash,
        total: 4_000,
        active: 4_000,
    };
    state.put_storage_bytes(&keys::staking_ledger(&stash), &ledger.encode());

    let rewards = format!("0x{}", hex::encode(12u128.encode()));
    state.put_call(PENDING_REWARDS_API, None, &rewards);
}

#[tokio::test]
async fn test_client_reads_genesis_and_batched_storage() {
    init_logger();
    let node = polkadot_node().await;
    let alice = account(ALICE);
    node.state()
        .put_storage_bytes(&keys::system_account(&alice), &account_info(77, 0, 0).encode());

    let client = RpcClient::new(node.url());

    assert_eq!(client.genesis_hash().await.unwrap(), POLKADOT_GENESIS);

    let values = client
        .storage_batch(&[keys::system_account(&alice), keys::system_account(&account(BOB))])
        .await
        .unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].as_deref(), Some(account_info(77, 0, 0).encode().as_slice()));
    assert!(values[1].is_none());
}

#[tokio::test]
async fn test_client_surfaces_node_errors() {
    init_logger();
    let node = polkadot_node().await;
    let client = RpcClient::new(node.url());

    let err = client.call("Missing_api", &[]).await.unwrap_err();
    assert!(err.to_string().contains("Missing_api"));
}

#[tokio::test]
async fn test_refresh_over_rpc_includes_pooled_stake() {
    init_logger();
    let node = polkadot_node().await;
    node.state().put_storage_bytes(
        &keys::system_account(&account(ALICE)),
        &account_info(1_000, 500, 0).encode(),
    );
    seed_pool_member(&node);

    let temp_dir = TempDir::new().unwrap();
    let config = AggregatorConfig {
        cache_dir: temp_dir.path().to_path_buf(),
        rpc_overrides: HashMap::from([("polkadot".to_string(), node.url())]),
        ..Default::default()
    };
    let aggregator = BalanceAggregator::from_config(&config).unwrap();

    let report = aggregator
        .refresh(&[ALICE.to_string(), BOB.to_string()], &[POLKADOT_GENESIS.to_string()])
        .await
        .unwrap();
    assert_eq!(report.status, RefreshStatus::Ran);
    assert_eq!(
        report.outcome(POLKADOT_GENESIS),
        Some(&OutcomeStatus::Merged { slots: 2 })
    );

    let alice = aggregator.balance_state(ALICE, POLKADOT_GENESIS);
    let record = &alice.records().unwrap()[0];
    let breakdown = record.breakdown.as_ref().unwrap();
    // 250/1000 of 4000, plus 12 pending, plus 30 unbonding
    assert_eq!(breakdown.pooled, Balance(1_042));
    assert_eq!(record.total_balance, Balance(2_542));

    let bob = aggregator.balance_state(BOB, POLKADOT_GENESIS);
    assert_eq!(bob.records().unwrap()[0].total_balance, Balance::ZERO);

    let pooled = aggregator.pooled_balance(ALICE, POLKADOT_GENESIS).await.unwrap();
    assert_eq!(pooled, Balance(1_042));
}

#[tokio::test]
async fn test_endpoint_serving_another_chain_is_rejected() {
    init_logger();
    // Kusama's endpoint answers with Polkadot's genesis
    let node = polkadot_node().await;

    let temp_dir = TempDir::new().unwrap();
    let config = AggregatorConfig {
        cache_dir: temp_dir.path().to_path_buf(),
        rpc_overrides: HashMap::from([("kusama".to_string(), node.url())]),
        ..Default::default()
    };
    let aggregator = BalanceAggregator::from_config(&config).unwrap();

    let report = aggregator
        .force_refresh(&[ALICE.to_string()], &[KUSAMA_GENESIS.to_string()])
        .await
        .unwrap();

    match report.outcome(KUSAMA_GENESIS) {
        Some(OutcomeStatus::Failed { error }) => assert!(error.contains(POLKADOT_GENESIS)),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(aggregator.balance_state(ALICE, KUSAMA_GENESIS).records().is_none());
}
