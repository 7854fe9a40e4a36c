//! Asset hub worker: native token plus whitelisted `Assets` pallet balances

use crate::balance::Balance;
use crate::chains::{AssetDescriptor, Chain};
use crate::error::RpcError;
use crate::rpc::{queries, AccountId, ChainApi};

use super::relay::breakdown;
use super::{MessageBody, WorkerMessage};

pub async fn fetch(
    api: &dyn ChainApi,
    chain: &Chain,
    accounts: &[(String, AccountId)],
    assets: &[AssetDescriptor],
) -> Result<WorkerMessage, RpcError> {
    let ids: Vec<AccountId> = accounts.iter().map(|(_, id)| *id).collect();
    let infos = queries::accounts(api, &ids).await?;

    let mut message = WorkerMessage::new();
    for ((address, _), info) in accounts.iter().zip(&infos) {
        message.push(
            address,
            MessageBody::native(chain, breakdown(info.as_ref(), Balance::ZERO)),
        );
    }

    if assets.is_empty() {
        log::debug!("No whitelisted assets on {}", chain.name);
        return Ok(message);
    }

    let asset_ids: Vec<u32> = assets.iter().map(|a| a.id).collect();
    let asset_accounts = queries::asset_accounts(api, &asset_ids, &ids).await?;

    // asset-major: one row of accounts per asset
    for (asset, row) in assets.iter().zip(asset_accounts.chunks(ids.len())) {
        for ((address, _), holding) in accounts.iter().zip(row) {
            let balance = holding.as_ref().map(|h| h.balance).unwrap_or_default();
            if balance == 0 {
                continue;
            }
            message.push(address, MessageBody::asset(chain, asset, Balance(balance)));
        }
    }

    log::info!(
        "Fetched {} asset(s) for {} account(s) on {}",
        assets.len(),
        accounts.len(),
        chain.name
    );
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{run_worker, WorkerRequest};
    use crate::balance::Balance;
    use crate::chains::ChainCategory;
    use crate::rpc::keys;
    use crate::rpc::queries::mock::MockApi;
    use crate::rpc::scale::{AssetAccount, AssetAccountStatus};
    use crate::rpc::ss58;

    #[tokio::test]
    async fn test_zero_asset_balances_are_dropped() {
        let mut chain = test_chain("westendassethub");
        chain.assets = vec![pallet_asset(1984, "USDt"), pallet_asset(8, "RMRK")];
        let api = MockApi::new(GENESIS);
        let alice = ss58::account_id(ALICE).unwrap();
        api.put(
            keys::assets_account(1984, &alice),
            &AssetAccount {
                balance: 7_000_000,
                status: AssetAccountStatus::Liquid,
            },
        );
        api.put(
            keys::assets_account(8, &alice),
            &AssetAccount {
                balance: 0,
                status: AssetAccountStatus::Frozen,
            },
        );

        let request = WorkerRequest::for_chain(&chain, ChainCategory::AssetHub, vec![ALICE.into()]);
        let balances = run_worker(&request, &chain, &api)
            .await
            .unwrap()
            .into_balances(GENESIS)
            .unwrap();

        let records = &balances[ALICE];
        assert_eq!(records.len(), 2);
        assert!(records[0].is_native());
        assert_eq!(records[1].asset_id, Some(1984));
        assert_eq!(records[1].token, "USDt");
        assert_eq!(records[1].decimal, 6);
        assert_eq!(records[1].total_balance, Balance(7_000_000));
    }

    #[tokio::test]
    async fn test_one_batch_for_all_addresses() {
        let mut chain = test_chain("westendassethub");
        chain.assets = vec![pallet_asset(1984, "USDt")];
        let api = MockApi::new(GENESIS);
        let bob = ss58::encode(&[2u8; 32], 42).unwrap();

        let request = WorkerRequest::for_chain(
            &chain,
            ChainCategory::AssetHub,
            vec![ALICE.into(), bob.clone()],
        );
        let message = run_worker(&request, &chain, &api).await.unwrap();
        assert_eq!(message.0.len(), 2);
        // one read for System.Account, one for Assets.Account
        assert_eq!(api.batch_count(), 2);
    }
}
