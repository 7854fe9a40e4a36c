//! Native token worker for relay and single-token chains

use crate::balance::{Balance, BalanceBreakdown};
use crate::chains::Chain;
use crate::error::RpcError;
use crate::pool;
use crate::rpc::scale::AccountInfo;
use crate::rpc::{queries, AccountId, ChainApi};

use super::{MessageBody, WorkerMessage};

pub async fn fetch(
    api: &dyn ChainApi,
    chain: &Chain,
    accounts: &[(String, AccountId)],
) -> Result<WorkerMessage, RpcError> {
    let ids: Vec<AccountId> = accounts.iter().map(|(_, id)| *id).collect();
    let infos = queries::accounts(api, &ids).await?;
    let pooled = pool::pooled_balances(api, &ids).await?;

    let mut message = WorkerMessage::new();
    for (((address, _), info), pooled) in accounts.iter().zip(infos).zip(pooled) {
        message.push(address, MessageBody::native(chain, breakdown(info.as_ref(), pooled)));
    }

    log::info!(
        "Fetched native balances of {} account(s) on {}",
        accounts.len(),
        chain.name
    );
    Ok(message)
}

/// Split of a native balance; an account absent from storage holds nothing
pub(crate) fn breakdown(info: Option<&AccountInfo>, pooled: Balance) -> BalanceBreakdown {
    match info {
        Some(info) => BalanceBreakdown {
            free: Balance(info.data.free),
            reserved: Balance(info.data.reserved),
            locked: Balance(info.data.locked()),
            pooled,
        },
        None => BalanceBreakdown {
            pooled,
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{run_worker, WorkerRequest};
    use crate::chains::ChainCategory;
    use crate::rpc::keys;
    use crate::rpc::queries::mock::MockApi;
    use crate::rpc::scale::{AccountData, AccountInfo};
    use crate::rpc::ss58;
    use crate::balance::Balance;

    #[tokio::test]
    async fn test_total_is_free_plus_reserved_plus_pooled() {
        let chain = test_chain("polkadot");
        let api = MockApi::new(GENESIS);
        let alice = ss58::account_id(ALICE).unwrap();
        api.put(
            keys::system_account(&alice),
            &AccountInfo {
                data: AccountData {
                    free: 1_000,
                    reserved: 200,
                    frozen: 500,
                    flags: 0,
                },
                ..Default::default()
            },
        );

        let request = WorkerRequest::for_chain(&chain, ChainCategory::Relay, vec![ALICE.into()]);
        let message = run_worker(&request, &chain, &api).await.unwrap();
        let balances = message.into_balances(GENESIS).unwrap();

        let record = &balances[ALICE][0];
        assert_eq!(record.total_balance, Balance(1_200));
        assert_eq!(record.token, "UNIT");
        assert!(record.is_native());
        assert_eq!(record.breakdown.as_ref().unwrap().locked, Balance(500));
    }

    #[tokio::test]
    async fn test_absent_account_is_a_real_zero() {
        let chain = test_chain("kusama");
        let api = MockApi::new(GENESIS);

        let request = WorkerRequest::for_chain(&chain, ChainCategory::Relay, vec![ALICE.into()]);
        let message = run_worker(&request, &chain, &api).await.unwrap();
        let balances = message.into_balances(GENESIS).unwrap();
        assert_eq!(balances[ALICE][0].total_balance, Balance::ZERO);
    }

    #[tokio::test]
    async fn test_invalid_addresses_are_skipped() {
        let chain = test_chain("kusama");
        let api = MockApi::new(GENESIS);

        let request = WorkerRequest::for_chain(
            &chain,
            ChainCategory::Relay,
            vec![ALICE.into(), "not-an-address".into()],
        );
        let message = run_worker(&request, &chain, &api).await.unwrap();
        assert_eq!(message.0.len(), 1);
    }
}
