//! Multi-asset worker: native token plus whitelisted orml `Tokens` balances

use crate::balance::Balance;
use crate::chains::{AssetDescriptor, AssetKind, Chain};
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

    let mut tokens = Vec::with_capacity(assets.len());
    let mut currency_ids = Vec::with_capacity(assets.len());
    for asset in assets {
        if let AssetKind::Token { currency_id_hex } = &asset.kind {
            currency_ids.push(hex::decode(currency_id_hex.trim_start_matches("0x"))?);
            tokens.push(asset);
        }
    }
    if tokens.is_empty() {
        return Ok(message);
    }

    let holdings = queries::orml_accounts(api, &currency_ids, &ids).await?;
    for (asset, row) in tokens.iter().zip(holdings.chunks(ids.len())) {
        for ((address, _), holding) in accounts.iter().zip(row) {
            let total = holding
                .as_ref()
                .map(|h| Balance(h.free) + Balance(h.reserved))
                .unwrap_or_default();
            if total.is_zero() {
                continue;
            }
            message.push(address, MessageBody::asset(chain, asset, total));
        }
    }

    log::info!(
        "Fetched {} token(s) for {} account(s) on {}",
        tokens.len(),
        accounts.len(),
        chain.name
    );
    Ok(message)
}
