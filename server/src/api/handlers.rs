use axum::{
    extract::{Path, Query, State},
    Json,
};
use polkagate_balances::chains::category_of_chain;
use polkagate_balances::{
    AccountBalances, AssetInfo, BalanceAggregator, PriceSnapshot, RefreshReport,
};
use std::sync::Arc;

use super::types::*;
use crate::error::ApiError;

pub type AppState = Arc<BalanceAggregator>;

pub async fn health_handler() -> &'static str {
    "OK"
}

pub async fn list_chains_handler(State(aggregator): State<AppState>) -> Json<Vec<ChainInfo>> {
    let chains = aggregator
        .registry()
        .all()
        .map(|chain| ChainInfo {
            category: category_of_chain(chain),
            chain: chain.clone(),
        })
        .collect();
    Json(chains)
}

pub async fn get_balances_handler(
    State(aggregator): State<AppState>,
    Query(query): Query<BalancesQuery>,
) -> Result<Json<BalancesResponse>, ApiError> {
    let addresses = split_list(query.addresses.as_deref());
    if addresses.is_empty() {
        return Err(ApiError::InvalidInput("addresses is required".to_string()));
    }
    let chains = split_list(query.chains.as_deref());
    let selected = (!chains.is_empty()).then_some(chains.as_slice());

    let balances = aggregator.view(&addresses, selected);
    Ok(Json(BalancesResponse {
        balances,
        time_stamp: aggregator.subscribe().borrow().time_stamp,
    }))
}

pub async fn refresh_balances_handler(
    State(aggregator): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshReport>, ApiError> {
    let chains = match req.chains {
        Some(chains) => chains,
        None => aggregator
            .registry()
            .all()
            .map(|c| c.genesis_hash.clone())
            .collect(),
    };

    let report = if req.force {
        aggregator.force_refresh(&req.addresses, &chains).await?
    } else {
        aggregator.refresh(&req.addresses, &chains).await?
    };
    Ok(Json(report))
}

pub async fn get_account_balances_handler(
    State(aggregator): State<AppState>,
    Path((address, genesis_hash)): Path<(String, String)>,
) -> Result<Json<AccountBalances>, ApiError> {
    let balances = aggregator.account_balances(&address, &genesis_hash).await?;
    Ok(Json(balances))
}

pub async fn get_pooled_balance_handler(
    State(aggregator): State<AppState>,
    Path((address, genesis_hash)): Path<(String, String)>,
) -> Result<Json<PooledBalanceResponse>, ApiError> {
    let pooled = aggregator.pooled_balance(&address, &genesis_hash).await?;
    Ok(Json(PooledBalanceResponse {
        address,
        genesis_hash,
        pooled_balance: pooled,
    }))
}

pub async fn get_asset_info_handler(
    State(aggregator): State<AppState>,
    Path((address, genesis_hash, asset_id)): Path<(String, String, u32)>,
) -> Result<Json<AssetInfo>, ApiError> {
    let info = aggregator.asset_info(&address, &genesis_hash, asset_id).await?;
    Ok(Json(info))
}

pub async fn get_prices_handler(
    State(aggregator): State<AppState>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<PriceSnapshot>, ApiError> {
    let ids = split_list(query.ids.as_deref());
    let snapshot = aggregator.prices(&ids, query.currency.as_deref()).await?;
    Ok(Json(snapshot))
}
