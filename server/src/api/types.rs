use polkagate_balances::{Balance, BalancesView, Chain, ChainCategory};
use serde::{Deserialize, Serialize};

/// Comma-separated query values, e.g. `?addresses=a,b`
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct BalancesQuery {
    pub addresses: Option<String>,
    pub chains: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub balances: BalancesView,
    pub time_stamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub addresses: Vec<String>,
    /// Genesis hashes; every registered chain when absent
    #[serde(default)]
    pub chains: Option<Vec<String>>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PooledBalanceResponse {
    pub address: String,
    pub genesis_hash: String,
    pub pooled_balance: Balance,
}

#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    pub ids: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    #[serde(flatten)]
    pub chain: Chain,
    pub category: ChainCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some("a, b,,c ")), vec!["a", "b", "c"]);
        assert!(split_list(None).is_empty());
        assert!(split_list(Some("")).is_empty());
    }

    #[test]
    fn test_refresh_request_defaults() {
        let req: RefreshRequest = serde_json::from_str(r#"{"addresses":["a"]}"#).unwrap();
        assert!(!req.force);
        assert!(req.chains.is_none());
    }
}
