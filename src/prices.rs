//! Token prices from the CoinGecko simple-price API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AggregatorError;
use crate::staleness::now_millis;

pub const DEFAULT_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Price of one asset in the requested currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub value: f64,
    /// 24h change in percent
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub currency_code: String,
    pub date: i64,
    pub prices: BTreeMap<String, Price>,
}

/// Client for a CoinGecko-compatible simple-price endpoint
pub struct PriceFeed {
    client: reqwest::Client,
    base_url: String,
}

impl PriceFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch(
        &self,
        price_ids: &[String],
        currency: &str,
    ) -> Result<PriceSnapshot, AggregatorError> {
        let currency = currency.to_lowercase();
        let ids: Vec<&str> = price_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !id.is_empty())
            .collect();

        if ids.is_empty() {
            return Ok(PriceSnapshot {
                currency_code: currency,
                date: now_millis(),
                prices: BTreeMap::new(),
            });
        }

        log::info!("Fetching {} price(s) in {}", ids.len(), currency);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("ids", ids.join(",")),
                ("vs_currencies", currency.clone()),
                ("include_24hr_change", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AggregatorError::PriceFeed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AggregatorError::PriceFeed(format!(
                "price endpoint returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AggregatorError::PriceFeed(e.to_string()))?;

        Ok(parse_prices(&body, &currency))
    }
}

/// Turn a simple-price response into a snapshot.
///
/// Entries without a price in `currency` are left out; a missing change is 0.
pub fn parse_prices(body: &serde_json::Value, currency: &str) -> PriceSnapshot {
    let change_key = format!("{}_24h_change", currency);

    let prices = body
        .as_object()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(id, entry)| {
                    let value = entry[currency].as_f64()?;
                    let change = entry[change_key.as_str()].as_f64().unwrap_or(0.0);
                    Some((id.clone(), Price { value, change }))
                })
                .collect()
        })
        .unwrap_or_default();

    PriceSnapshot {
        currency_code: currency.to_string(),
        date: now_millis(),
        prices,
    }
}
