//! Balance data model
//!
//! On-chain amounts are `u128` plancks. On the wire and in the cache they
//! travel as decimal strings so nothing is lost to JSON number precision.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// An amount in the chain's smallest unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Balance(pub u128);

impl Balance {
    pub const ZERO: Balance = Balance(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: Balance) -> Balance {
        Balance(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Balance) -> Balance {
        Balance(self.0.saturating_sub(other.0))
    }
}

impl Add for Balance {
    type Output = Balance;

    fn add(self, rhs: Balance) -> Balance {
        self.saturating_add(rhs)
    }
}

impl std::iter::Sum for Balance {
    fn sum<I: Iterator<Item = Balance>>(iter: I) -> Balance {
        iter.fold(Balance::ZERO, Add::add)
    }
}

impl From<u128> for Balance {
    fn from(value: u128) -> Self {
        Balance(value)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBalanceError(pub String);

impl fmt::Display for ParseBalanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid balance '{}'", self.0)
    }
}

impl std::error::Error for ParseBalanceError {}

impl FromStr for Balance {
    type Err = ParseBalanceError;

    /// Accepts decimal strings and `0x`-prefixed hex
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            Some("") => Ok(0),
            Some(hex_digits) => u128::from_str_radix(hex_digits, 16),
            None => trimmed.parse::<u128>(),
        };
        parsed
            .map(Balance)
            .map_err(|_| ParseBalanceError(s.to_string()))
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older cache files may hold plain JSON numbers for small values
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Number(n) => Ok(Balance(n as u128)),
        }
    }
}

/// Free/reserved/locked/pooled split of a native balance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceBreakdown {
    pub free: Balance,
    pub reserved: Balance,
    pub locked: Balance,
    pub pooled: Balance,
}

impl BalanceBreakdown {
    pub fn total(&self) -> Balance {
        self.free + self.reserved + self.pooled
    }
}

/// One balance record per (address, chain, asset)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<u32>,
    pub total_balance: Balance,
    pub chain_name: String,
    pub decimal: u8,
    pub genesis_hash: String,
    pub price_id: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<BalanceBreakdown>,
}

impl AssetBalance {
    pub fn is_native(&self) -> bool {
        self.asset_id.is_none()
    }
}

/// What the aggregator knows about one (address, chain) slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BalanceState {
    /// Nothing cached and nothing in flight
    NotLoaded,
    /// A worker is fetching this slot right now
    Loading {
        #[serde(skip_serializing_if = "Option::is_none")]
        last_known: Option<Vec<AssetBalance>>,
    },
    Loaded {
        records: Vec<AssetBalance>,
        fetched_at: Option<i64>,
    },
    /// The last fetch failed; older data is kept if we had any
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_known: Option<Vec<AssetBalance>>,
    },
}

impl BalanceState {
    pub fn records(&self) -> Option<&[AssetBalance]> {
        match self {
            BalanceState::Loaded { records, .. } => Some(records),
            BalanceState::Loading { last_known } | BalanceState::Failed { last_known, .. } => {
                last_known.as_deref()
            }
            BalanceState::NotLoaded => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, BalanceState::Loaded { .. })
    }
}

/// Detailed native balances of one account on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalances {
    pub address: String,
    pub chain_name: String,
    pub genesis_hash: String,
    pub token: String,
    pub decimal: u8,
    pub free_balance: Balance,
    pub reserved_balance: Balance,
    pub locked_balance: Balance,
    pub pooled_balance: Balance,
    pub available_balance: Balance,
    #[serde(rename = "ED")]
    pub existential_deposit: Balance,
    pub date: i64,
}

impl AccountBalances {
    pub fn breakdown(&self) -> BalanceBreakdown {
        BalanceBreakdown {
            free: self.free_balance,
            reserved: self.reserved_balance,
            locked: self.locked_balance,
            pooled: self.pooled_balance,
        }
    }
}

/// Balance of a single pallet asset together with its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub asset_id: u32,
    pub chain_name: String,
    pub genesis_hash: String,
    pub token: String,
    pub decimal: u8,
    pub free_balance: Balance,
    pub available_balance: Balance,
    #[serde(rename = "ED")]
    pub min_balance: Balance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_and_hex() {
        assert_eq!("1000".parse::<Balance>().unwrap(), Balance(1000));
        assert_eq!("0x3e8".parse::<Balance>().unwrap(), Balance(1000));
        assert_eq!("0x".parse::<Balance>().unwrap(), Balance::ZERO);
        assert!("ten".parse::<Balance>().is_err());
    }

    #[test]
    fn test_serializes_as_decimal_string() {
        let big = Balance(u128::MAX);
        let json = serde_json::to_string(&big).unwrap();
        assert_eq!(json, format!("\"{}\"", u128::MAX));

        let back: Balance = serde_json::from_str(&json).unwrap();
        assert_eq!(back, big);
    }

    #[test]
    fn test_accepts_plain_numbers() {
        let b: Balance = serde_json::from_str("42").unwrap();
        assert_eq!(b, Balance(42));
    }

    #[test]
    fn test_breakdown_total_excludes_locked() {
        let breakdown = BalanceBreakdown {
            free: Balance(100),
            reserved: Balance(20),
            locked: Balance(50),
            pooled: Balance(7),
        };
        assert_eq!(breakdown.total(), Balance(127));
    }

    #[test]
    fn test_not_loaded_has_no_records() {
        assert!(BalanceState::NotLoaded.records().is_none());
        let failed = BalanceState::Failed {
            error: "timeout".into(),
            last_known: None,
        };
        assert!(failed.records().is_none());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(BalanceState::NotLoaded).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "notLoaded" }));

        let loaded = BalanceState::Loaded {
            records: Vec::new(),
            fetched_at: Some(7),
        };
        let json = serde_json::to_value(loaded).unwrap();
        assert_eq!(json["status"], "loaded");
        assert_eq!(json["fetchedAt"], 7);
    }
}
