//! Typed storage reads on top of `ChainApi`

use codec::Decode;

use super::client::ChainApi;
use super::keys;
use super::scale::{self, AccountInfo, AssetAccount, AssetDetails, AssetMetadata, OrmlAccountData};
use super::ss58::AccountId;
use crate::error::RpcError;

/// Read and decode several keys in one request
pub async fn decode_batch<T: Decode>(
    api: &dyn ChainApi,
    storage_keys: Vec<Vec<u8>>,
) -> Result<Vec<Option<T>>, RpcError> {
    api.storage_batch(&storage_keys)
        .await?
        .into_iter()
        .map(|value| -> Result<Option<T>, RpcError> {
            match value {
                Some(bytes) => Ok(Some(scale::decode_prefix(&bytes)?)),
                None => Ok(None),
            }
        })
        .collect()
}

async fn decode_one<T: Decode>(api: &dyn ChainApi, key: Vec<u8>) -> Result<Option<T>, RpcError> {
    Ok(decode_batch(api, vec![key]).await?.pop().flatten())
}

/// `System.Account` for every account, in order; `None` for unknown accounts
pub async fn accounts(
    api: &dyn ChainApi,
    accounts: &[AccountId],
) -> Result<Vec<Option<AccountInfo>>, RpcError> {
    decode_batch(api, accounts.iter().map(keys::system_account).collect()).await
}

pub async fn account(api: &dyn ChainApi, account: &AccountId) -> Result<Option<AccountInfo>, RpcError> {
    decode_one(api, keys::system_account(account)).await
}

/// `Assets.Account` for every (asset, account) pair, asset-major order
pub async fn asset_accounts(
    api: &dyn ChainApi,
    asset_ids: &[u32],
    accounts: &[AccountId],
) -> Result<Vec<Option<AssetAccount>>, RpcError> {
    let storage_keys = asset_ids
        .iter()
        .flat_map(|id| accounts.iter().map(move |a| keys::assets_account(*id, a)))
        .collect();
    decode_batch(api, storage_keys).await
}

pub async fn asset_details(api: &dyn ChainApi, asset_id: u32) -> Result<Option<AssetDetails>, RpcError> {
    decode_one(api, keys::assets_asset(asset_id)).await
}

pub async fn asset_metadata(api: &dyn ChainApi, asset_id: u32) -> Result<Option<AssetMetadata>, RpcError> {
    decode_one(api, keys::assets_metadata(asset_id)).await
}

/// `Tokens.Accounts` for every (currency, account) pair, currency-major order
pub async fn orml_accounts(
    api: &dyn ChainApi,
    currency_ids: &[Vec<u8>],
    accounts: &[AccountId],
) -> Result<Vec<Option<OrmlAccountData>>, RpcError> {
    let storage_keys = currency_ids
        .iter()
        .flat_map(|currency| accounts.iter().map(move |a| keys::tokens_accounts(a, currency)))
        .collect();
    decode_batch(api, storage_keys).await
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory `ChainApi` for unit tests

    use super::*;
    use async_trait::async_trait;
    use codec::Encode;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::RwLock;

    #[derive(Default)]
    pub struct MockApi {
        pub genesis: String,
        pub storage: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
        pub calls: RwLock<HashMap<String, Vec<u8>>>,
        pub batches: AtomicUsize,
        pub fail: bool,
    }

    impl MockApi {
        pub fn new(genesis: &str) -> Self {
            Self {
                genesis: genesis.to_string(),
                ..Default::default()
            }
        }

        pub fn put<T: Encode>(&self, key: Vec<u8>, value: &T) {
            self.storage.write().unwrap().insert(key, value.encode());
        }

        pub fn put_call<T: Encode>(&self, method: &str, value: &T) {
            self.calls.write().unwrap().insert(method.to_string(), value.encode());
        }

        pub fn batch_count(&self) -> usize {
            self.batches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChainApi for MockApi {
        async fn genesis_hash(&self) -> Result<String, RpcError> {
            if self.fail {
                return Err(RpcError::InvalidResponse("node down".into()));
            }
            Ok(self.genesis.clone())
        }

        async fn storage_batch(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>, RpcError> {
            if self.fail {
                return Err(RpcError::InvalidResponse("node down".into()));
            }
            self.batches.fetch_add(1, Ordering::SeqCst);
            let storage = self.storage.read().unwrap();
            Ok(keys.iter().map(|k| storage.get(k).cloned()).collect())
        }

        async fn call(&self, method: &str, _data: &[u8]) -> Result<Vec<u8>, RpcError> {
            self.calls
                .read()
                .unwrap()
                .get(method)
                .cloned()
                .ok_or_else(|| RpcError::Node {
                    code: -32000,
                    message: format!("unknown runtime api {}", method),
                })
        }
    }
}
