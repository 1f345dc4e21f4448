//! Chain and wallet snapshots
//!
//! The chain and the wallet registry are stored as two JSON records under
//! fixed keys. Loading never fails: a missing, unreadable or undecodable
//! record is logged and reported as absent.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::consensus::Block;
use crate::constants::{CHAIN_STORAGE_KEY, WALLETS_STORAGE_KEY};
use crate::storage::{KeyValueStore, StorageError};
use crate::wallet::Wallet;

/// Persistence adapter over a [`KeyValueStore`]
#[derive(Clone)]
pub struct ChainStore {
    store: Arc<dyn KeyValueStore>,
    chain_key: String,
    wallets_key: String,
}

impl ChainStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_keys(store, CHAIN_STORAGE_KEY, WALLETS_STORAGE_KEY)
    }

    pub fn with_keys(store: Arc<dyn KeyValueStore>, chain_key: &str, wallets_key: &str) -> Self {
        Self {
            store,
            chain_key: chain_key.to_string(),
            wallets_key: wallets_key.to_string(),
        }
    }

    pub fn load_chain(&self) -> Option<Vec<Block>> {
        self.load(&self.chain_key)
    }

    pub fn save_chain(&self, chain: &[Block]) {
        self.save(&self.chain_key, chain);
    }

    pub fn load_wallets(&self) -> Option<Vec<Wallet>> {
        self.load(&self.wallets_key)
    }

    pub fn save_wallets(&self, wallets: &[Wallet]) {
        self.save(&self.wallets_key, wallets);
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_load(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to load {}: {}", key, e);
                None
            }
        }
    }

    fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.store.get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_save(key, value) {
            error!("Failed to save {}: {}", key, e);
        }
    }

    fn try_save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json)
    }
}
