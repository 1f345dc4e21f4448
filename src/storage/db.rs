//! Database persistence layer using Sled
//!
//! Keeps every value in a single tree and flushes after each write so a
//! snapshot survives a crash right after it is saved.

use std::path::Path;

use sled::{Db, Tree};

use crate::storage::{KeyValueStore, StorageError};

const LEDGER_TREE: &str = "ledger";

/// Sled-backed key-value store
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let tree = db.open_tree(LEDGER_TREE)?;
        Ok(Self { db, tree })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.tree.get(key)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StorageError::InvalidUtf8 { key: key.to_string() }),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.tree.insert(key, value.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.tree.remove(key)?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.set("chain", "[1,2,3]").unwrap();
            store.set("gone", "x").unwrap();
            store.remove("gone").unwrap();
        }

        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.get("chain").unwrap().as_deref(), Some("[1,2,3]"));
        assert_eq!(store.get("gone").unwrap(), None);
    }
}
