//! Block structure for the ledger
//!
//! A block is a header (the hashed part), its id and stored hash, and the
//! transactions summarised by the header's Merkle root.

use serde::{Deserialize, Serialize};

use crate::constants::PROTOCOL_VERSION;
use crate::crypto::{compute_merkle_root, hash_bytes, Hash};
use crate::validation::Transaction;

/// Block header: every field that feeds the block hash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Protocol version
    pub version: u32,
    /// Hash of the previous block
    pub previous_hash: Hash,
    /// Merkle root of all transactions
    pub merkle_root: Hash,
    /// Block timestamp (milliseconds since Unix epoch)
    pub timestamp: u64,
    /// Required leading zero hex digits at the time of mining
    pub difficulty: u32,
    /// Nonce used for PoW
    pub nonce: u64,
}

impl BlockHeader {
    /// Serialize the header for hashing
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + 32 + 32 + 8 + 4 + 8);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.previous_hash.0);
        bytes.extend_from_slice(&self.merkle_root.0);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.difficulty.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Calculate the hash of this header
    pub fn hash(&self) -> Hash {
        hash_bytes(&self.to_bytes())
    }
}

/// A complete block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Position in the chain, genesis is 0
    pub id: u64,
    #[serde(flatten)]
    pub header: BlockHeader,
    /// Stored block hash
    pub hash: Hash,
    /// Serialized size in bytes
    #[serde(default)]
    pub size: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble an unmined block on top of `previous_hash`
    ///
    /// The Merkle root is fixed here; mining only varies the nonce.
    pub fn candidate(
        id: u64,
        previous_hash: Hash,
        timestamp: u64,
        difficulty: u32,
        transactions: Vec<Transaction>,
    ) -> Self {
        let header = BlockHeader {
            version: PROTOCOL_VERSION,
            previous_hash,
            merkle_root: calculate_merkle_root(&transactions),
            timestamp,
            difficulty,
            nonce: 0,
        };
        let mut block = Self {
            id,
            hash: header.hash(),
            header,
            size: 0,
            transactions,
        };
        block.size = block.serialized_size();
        block
    }

    /// Recompute the hash from the header fields
    pub fn calculate_hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn previous_hash(&self) -> &Hash {
        &self.header.previous_hash
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.id == 0 && self.header.previous_hash.is_zero()
    }

    /// JSON size of the block with `size` itself zeroed
    pub fn serialized_size(&self) -> u64 {
        let mut probe = self.clone();
        probe.size = 0;
        serde_json::to_vec(&probe)
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(0)
    }
}

/// Merkle root of a transaction set, independent of input order
///
/// Leaves are the canonical transaction hashes sorted by transaction id.
pub fn calculate_merkle_root(transactions: &[Transaction]) -> Hash {
    let mut leaves: Vec<(Hash, Hash)> = transactions
        .iter()
        .map(|tx| (tx.id, tx.leaf_hash()))
        .collect();
    leaves.sort_by(|a, b| a.0.cmp(&b.0));

    let hashes: Vec<Hash> = leaves.into_iter().map(|(_, leaf)| leaf).collect();
    compute_merkle_root(&hashes)
}
