//! Genesis block synthesis
//!
//! The genesis block carries a single coinbase crediting the treasury and
//! references the all-zero previous hash. It is not mined.

use crate::consensus::Block;
use crate::constants::{GENESIS_REWARD, TREASURY_ACCOUNT};
use crate::crypto::Hash;
use crate::validation::Transaction;

pub const GENESIS_TITLE: &str = "Genesis Block Reward";
pub const GENESIS_DESCRIPTION: &str = "First block on chain with no previous block";

/// Create the genesis block at `timestamp`
pub fn create_genesis_block(timestamp: u64, difficulty: u32) -> Block {
    let reward = Transaction::coinbase(
        GENESIS_TITLE,
        GENESIS_DESCRIPTION,
        GENESIS_REWARD,
        TREASURY_ACCOUNT,
        timestamp,
        0,
    );
    Block::candidate(0, Hash::zero(), timestamp, difficulty, vec![reward])
}
