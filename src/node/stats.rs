//! Derived ledger statistics
//!
//! Nothing here is authoritative. Apart from the measured hash rate, every
//! figure is recomputed from the chain, the mempool and the wallet registry.

use serde::{Deserialize, Serialize};

use crate::consensus::Block;
use crate::mining::{ConsensusMode, MiningMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    pub block_count: u64,
    pub pending_transactions: u64,
    pub current_difficulty: u32,
    pub mining_mode: MiningMode,
    pub consensus_mode: ConsensusMode,
    /// Transactions included in blocks, genesis reward included
    pub total_transactions: u64,
    /// Mean interval between consecutive blocks (milliseconds)
    pub average_block_time: f64,
    /// Expected hashes per second: 16^difficulty per average block time
    pub hash_rate: f64,
    /// Hashes per second measured while mining the most recent block
    #[serde(default)]
    pub last_hash_rate: f64,
    pub active_wallets: u64,
    /// Timestamp of the chain head
    pub last_mined_block: u64,
}

/// Inputs that are not part of the chain itself
#[derive(Debug, Clone, Copy)]
pub struct StatsContext {
    pub pending_transactions: usize,
    pub difficulty: u32,
    pub mining_mode: MiningMode,
    pub consensus_mode: ConsensusMode,
    pub active_wallets: usize,
    pub last_hash_rate: f64,
}

impl LedgerStats {
    pub fn derive(chain: &[Block], ctx: StatsContext) -> Self {
        let total_transactions = chain.iter().map(|b| b.transactions.len() as u64).sum();

        let average_block_time = if chain.len() > 1 {
            let total: u64 = chain
                .windows(2)
                .map(|pair| pair[1].timestamp().saturating_sub(pair[0].timestamp()))
                .sum();
            total as f64 / (chain.len() - 1) as f64
        } else {
            0.0
        };

        let hash_rate = if average_block_time > 0.0 {
            16f64.powi(ctx.difficulty as i32) / average_block_time * 1000.0
        } else {
            0.0
        };

        Self {
            block_count: chain.len() as u64,
            pending_transactions: ctx.pending_transactions as u64,
            current_difficulty: ctx.difficulty,
            mining_mode: ctx.mining_mode,
            consensus_mode: ctx.consensus_mode,
            total_transactions,
            average_block_time,
            hash_rate,
            last_hash_rate: ctx.last_hash_rate,
            active_wallets: ctx.active_wallets as u64,
            last_mined_block: chain.last().map_or(0, Block::timestamp),
        }
    }
}
