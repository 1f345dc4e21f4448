//! Block miner implementation
//!
//! Searches for a nonce whose block hash carries the required leading zero
//! hex digits. Normal mode searches in bounded time slices and yields to
//! the tokio scheduler between slices, so queries and admissions keep
//! running while a block is being mined.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::consensus::Block;
use crate::constants::{
    HASH_REPORT_INTERVAL, MINING_SLICE_MS, TEST_MODE_DIFFICULTY, TEST_MODE_MAX_ITERATIONS,
};
use crate::mining::MiningMode;

/// Counters from one mining run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MiningReport {
    /// Hashes computed after the initial candidate hash
    pub attempts: u64,
    pub elapsed: Duration,
    /// Whether the final hash satisfies the difficulty it was mined at
    pub target_met: bool,
}

impl MiningReport {
    /// Hashes per second
    pub fn hash_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            0.0
        }
    }
}

/// Mining result
#[derive(Debug)]
pub enum MiningResult {
    /// Mined a block (in test mode the target may have been missed)
    Success { block: Block, report: MiningReport },
    /// Mining was interrupted
    Interrupted,
}

/// Block miner
#[derive(Clone)]
pub struct Miner {
    /// Stop signal
    stop_signal: Arc<AtomicBool>,
    slice: Duration,
    test_iterations: u64,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(Duration::from_millis(MINING_SLICE_MS), TEST_MODE_MAX_ITERATIONS)
    }
}

impl Miner {
    /// Create a new miner
    pub fn new(slice: Duration, test_iterations: u64) -> Self {
        Self {
            stop_signal: Arc::new(AtomicBool::new(false)),
            slice,
            test_iterations,
        }
    }

    /// Stop mining
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }

    /// Mine a candidate block under `mode`
    pub async fn mine(&self, block: Block, mode: MiningMode) -> MiningResult {
        match mode {
            MiningMode::Instant => self.mine_instant(block),
            MiningMode::Test => self.mine_bounded(block),
            MiningMode::Normal => self.mine_sliced(block).await,
        }
    }

    /// Stamp the required zeros onto the header hash without searching
    pub fn mine_instant(&self, mut block: Block) -> MiningResult {
        if self.is_stopped() {
            return MiningResult::Interrupted;
        }
        block.header.nonce = 1;
        block.hash = block.calculate_hash().with_leading_zeros(block.header.difficulty);
        info!("Block {} instantly mined: {}", block.id, block.hash);

        MiningResult::Success {
            block,
            report: MiningReport {
                attempts: 0,
                elapsed: Duration::ZERO,
                target_met: true,
            },
        }
    }

    /// Bounded search for test environments
    ///
    /// Difficulty is capped and the iteration count limited; hitting the
    /// limit still emits the block with the last computed hash.
    pub fn mine_bounded(&self, mut block: Block) -> MiningResult {
        let started = Instant::now();
        block.header.difficulty = block.header.difficulty.min(TEST_MODE_DIFFICULTY);
        block.hash = block.calculate_hash();

        let difficulty = block.header.difficulty;
        let mut iterations = 0u64;

        while !block.hash.meets_difficulty(difficulty) && iterations < self.test_iterations {
            if self.is_stopped() {
                return MiningResult::Interrupted;
            }
            block.header.nonce = block.header.nonce.wrapping_add(1);
            block.hash = block.calculate_hash();
            iterations += 1;
        }

        let target_met = block.hash.meets_difficulty(difficulty);
        if target_met {
            info!("Block {} test mined with {} iterations: {}", block.id, iterations, block.hash);
        } else {
            info!("Block {} test mining reached max iterations", block.id);
        }

        MiningResult::Success {
            block,
            report: MiningReport {
                attempts: iterations,
                elapsed: started.elapsed(),
                target_met,
            },
        }
    }

    /// Full proof-of-work search, one time slice per scheduling turn
    pub async fn mine_sliced(&self, mut block: Block) -> MiningResult {
        let started = Instant::now();
        let mut attempts = 0u64;
        info!("Mining block {} with difficulty {}...", block.id, block.header.difficulty);

        loop {
            if self.is_stopped() {
                debug!("Mining of block {} interrupted after {} attempts", block.id, attempts);
                return MiningResult::Interrupted;
            }

            if self.search_slice(&mut block, &mut attempts, started) {
                let report = MiningReport {
                    attempts,
                    elapsed: started.elapsed(),
                    target_met: true,
                };
                info!(
                    "Block {} mined in {}ms: {} ({:.2} H/s)",
                    block.id,
                    report.elapsed.as_millis(),
                    block.hash,
                    report.hash_rate()
                );
                return MiningResult::Success { block, report };
            }

            tokio::task::yield_now().await;
        }
    }

    /// Run the nonce search for at most one slice
    ///
    /// Returns true once the block hash meets its difficulty.
    fn search_slice(&self, block: &mut Block, attempts: &mut u64, started: Instant) -> bool {
        let slice_start = Instant::now();
        let difficulty = block.header.difficulty;

        while slice_start.elapsed() < self.slice {
            if block.hash.meets_difficulty(difficulty) {
                return true;
            }
            if self.is_stopped() {
                return false;
            }

            block.header.nonce = block.header.nonce.wrapping_add(1);
            block.hash = block.calculate_hash();
            *attempts += 1;

            if *attempts % HASH_REPORT_INTERVAL == 0 {
                let secs = started.elapsed().as_secs_f64();
                if secs > 0.0 {
                    debug!("Mining in progress... Hash rate: {:.2} H/s", *attempts as f64 / secs);
                }
            }
        }

        block.hash.meets_difficulty(difficulty)
    }
}
