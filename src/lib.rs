//! Budget Ledger core library
//!
//! An embedded, single-process proof-of-work ledger: transactions, a
//! fee-ordered mempool, wallets, time-sliced mining, and full-chain
//! validation. Host applications drive it through [`node::Ledger`].

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod mempool;
pub mod mining;
pub mod node;
pub mod rpc;
pub mod storage;
pub mod validation;
pub mod wallet;

/// Protocol constants
pub mod constants {
    /// Block protocol version
    pub const PROTOCOL_VERSION: u32 = 1;

    /// Difficulty (leading zero hex digits) at genesis and after a reset
    pub const INITIAL_DIFFICULTY: u32 = 2;

    /// Target block interval used by difficulty retargeting (milliseconds)
    pub const TARGET_BLOCK_TIME_MS: u64 = 10_000;

    /// Pending transactions needed before admission triggers mining
    pub const MINING_TRIGGER_THRESHOLD: usize = 3;

    /// Wall-clock budget of one search slice in normal mode (milliseconds)
    pub const MINING_SLICE_MS: u64 = 200;

    /// Search iteration cap in test mode
    pub const TEST_MODE_MAX_ITERATIONS: u64 = 1_000;

    /// Difficulty ceiling in test mode, and the pinned difficulty in
    /// test and instant modes
    pub const TEST_MODE_DIFFICULTY: u32 = 2;

    /// Attempts between hash-rate progress reports
    pub const HASH_REPORT_INTERVAL: u64 = 10_000;

    /// Gas charged for every transaction
    pub const BASE_GAS: u64 = 21_000;

    /// Gas charged per serialized byte of transaction data
    pub const GAS_PER_BYTE: u64 = 68;

    /// Gas price applied when the caller does not provide one
    pub const DEFAULT_GAS_PRICE: f64 = 0.01;

    /// Storage key of the block chain record
    pub const CHAIN_STORAGE_KEY: &str = "BUDGET_LEDGER_CHAIN";

    /// Storage key of the wallet registry record
    pub const WALLETS_STORAGE_KEY: &str = "BUDGET_LEDGER_WALLETS";

    /// Prefix of every wallet address
    pub const ADDRESS_PREFIX: &str = "BL";

    /// Recipient of the genesis coinbase
    pub const TREASURY_ACCOUNT: &str = "Treasury";

    /// Amount of the genesis coinbase
    pub const GENESIS_REWARD: &str = "₹50.00";
}
