//! The ledger engine
//!
//! [`Ledger`] owns the chain, the mempool, the wallet registry and the mining
//! state behind one lock. It is a cheap cloneable handle; every clone drives
//! the same engine. Mining is the only long-running operation: the lock is
//! released while a candidate block is being searched, so admissions and
//! queries keep running, and at most one mining attempt is in flight.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::LedgerConfig;
use crate::consensus::{next_difficulty_for_mode, validate_chain, validate_genesis, Block, ValidationError};
use crate::constants::INITIAL_DIFFICULTY;
use crate::crypto::Hash;
use crate::mempool::{Mempool, MempoolError};
use crate::mining::{ConsensusMode, Miner, MiningMode, MiningReport, MiningResult};
use crate::node::{create_genesis_block, Clock, LedgerStats, StatsContext, SystemClock};
use crate::storage::{ChainStore, KeyValueStore, MemoryStore};
use crate::validation::{Transaction, TransactionFields, TxKind, TxStatus};
use crate::wallet::{self, Wallet, WalletError, WalletRegistry};

const TEST_DATA_TITLES: [&str; 10] = [
    "Budget Allocation",
    "Fund Transfer",
    "Expense Approval",
    "Revenue Report",
    "Budget Amendment",
    "Emergency Fund",
    "Project Funding",
    "Department Budget",
    "Capital Expense",
    "Annual Budget",
];

/// Ledger operation errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid transaction signature: {0}")]
    InvalidSignature(Hash),
    #[error("Coinbase transactions cannot be submitted")]
    CoinbaseRejected,
    #[error("Nonce {got} already used by {address} (next is {expected})")]
    StaleNonce { address: String, got: u64, expected: u64 },
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Import rejections; the ledger is left untouched in every case
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    Parse(serde_json::Error),
    #[error("Invalid blockchain data: chain is missing or not an array")]
    MissingChain,
    #[error("Invalid blockchain data: {0}")]
    InvalidPayload(serde_json::Error),
    #[error("Imported chain is invalid: {0}")]
    InvalidChain(#[from] ValidationError),
}

/// Export document, also accepted by [`Ledger::import_blockchain`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub chain: Vec<Block>,
    #[serde(default)]
    pub pending_transactions: Vec<Transaction>,
    #[serde(default)]
    pub difficulty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<LedgerStats>,
    #[serde(default)]
    pub mining_mode: MiningMode,
    #[serde(default)]
    pub consensus_mode: ConsensusMode,
}

struct LedgerState {
    chain: Vec<Block>,
    mempool: Mempool,
    wallets: WalletRegistry,
    difficulty: u32,
    mining_mode: MiningMode,
    consensus_mode: ConsensusMode,
    /// Bumped whenever the chain is replaced wholesale (reset, import)
    epoch: u64,
    active: Option<ActiveAttempt>,
    /// Measured hash rate of the most recently mined block
    last_hash_rate: f64,
}

/// The mining attempt that currently owns the candidate transactions
struct ActiveAttempt {
    miner: Miner,
    in_flight: Vec<Transaction>,
}

impl LedgerState {
    /// Stop the active attempt and make its transactions eligible again
    fn release_active(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.miner.stop();
                if !active.in_flight.is_empty() {
                    debug!("Returning {} transactions to the mempool", active.in_flight.len());
                    self.mempool.restore(active.in_flight);
                }
                true
            }
            None => false,
        }
    }
}

impl LedgerState {
    fn stats(&self) -> LedgerStats {
        LedgerStats::derive(
            &self.chain,
            StatsContext {
                pending_transactions: self.mempool.pending_len(),
                difficulty: self.difficulty,
                mining_mode: self.mining_mode,
                consensus_mode: self.consensus_mode,
                active_wallets: self.wallets.len(),
                last_hash_rate: self.last_hash_rate,
            },
        )
    }

    fn next_nonce(&self, address: &str) -> u64 {
        let confirmed = self.chain.iter().flat_map(|b| b.transactions.iter());
        wallet::next_nonce(address, confirmed.chain(self.mempool.transactions()))
    }
}

struct Inner {
    state: Mutex<LedgerState>,
    /// Set while a mining attempt owns the candidate transactions
    mining: AtomicBool,
    /// Bumped by every cancellation; an attempt only clears `mining` if
    /// no cancellation happened since it started
    generation: AtomicU64,
    store: ChainStore,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

/// Ledger engine handle
#[derive(Clone)]
pub struct Ledger {
    inner: Arc<Inner>,
}

/// Ownership of one mining attempt
///
/// Dropping it, on any exit path including unwinding, returns transactions
/// that were not absorbed into a block to the mempool and releases the
/// mining flag. A cancellation performs both itself, after which the drop
/// leaves the ledger alone.
struct MiningAttempt<'a> {
    inner: &'a Inner,
    generation: u64,
    epoch: u64,
}

impl MiningAttempt<'_> {
    fn is_current(&self, state: &LedgerState) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == self.generation && state.epoch == self.epoch
    }
}

impl Drop for MiningAttempt<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        if self.is_current(&state) {
            state.release_active();
            self.inner.mining.store(false, Ordering::SeqCst);
        }
    }
}

impl Ledger {
    /// Open the ledger over `store`, loading persisted state
    ///
    /// A missing or undecodable chain, or one whose genesis block fails
    /// validation, is replaced by a fresh genesis block.
    pub fn open(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        let store = ChainStore::with_keys(store, &config.chain_key, &config.wallets_key);

        let chain = match store.load_chain() {
            Some(chain) => match chain.first().map(validate_genesis) {
                Some(Ok(())) => {
                    info!("Loaded chain with {} blocks", chain.len());
                    Some(chain)
                }
                Some(Err(e)) => {
                    error!("Invalid genesis block detected ({}). Resetting blockchain.", e);
                    None
                }
                None => {
                    warn!("Stored chain is empty. Resetting blockchain.");
                    None
                }
            },
            None => None,
        };

        let chain = match chain {
            Some(chain) => chain,
            None => {
                let genesis = create_genesis_block(clock.now_millis(), INITIAL_DIFFICULTY);
                info!("Created genesis block: {}", genesis.hash);
                let chain = vec![genesis];
                store.save_chain(&chain);
                chain
            }
        };

        let wallets = WalletRegistry::from_wallets(store.load_wallets().unwrap_or_default());

        let state = LedgerState {
            chain,
            mempool: Mempool::new(),
            wallets,
            difficulty: INITIAL_DIFFICULTY,
            mining_mode: config.mining_mode,
            consensus_mode: config.consensus_mode,
            epoch: 0,
            active: None,
            last_hash_rate: 0.0,
        };

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                mining: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                store,
                clock,
                config,
            }),
        }
    }

    /// Ledger over a fresh in-memory store and the system clock
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::open(Arc::new(MemoryStore::new()), Arc::new(SystemClock), config)
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.inner.state.lock()
    }

    fn now(&self) -> u64 {
        self.inner.clock.now_millis()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.inner.config
    }

    // Transaction admission

    /// Admit a transaction built from caller fields
    ///
    /// Sender-attributed transactions get the sender's next nonce. Reaching
    /// the trigger threshold starts a background mining attempt.
    pub fn add_transaction(&self, fields: TransactionFields) -> Hash {
        let (id, trigger) = self.admit(fields);
        if trigger {
            self.trigger_mining();
        }
        id
    }

    fn admit(&self, fields: TransactionFields) -> (Hash, bool) {
        let now = self.now();
        let mut state = self.state();
        let nonce = fields.from_account.as_deref().map(|from| state.next_nonce(from));
        let id = state.mempool.admit_fields(fields, now, nonce);
        debug!("Transaction {} added to mempool", id);
        (id, self.should_mine(&state))
    }

    /// Admit a transaction signed by the caller
    pub fn add_signed_transaction(&self, mut tx: Transaction) -> Result<Hash, LedgerError> {
        if tx.is_coinbase() {
            return Err(LedgerError::CoinbaseRejected);
        }
        if !wallet::verify_transaction(&tx) {
            warn!("Rejected transaction with invalid signature: {}", tx.id);
            return Err(LedgerError::InvalidSignature(tx.id));
        }

        tx.id = tx.signing_hash();
        tx.status = TxStatus::Pending;
        tx.block_id = None;

        let now = self.now();
        let trigger = {
            let mut state = self.state();
            if let (Some(from), Some(got)) = (tx.from_account.as_deref(), tx.nonce) {
                let expected = state.next_nonce(from);
                if got < expected {
                    return Err(LedgerError::StaleNonce {
                        address: from.to_string(),
                        got,
                        expected,
                    });
                }
            }
            state.mempool.admit(tx.clone(), now)?;
            debug!("Signed transaction {} added to mempool", tx.id);
            self.should_mine(&state)
        };

        if trigger {
            self.trigger_mining();
        }
        Ok(tx.id)
    }

    /// Build and sign a transaction without admitting it
    ///
    /// The nonce is the sender's next nonce; a missing sender is filled in
    /// from the key. An unusable key yields a `failed` transaction.
    pub fn sign_transaction(&self, mut fields: TransactionFields, private_key_hex: &str) -> Transaction {
        if fields.from_account.is_none() {
            if let Ok(signer) = Wallet::from_private_key(private_key_hex) {
                fields.from_account = Some(signer.address);
            }
        }

        let now = self.now();
        let nonce = fields.from_account.as_deref().map(|from| self.next_nonce(from));
        let tx = Transaction::from_fields(fields, now, nonce, 0);
        wallet::sign_transaction(tx, private_key_hex)
    }

    /// Next unused nonce for `address` across the chain and the mempool
    pub fn next_nonce(&self, address: &str) -> u64 {
        self.state().next_nonce(address)
    }

    fn should_mine(&self, state: &LedgerState) -> bool {
        state.mempool.pending_len() >= self.inner.config.mining_trigger_threshold
            && !self.inner.mining.load(Ordering::SeqCst)
    }

    fn trigger_mining(&self) {
        if !self.inner.config.auto_mine {
            debug!("Mining threshold reached; auto mining disabled");
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let ledger = self.clone();
                handle.spawn(async move {
                    ledger.mine_new_block().await;
                });
            }
            Err(_) => debug!("Mining threshold reached outside a runtime; not mining"),
        }
    }

    // Mining

    /// Mine every pending transaction into a new block
    ///
    /// Returns `None` when nothing is pending, when another attempt is in
    /// flight, or when the attempt is cancelled or overtaken by a reset or
    /// import. Unmined transactions stay in the mempool.
    pub async fn mine_new_block(&self) -> Option<Block> {
        let (generation, epoch, transactions, head_hash, next_id, timestamp, difficulty, miner, mode) = {
            let mut state = self.state();
            if self.inner.mining.load(Ordering::SeqCst) {
                debug!("Mining already in progress");
                return None;
            }
            if state.mempool.pending_len() == 0 {
                return None;
            }
            let head = state.chain.last()?;
            let (head_hash, head_time) = (head.hash, head.timestamp());
            let (Some(next_id), Some(min_time)) = (head.id.checked_add(1), head_time.checked_add(1)) else {
                warn!("Block {} cannot be extended: id or timestamp at limit", head.id);
                return None;
            };
            let timestamp = self.now().max(min_time);

            let miner = Miner::new(
                self.inner.config.mining_slice(),
                self.inner.config.test_mode_max_iterations,
            );
            let transactions = state.mempool.take_pending();
            state.active = Some(ActiveAttempt {
                miner: miner.clone(),
                in_flight: transactions.clone(),
            });
            self.inner.mining.store(true, Ordering::SeqCst);

            (
                self.inner.generation.load(Ordering::SeqCst),
                state.epoch,
                transactions,
                head_hash,
                next_id,
                timestamp,
                state.difficulty,
                miner,
                state.mining_mode,
            )
        };

        // Taken right after the lock is released; the drop locks the state.
        let attempt = MiningAttempt {
            inner: self.inner.as_ref(),
            generation,
            epoch,
        };
        let candidate = Block::candidate(next_id, head_hash, timestamp, difficulty, transactions);

        debug!(
            "Mining block {} with {} transactions in {} mode",
            candidate.id,
            candidate.transactions.len(),
            mode
        );

        match miner.mine(candidate, mode).await {
            MiningResult::Success { block, report } => self.append_mined(&attempt, block, report, mode),
            MiningResult::Interrupted => {
                info!("Mining cancelled");
                None
            }
        }
    }

    fn append_mined(
        &self,
        attempt: &MiningAttempt<'_>,
        mut block: Block,
        report: MiningReport,
        mode: MiningMode,
    ) -> Option<Block> {
        let mut state = self.state();

        let current = attempt.is_current(&state);
        let (head_hash, head_time) = state.chain.last().map(|b| (b.hash, b.timestamp()))?;
        if !current || head_hash != *block.previous_hash() {
            warn!("Chain changed while mining; discarding block {}", block.id);
            return None;
        }

        for tx in block.transactions.iter_mut() {
            tx.status = TxStatus::Confirmed;
            tx.block_id = Some(block.id);
        }
        block.size = block.serialized_size();

        state.mempool.absorb(block.transactions.iter().map(|tx| &tx.id));
        state.active = None;
        state.last_hash_rate = report.hash_rate();

        let interval = block.timestamp().saturating_sub(head_time);
        let next = next_difficulty_for_mode(
            mode,
            state.difficulty,
            interval,
            self.inner.config.target_block_time_ms,
        );
        if next != state.difficulty {
            info!("Difficulty adjusted: {} -> {}", state.difficulty, next);
        }
        state.difficulty = next;

        state.chain.push(block.clone());
        self.inner.store.save_chain(&state.chain);

        info!(
            "Block {} added to chain with {} transactions ({} attempts, {:.2} H/s)",
            block.id,
            block.transactions.len(),
            report.attempts,
            report.hash_rate()
        );
        Some(block)
    }

    /// Stop the in-flight mining attempt, if any
    ///
    /// Its transactions are back in the mempool when this returns and the
    /// next attempt may start at once; the stopped search discards whatever
    /// it finds.
    pub fn cancel_mining(&self) {
        let mut state = self.state();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if state.release_active() {
            info!("Mining cancelled");
        }
        self.inner.mining.store(false, Ordering::SeqCst);
    }

    pub fn is_mining(&self) -> bool {
        self.inner.mining.load(Ordering::SeqCst)
    }

    // Queries

    /// Snapshot of the chain
    pub fn get_chain(&self) -> Vec<Block> {
        self.state().chain.clone()
    }

    pub fn get_block_by_id(&self, id: u64) -> Option<Block> {
        self.state().chain.iter().find(|b| b.id == id).cloned()
    }

    /// Confirmed and pending transactions, newest first
    pub fn get_all_transactions(&self) -> Vec<Transaction> {
        let state = self.state();
        let mut transactions: Vec<Transaction> = state
            .chain
            .iter()
            .flat_map(|b| b.transactions.iter())
            .chain(state.mempool.transactions())
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transactions
    }

    /// Pending candidates in inclusion order
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.state().mempool.pending()
    }

    /// Re-validate the whole chain under the current mining mode
    pub fn is_chain_valid(&self) -> bool {
        let state = self.state();
        match validate_chain(&state.chain, state.mining_mode) {
            Ok(()) => true,
            Err(e) => {
                warn!("Chain validation failed: {}", e);
                false
            }
        }
    }

    pub fn get_stats(&self) -> LedgerStats {
        self.state().stats()
    }

    pub fn difficulty(&self) -> u32 {
        self.state().difficulty
    }

    pub fn mining_mode(&self) -> MiningMode {
        self.state().mining_mode
    }

    pub fn consensus_mode(&self) -> ConsensusMode {
        self.state().consensus_mode
    }

    pub fn set_mining_mode(&self, mode: MiningMode) {
        self.state().mining_mode = mode;
        info!("Mining mode set to: {}", mode);
    }

    pub fn set_consensus_mode(&self, mode: ConsensusMode) {
        self.state().consensus_mode = mode;
        info!("Consensus mode set to: {}", mode);
    }

    // Wallets

    pub fn create_wallet(&self) -> Wallet {
        let mut state = self.state();
        let wallet = state.wallets.create();
        self.inner.store.save_wallets(state.wallets.all());
        info!("Created wallet {}", wallet.address);
        wallet
    }

    /// Register a wallet from an existing private key
    pub fn import_wallet(&self, private_key_hex: &str) -> Result<Wallet, LedgerError> {
        let wallet = Wallet::from_private_key(private_key_hex)?;
        let mut state = self.state();
        if state.wallets.insert(wallet.clone()) {
            self.inner.store.save_wallets(state.wallets.all());
            info!("Imported wallet {}", wallet.address);
        }
        Ok(wallet)
    }

    pub fn get_wallet(&self, address: &str) -> Option<Wallet> {
        self.state().wallets.get(address).cloned()
    }

    pub fn get_all_wallets(&self) -> Vec<Wallet> {
        self.state().wallets.all().to_vec()
    }

    // Bulk operations

    /// Generate `count` synthetic transactions and mine them in instant mode
    ///
    /// Mines whenever the trigger threshold is pending and once more at the
    /// end, then restores the previous mining mode. Returns the number of
    /// blocks mined.
    pub async fn add_test_data(&self, count: usize) -> usize {
        let original_mode = self.mining_mode();
        self.set_mining_mode(MiningMode::Instant);

        let threshold = self.inner.config.mining_trigger_threshold;
        let mut mined = 0;
        for index in 0..count {
            self.admit(test_transaction(index));
            let pending = self.state().mempool.pending_len();
            if pending >= threshold && self.mine_new_block().await.is_some() {
                mined += 1;
            }
        }
        let pending = self.state().mempool.pending_len();
        if pending > 0 && self.mine_new_block().await.is_some() {
            mined += 1;
        }

        self.set_mining_mode(original_mode);
        info!("Added {} test transactions in {} blocks", count, mined);
        mined
    }

    /// Serialize chain, pending transactions, difficulty, stats and modes
    pub fn export_blockchain(&self) -> Result<String, LedgerError> {
        let state = self.state();
        let snapshot = LedgerSnapshot {
            chain: state.chain.clone(),
            pending_transactions: state.mempool.pending(),
            difficulty: state.difficulty,
            stats: Some(state.stats()),
            mining_mode: state.mining_mode,
            consensus_mode: state.consensus_mode,
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Replace the ledger with an exported snapshot
    ///
    /// The snapshot's chain is validated under its own mining mode before
    /// anything is swapped in.
    pub fn import_blockchain(&self, data: &str) -> Result<(), ImportError> {
        let value: serde_json::Value = serde_json::from_str(data).map_err(ImportError::Parse)?;
        if !value.get("chain").is_some_and(serde_json::Value::is_array) {
            return Err(ImportError::MissingChain);
        }
        let snapshot: LedgerSnapshot = serde_json::from_value(value).map_err(ImportError::InvalidPayload)?;
        validate_chain(&snapshot.chain, snapshot.mining_mode)?;

        self.cancel_mining();
        let now = self.now();
        let mut state = self.state();
        state.epoch += 1;
        state.chain = snapshot.chain;
        state.mempool.replace(snapshot.pending_transactions, now);
        state.difficulty = if snapshot.difficulty == 0 {
            INITIAL_DIFFICULTY
        } else {
            snapshot.difficulty
        };
        state.mining_mode = snapshot.mining_mode;
        state.consensus_mode = snapshot.consensus_mode;
        self.inner.store.save_chain(&state.chain);

        info!(
            "Imported chain with {} blocks and {} pending transactions",
            state.chain.len(),
            state.mempool.pending_len()
        );
        Ok(())
    }

    /// Discard everything but the wallets and start from a fresh genesis
    pub fn reset_chain(&self) {
        self.cancel_mining();
        let now = self.now();
        let mut state = self.state();
        state.epoch += 1;
        state.chain = vec![create_genesis_block(now, INITIAL_DIFFICULTY)];
        state.mempool.clear();
        state.difficulty = INITIAL_DIFFICULTY;
        self.inner.store.save_chain(&state.chain);
        info!("Blockchain reset to genesis");
    }
}

fn test_transaction(index: usize) -> TransactionFields {
    let mut rng = rand::thread_rng();
    let kind = TxKind::USER_KINDS.choose(&mut rng).copied().unwrap_or(TxKind::Report);
    let title = TEST_DATA_TITLES.choose(&mut rng).copied().unwrap_or("Budget Allocation");
    let paise: u64 = rng.gen_range(0..100_000_000);

    TransactionFields::new(
        format!("{} {}", title, index + 1),
        format!("Test transaction for {}", kind),
        format_rupees(paise),
        kind,
    )
}

/// Render an amount in paise as rupees with Indian digit grouping
pub fn format_rupees(paise: u64) -> String {
    let rupees = (paise / 100).to_string();
    let fraction = paise % 100;

    let grouped = if rupees.len() > 3 {
        let (head, last3) = rupees.split_at(rupees.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 2 {
            groups.push(&head[end - 2..end]);
            end -= 2;
        }
        groups.push(&head[..end]);
        groups.reverse();
        format!("{},{}", groups.join(","), last3)
    } else {
        rupees
    };

    format!("₹{}.{:02}", grouped, fraction)
}
