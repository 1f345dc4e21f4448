//! Property-based and scenario tests for the budget ledger
//!
//! These tests verify chain invariants under random inputs and exercise the
//! engine end to end through its public operation set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use budget_ledger::config::LedgerConfig;
use budget_ledger::consensus::{
    calculate_merkle_root, calculate_next_difficulty, validate_chain, Block, ValidationError,
};
use budget_ledger::crypto::Hash;
use budget_ledger::mining::MiningMode;
use budget_ledger::node::{Ledger, ManualClock};
use budget_ledger::storage::{MemoryStore, SledStore};
use budget_ledger::validation::{Transaction, TransactionFields, TxKind, TxStatus};
use proptest::prelude::*;

fn quiet_config() -> LedgerConfig {
    LedgerConfig {
        auto_mine: false,
        ..LedgerConfig::default()
    }
}

fn manual_ledger(config: LedgerConfig) -> (Ledger, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let ledger = Ledger::open(Arc::new(MemoryStore::new()), clock.clone(), config);
    (ledger, clock)
}

fn fields(title: &str) -> TransactionFields {
    TransactionFields::new(title, "scenario", "₹100.00", TxKind::Expense)
}

fn transactions(specs: &[(u64, String)]) -> Vec<Transaction> {
    specs
        .iter()
        .enumerate()
        .map(|(seq, (timestamp, title))| {
            let fields = TransactionFields::new(title.clone(), "prop", "₹1.00", TxKind::Transfer);
            Transaction::from_fields(fields, *timestamp, None, seq as u64)
        })
        .collect()
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

proptest! {
    /// Merkle root does not depend on transaction order
    #[test]
    fn prop_merkle_root_order_independent(
        specs in prop::collection::vec((0u64..1_000_000u64, "[a-z]{1,8}"), 1..10),
        rotate in 0usize..10,
        reverse in any::<bool>()
    ) {
        let txs = transactions(&specs);
        let mut permuted = txs.clone();
        let len = permuted.len();
        permuted.rotate_left(rotate % len);
        if reverse {
            permuted.reverse();
        }

        prop_assert_eq!(calculate_merkle_root(&txs), calculate_merkle_root(&permuted));
    }

    /// Recomputing a block's hash from its stored fields gives the stored hash
    #[test]
    fn prop_block_hash_round_trip(
        id in 1u64..1_000u64,
        timestamp in 0u64..u64::MAX / 2,
        difficulty in 1u32..6u32,
        specs in prop::collection::vec((0u64..1_000_000u64, "[a-z]{1,8}"), 0..5)
    ) {
        let block = Block::candidate(id, Hash::zero(), timestamp, difficulty, transactions(&specs));
        prop_assert_eq!(block.calculate_hash(), block.hash);

        let json = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(decoded.calculate_hash(), block.hash);
        prop_assert_eq!(decoded, block);
    }

    /// Changing the nonce changes the hash
    #[test]
    fn prop_different_nonce_different_hash(
        nonce1 in 0u64..u64::MAX,
        nonce2 in 0u64..u64::MAX
    ) {
        prop_assume!(nonce1 != nonce2);

        let mut a = Block::candidate(1, Hash::zero(), 1_000, 2, Vec::new());
        let mut b = a.clone();
        a.header.nonce = nonce1;
        b.header.nonce = nonce2;

        prop_assert_ne!(a.calculate_hash(), b.calculate_hash());
    }

    /// Difficulty never drops below one and moves by at most one step
    #[test]
    fn prop_difficulty_bounded_step(
        current in 1u32..64u32,
        interval in 0u64..100_000u64
    ) {
        let next = calculate_next_difficulty(current, interval, 10_000);
        prop_assert!(next >= 1);
        prop_assert!(next.abs_diff(current) <= 1);
    }

    /// After N admissions from a sender, the next nonce is N and no nonce repeats
    #[test]
    fn prop_nonce_monotonic(count in 0usize..12) {
        let (ledger, _) = manual_ledger(quiet_config());
        let sender = ledger.create_wallet().address;

        for i in 0..count {
            ledger.add_transaction(fields(&format!("tx{i}")).from_account(sender.clone()));
        }
        prop_assert_eq!(ledger.next_nonce(&sender), count as u64);

        let mut nonces: Vec<u64> = ledger
            .get_all_transactions()
            .iter()
            .filter(|tx| tx.from_account.as_deref() == Some(sender.as_str()))
            .filter_map(|tx| tx.nonce)
            .collect();
        nonces.sort_unstable();
        prop_assert_eq!(nonces, (0..count as u64).collect::<Vec<_>>());
    }
}

// ============================================================================
// SCENARIO TESTS
// ============================================================================

/// Equal gas prices are mined in admission order
#[tokio::test]
async fn test_fifo_tie_break_and_merkle_root() {
    let (ledger, _) = manual_ledger(quiet_config());
    let a = ledger.add_transaction(fields("A"));
    let b = ledger.add_transaction(fields("B"));
    let c = ledger.add_transaction(fields("C"));

    let pending = ledger.pending_transactions();
    let expected_root = calculate_merkle_root(&pending);

    let block = ledger.mine_new_block().await.unwrap();
    let order: Vec<Hash> = block.transactions.iter().map(|tx| tx.id).collect();
    assert_eq!(order, vec![a, b, c]);
    assert_eq!(block.header.merkle_root, expected_root);
}

/// Higher gas price jumps the queue
#[tokio::test]
async fn test_fee_priority() {
    let (ledger, _) = manual_ledger(quiet_config());
    ledger.add_transaction(fields("cheap"));
    ledger.add_transaction(fields("urgent").gas_price(1.5));

    let block = ledger.mine_new_block().await.unwrap();
    assert_eq!(block.transactions[0].title, "urgent");
    assert_eq!(block.transactions[1].title, "cheap");
}

/// Instant mode returns at once with the required leading zeros
#[tokio::test]
async fn test_instant_mining() {
    let (ledger, _) = manual_ledger(quiet_config());
    ledger.set_mining_mode(MiningMode::Instant);
    ledger.add_transaction(fields("only"));

    let started = Instant::now();
    let block = ledger.mine_new_block().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    assert!(block.hash.meets_difficulty(block.header.difficulty));
    assert_eq!(block.transactions[0].status, TxStatus::Confirmed);
    assert!(ledger.is_chain_valid());
}

/// Normal mode finds a real proof of work and retargets after a fast block
#[tokio::test]
async fn test_normal_mining_and_retarget() {
    let (ledger, _) = manual_ledger(LedgerConfig {
        mining_mode: MiningMode::Normal,
        mining_slice_ms: 20,
        ..quiet_config()
    });
    ledger.add_transaction(fields("pow"));

    let block = ledger.mine_new_block().await.unwrap();
    assert_eq!(block.hash, block.calculate_hash());
    assert!(block.hash.meets_difficulty(2));
    assert_eq!(ledger.difficulty(), 3);
    assert!(ledger.is_chain_valid());
}

/// Flipping a confirmed amount breaks the Merkle commitment
#[tokio::test]
async fn test_corrupted_amount_detected() {
    let (ledger, _) = manual_ledger(quiet_config());
    for round in 0..2 {
        ledger.add_transaction(fields(&format!("round {round}")));
        ledger.mine_new_block().await.unwrap();
    }
    assert_eq!(ledger.get_chain().len(), 3);
    assert!(ledger.is_chain_valid());

    let mut chain = ledger.get_chain();
    chain[1].transactions[0].amount = "₹1,00,00,000.00".into();
    assert_eq!(
        validate_chain(&chain, ledger.mining_mode()),
        Err(ValidationError::InvalidMerkleRoot(1))
    );

    // Corrupted exports are refused and the live chain is untouched.
    let mut snapshot: serde_json::Value =
        serde_json::from_str(&ledger.export_blockchain().unwrap()).unwrap();
    snapshot["chain"][1]["transactions"][0]["amount"] = serde_json::json!("₹0.00");
    assert!(ledger.import_blockchain(&snapshot.to_string()).is_err());
    assert!(ledger.is_chain_valid());
}

/// Block ids are contiguous and previous hashes link up
#[tokio::test]
async fn test_chain_links() {
    let (ledger, _) = manual_ledger(quiet_config());
    ledger.add_test_data(9).await;

    let chain = ledger.get_chain();
    for (index, block) in chain.iter().enumerate() {
        assert_eq!(block.id, index as u64);
    }
    for pair in chain.windows(2) {
        assert_eq!(*pair[1].previous_hash(), pair[0].hash);
    }
}

/// Demo data mines everything it generates
#[tokio::test]
async fn test_add_test_data_ten() {
    let (ledger, _) = manual_ledger(quiet_config());
    ledger.add_test_data(10).await;

    let stats = ledger.get_stats();
    assert!(stats.block_count >= 1 + 4);
    assert_eq!(stats.pending_transactions, 0);
    assert_eq!(stats.total_transactions, 11);
}

/// Validation is read-only and repeatable
#[tokio::test]
async fn test_validation_idempotent() {
    let (ledger, _) = manual_ledger(quiet_config());
    ledger.add_test_data(5).await;

    let before = ledger.get_chain();
    let first = ledger.is_chain_valid();
    let second = ledger.is_chain_valid();
    assert_eq!(first, second);
    assert_eq!(ledger.get_chain(), before);
}

/// Chain and wallets survive a restart on sled
#[tokio::test]
async fn test_sled_persistence_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));

    let (chain, wallet) = {
        let store = Arc::new(SledStore::open(dir.path()).unwrap());
        let ledger = Ledger::open(store, clock.clone(), quiet_config());
        let wallet = ledger.create_wallet();
        ledger.add_test_data(4).await;
        (ledger.get_chain(), wallet)
    };

    let store = Arc::new(SledStore::open(dir.path()).unwrap());
    let reopened = Ledger::open(store, clock, quiet_config());
    assert_eq!(reopened.get_chain(), chain);
    assert_eq!(reopened.get_wallet(&wallet.address), Some(wallet));
    assert!(reopened.is_chain_valid());
}
