//! Fee-ordered transaction pool
//!
//! Admitted transactions live in `entries` until a mined block absorbs
//! them. The candidate list holds the ids eligible for the next block,
//! ordered by gas price (highest first), then timestamp, then admission
//! order.

use std::cmp::Ordering;
use std::collections::HashMap;

use thiserror::Error;

use crate::crypto::Hash;
use crate::validation::{Transaction, TransactionFields};

/// Mempool errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MempoolError {
    #[error("Transaction already in mempool: {0}")]
    Duplicate(Hash),
}

/// A transaction waiting for inclusion
#[derive(Debug, Clone, PartialEq)]
pub struct MempoolEntry {
    pub transaction: Transaction,
    /// Admission time (milliseconds since Unix epoch)
    pub added_at: u64,
    pub priority: f64,
    /// Admission order, the final tie-break
    pub sequence: u64,
}

#[derive(Debug, Default)]
pub struct Mempool {
    entries: HashMap<Hash, MempoolEntry>,
    candidates: Vec<Hash>,
    next_sequence: u64,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and admit a pending transaction from caller fields
    pub fn admit_fields(
        &mut self,
        fields: TransactionFields,
        timestamp: u64,
        nonce: Option<u64>,
    ) -> Hash {
        let tx = Transaction::from_fields(fields, timestamp, nonce, self.next_sequence);
        let id = tx.id;
        self.insert(tx, timestamp);
        id
    }

    /// Admit an already-built (typically signed) transaction
    pub fn admit(&mut self, tx: Transaction, added_at: u64) -> Result<Hash, MempoolError> {
        if self.entries.contains_key(&tx.id) {
            return Err(MempoolError::Duplicate(tx.id));
        }
        let id = tx.id;
        self.insert(tx, added_at);
        Ok(id)
    }

    fn insert(&mut self, tx: Transaction, added_at: u64) {
        let id = tx.id;
        let entry = MempoolEntry {
            priority: tx.priority(),
            transaction: tx,
            added_at,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.entries.insert(id, entry);
        self.candidates.push(id);
        self.sort_candidates();
    }

    fn sort_candidates(&mut self) {
        let entries = &self.entries;
        self.candidates.sort_by(|a, b| match (entries.get(a), entries.get(b)) {
            (Some(a), Some(b)) => compare_entries(a, b),
            _ => Ordering::Equal,
        });
    }

    /// Number of transactions eligible for the next block
    pub fn pending_len(&self) -> usize {
        self.candidates.len()
    }

    /// Number of admitted transactions not yet absorbed (includes any
    /// currently being mined)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &Hash) -> Option<&MempoolEntry> {
        self.entries.get(id)
    }

    /// Candidate transactions in inclusion order
    pub fn pending(&self) -> Vec<Transaction> {
        self.candidates
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.transaction.clone())
            .collect()
    }

    /// Every admitted transaction, in no particular order
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.values().map(|entry| &entry.transaction)
    }

    /// Move all candidates out for mining
    ///
    /// The entries stay in the pool until [`Mempool::absorb`] or
    /// [`Mempool::restore`] is called for them.
    pub fn take_pending(&mut self) -> Vec<Transaction> {
        let ids = std::mem::take(&mut self.candidates);
        ids.iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.transaction.clone())
            .collect()
    }

    /// Drop entries that a mined block has included
    pub fn absorb<'a>(&mut self, ids: impl IntoIterator<Item = &'a Hash>) {
        for id in ids {
            self.entries.remove(id);
            self.candidates.retain(|candidate| candidate != id);
        }
    }

    /// Return transactions from an abandoned mining attempt to the
    /// candidate list
    pub fn restore(&mut self, transactions: Vec<Transaction>) {
        for tx in transactions {
            let id = tx.id;
            if self.candidates.contains(&id) {
                continue;
            }
            if !self.entries.contains_key(&id) {
                let added_at = tx.timestamp;
                self.insert(tx, added_at);
                continue;
            }
            self.candidates.push(id);
        }
        self.sort_candidates();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.candidates.clear();
    }

    /// Replace the whole pool, e.g. from an imported snapshot
    pub fn replace(&mut self, transactions: Vec<Transaction>, added_at: u64) {
        self.clear();
        for tx in transactions {
            if !self.entries.contains_key(&tx.id) {
                self.insert(tx, added_at);
            }
        }
    }
}

/// Higher gas price first, then older, then earlier admitted
fn compare_entries(a: &MempoolEntry, b: &MempoolEntry) -> Ordering {
    b.transaction
        .gas_price
        .total_cmp(&a.transaction.gas_price)
        .then(a.transaction.timestamp.cmp(&b.transaction.timestamp))
        .then(a.sequence.cmp(&b.sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::TxKind;

    fn fields(title: &str) -> TransactionFields {
        TransactionFields::new(title, "test", "₹1.00", TxKind::Expense)
    }

    fn titles(txs: &[Transaction]) -> Vec<String> {
        txs.iter().map(|tx| tx.title.clone()).collect()
    }

    #[test]
    fn test_fifo_for_equal_gas_price() {
        let mut pool = Mempool::new();
        pool.admit_fields(fields("A"), 10, None);
        pool.admit_fields(fields("B"), 10, None);
        pool.admit_fields(fields("C"), 10, None);
        assert_eq!(titles(&pool.pending()), ["A", "B", "C"]);
    }

    #[test]
    fn test_gas_price_outranks_age() {
        let mut pool = Mempool::new();
        pool.admit_fields(fields("cheap"), 1, None);
        pool.admit_fields(fields("pricey").gas_price(0.5), 2, None);
        pool.admit_fields(fields("older"), 0, None);
        assert_eq!(titles(&pool.pending()), ["pricey", "older", "cheap"]);
    }

    #[test]
    fn test_take_and_absorb() {
        let mut pool = Mempool::new();
        let a = pool.admit_fields(fields("A"), 1, None);
        pool.admit_fields(fields("B"), 2, None);

        let taken = pool.take_pending();
        assert_eq!(taken.len(), 2);
        assert_eq!(pool.pending_len(), 0);
        assert_eq!(pool.len(), 2);
        assert!(pool.contains(&a));

        pool.absorb(taken.iter().map(|tx| &tx.id));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_restore_after_cancel() {
        let mut pool = Mempool::new();
        pool.admit_fields(fields("A"), 1, None);
        pool.admit_fields(fields("B"), 2, None);
        let taken = pool.take_pending();

        pool.admit_fields(fields("late"), 3, None);
        pool.restore(taken);
        assert_eq!(titles(&pool.pending()), ["A", "B", "late"]);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut pool = Mempool::new();
        let tx = Transaction::from_fields(fields("A"), 1, None, 99);
        assert!(pool.admit(tx.clone(), 1).is_ok());
        assert_eq!(pool.admit(tx.clone(), 2), Err(MempoolError::Duplicate(tx.id)));
    }

    #[test]
    fn test_entry_metadata() {
        let mut pool = Mempool::new();
        let id = pool.admit_fields(fields("A").from_account("BLx").gas_price(0.2), 7, Some(0));
        let entry = pool.get(&id).unwrap();
        assert_eq!(entry.added_at, 7);
        assert!((entry.priority - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_replace() {
        let mut pool = Mempool::new();
        pool.admit_fields(fields("old"), 1, None);
        let incoming = vec![Transaction::from_fields(fields("new"), 5, None, 0)];
        pool.replace(incoming, 9);
        assert_eq!(titles(&pool.pending()), ["new"]);
        assert_eq!(pool.len(), 1);
    }
}
