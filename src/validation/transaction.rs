//! Transaction structure
//!
//! Ledger entries with a human title, a signed amount string, optional
//! parties and an optional recoverable signature over the signing hash.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{BASE_GAS, DEFAULT_GAS_PRICE, GAS_PER_BYTE};
use crate::crypto::{hash_bytes, Hash};

/// Transaction type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Transfer,
    Expense,
    Approval,
    Increase,
    Report,
    Coinbase,
}

impl TxKind {
    /// Kinds a user (or the demo generator) may submit
    pub const USER_KINDS: [TxKind; 5] = [
        TxKind::Approval,
        TxKind::Increase,
        TxKind::Expense,
        TxKind::Transfer,
        TxKind::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Transfer => "transfer",
            TxKind::Expense => "expense",
            TxKind::Approval => "approval",
            TxKind::Increase => "increase",
            TxKind::Report => "report",
            TxKind::Coinbase => "coinbase",
        }
    }

    /// Extra gas charged on top of the base and data cost
    pub fn gas_surcharge(&self) -> u64 {
        match self {
            TxKind::Approval => 10_000,
            TxKind::Transfer => 5_000,
            TxKind::Expense => 3_000,
            TxKind::Increase | TxKind::Report | TxKind::Coinbase => 1_000,
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

/// Caller-supplied fields of a new transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFields {
    pub title: String,
    pub description: String,
    /// Signed amount, e.g. `"-₹1,200.00"`
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<f64>,
}

impl TransactionFields {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        amount: impl Into<String>,
        kind: TxKind,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            amount: amount.into(),
            kind,
            from_account: None,
            to_account: None,
            gas_price: None,
        }
    }

    pub fn from_account(mut self, account: impl Into<String>) -> Self {
        self.from_account = Some(account.into());
        self
    }

    pub fn to_account(mut self, account: impl Into<String>) -> Self {
        self.to_account = Some(account.into());
        self
    }

    pub fn gas_price(mut self, price: f64) -> Self {
        self.gas_price = Some(price);
        self
    }
}

/// Estimate gas: base cost + per-byte data cost + type surcharge
pub fn estimate_gas(fields: &TransactionFields) -> u64 {
    let size = serde_json::to_vec(fields)
        .map(|bytes| bytes.len() as u64)
        .unwrap_or(0);
    BASE_GAS + GAS_PER_BYTE * size + fields.kind.gas_surcharge()
}

fn default_gas_price() -> f64 {
    DEFAULT_GAS_PRICE
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Hash,
    /// Creation time (milliseconds since Unix epoch)
    pub timestamp: u64,
    pub title: String,
    pub description: String,
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_account: Option<String>,
    /// Hex recoverable signature over the signing hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Per-sender sequence number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub gas: u64,
    #[serde(default = "default_gas_price")]
    pub gas_price: f64,
    #[serde(default)]
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<u64>,
}

impl Transaction {
    /// Build a pending, unsigned transaction from caller fields
    ///
    /// The id digests the timestamp, the serialized fields and the
    /// admission sequence number.
    pub fn from_fields(
        fields: TransactionFields,
        timestamp: u64,
        nonce: Option<u64>,
        admission_seq: u64,
    ) -> Self {
        let gas = estimate_gas(&fields);
        let mut id_bytes = timestamp.to_le_bytes().to_vec();
        id_bytes.extend(serde_json::to_vec(&fields).unwrap_or_default());
        id_bytes.extend_from_slice(&admission_seq.to_le_bytes());

        Self {
            id: hash_bytes(&id_bytes),
            timestamp,
            title: fields.title,
            description: fields.description,
            amount: fields.amount,
            kind: fields.kind,
            from_account: fields.from_account,
            to_account: fields.to_account,
            signature: None,
            nonce,
            gas,
            gas_price: fields.gas_price.unwrap_or(DEFAULT_GAS_PRICE),
            status: TxStatus::Pending,
            block_id: None,
        }
    }

    /// Create a coinbase transaction, confirmed into `block_id`
    pub fn coinbase(
        title: impl Into<String>,
        description: impl Into<String>,
        amount: impl Into<String>,
        to_account: impl Into<String>,
        timestamp: u64,
        block_id: u64,
    ) -> Self {
        let mut tx = Self {
            id: Hash::zero(),
            timestamp,
            title: title.into(),
            description: description.into(),
            amount: amount.into(),
            kind: TxKind::Coinbase,
            from_account: None,
            to_account: Some(to_account.into()),
            signature: None,
            nonce: None,
            gas: 0,
            gas_price: DEFAULT_GAS_PRICE,
            status: TxStatus::Confirmed,
            block_id: Some(block_id),
        };
        tx.id = tx.signing_hash();
        tx
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.kind == TxKind::Coinbase
    }

    /// Whether a signature check applies to this transaction
    pub fn needs_signature_check(&self) -> bool {
        !self.is_coinbase() && self.signature.is_some() && self.from_account.is_some()
    }

    /// Mempool priority: gas price, plus one for sender-attributed entries
    pub fn priority(&self) -> f64 {
        let sender_bonus = if self.from_account.is_some() { 1.0 } else { 0.0 };
        self.gas_price + sender_bonus
    }

    /// Hash of the signed payload (excludes id, signature, status, block)
    pub fn signing_hash(&self) -> Hash {
        hash_bytes(&self.to_bytes_for_signing())
    }

    /// Merkle leaf hash (canonical fields, signature excluded)
    pub fn leaf_hash(&self) -> Hash {
        hash_bytes(&self.to_bytes_for_merkle())
    }

    fn to_bytes_for_signing(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        put_str(&mut bytes, &self.title);
        put_str(&mut bytes, &self.description);
        put_str(&mut bytes, &self.amount);
        put_str(&mut bytes, self.kind.as_str());
        put_str(&mut bytes, self.from_account.as_deref().unwrap_or(""));
        put_str(&mut bytes, self.to_account.as_deref().unwrap_or(""));
        bytes.extend_from_slice(&self.nonce.unwrap_or(0).to_le_bytes());
        bytes.extend_from_slice(&self.gas.to_le_bytes());
        bytes.extend_from_slice(&self.gas_price.to_bits().to_le_bytes());
        bytes
    }

    fn to_bytes_for_merkle(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.id.0);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        put_str(&mut bytes, &self.title);
        put_str(&mut bytes, &self.description);
        put_str(&mut bytes, &self.amount);
        put_str(&mut bytes, self.kind.as_str());
        put_str(&mut bytes, self.from_account.as_deref().unwrap_or(""));
        put_str(&mut bytes, self.to_account.as_deref().unwrap_or(""));
        bytes.extend_from_slice(&self.nonce.unwrap_or(0).to_le_bytes());
        bytes.extend_from_slice(&self.gas.to_le_bytes());
        bytes
    }
}

/// Length-prefixed string, so adjacent fields cannot run into each other
fn put_str(bytes: &mut Vec<u8>, value: &str) {
    bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
    bytes.extend_from_slice(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        let fields = TransactionFields::new("Budget Allocation", "Q3 roads", "₹1,000.00", TxKind::Transfer)
            .from_account("BLsender")
            .to_account("BLreceiver");
        Transaction::from_fields(fields, 1_700_000_000_000, Some(0), 0)
    }

    #[test]
    fn test_coinbase_detection() {
        let coinbase = Transaction::coinbase("Reward", "", "₹50.00", "Treasury", 1, 0);
        assert!(coinbase.is_coinbase());
        assert!(!coinbase.needs_signature_check());
        assert_eq!(coinbase.status, TxStatus::Confirmed);
        assert!(!sample().is_coinbase());
    }

    #[test]
    fn test_admission_sequence_separates_ids() {
        let fields = TransactionFields::new("t", "d", "1", TxKind::Report);
        let a = Transaction::from_fields(fields.clone(), 5, None, 0);
        let b = Transaction::from_fields(fields, 5, None, 1);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_signing_hash_ignores_mutable_fields() {
        let tx = sample();
        let mut confirmed = tx.clone();
        confirmed.status = TxStatus::Confirmed;
        confirmed.block_id = Some(7);
        confirmed.signature = Some("ab".repeat(65));
        assert_eq!(tx.signing_hash(), confirmed.signing_hash());

        let mut tampered = tx.clone();
        tampered.amount = "₹9,999.00".into();
        assert_ne!(tx.signing_hash(), tampered.signing_hash());
    }

    #[test]
    fn test_leaf_hash_excludes_signature() {
        let tx = sample();
        let mut signed = tx.clone();
        signed.signature = Some("cd".repeat(65));
        assert_eq!(tx.leaf_hash(), signed.leaf_hash());

        let mut tampered = tx.clone();
        tampered.amount = "₹0.01".into();
        assert_ne!(tx.leaf_hash(), tampered.leaf_hash());
    }

    #[test]
    fn test_gas_surcharge_table() {
        let gas = |kind| estimate_gas(&TransactionFields::new("x", "y", "1", kind));
        assert!(gas(TxKind::Approval) > gas(TxKind::Transfer));
        assert!(gas(TxKind::Transfer) > gas(TxKind::Expense));
        assert!(gas(TxKind::Expense) > gas(TxKind::Report));

        // "approval" and "transfer" serialize to the same length
        assert_eq!(gas(TxKind::Approval) - gas(TxKind::Transfer), 5_000);

        let fields = TransactionFields::new("x", "y", "1", TxKind::Increase);
        let size = serde_json::to_vec(&fields).unwrap().len() as u64;
        assert_eq!(estimate_gas(&fields), BASE_GAS + GAS_PER_BYTE * size + 1_000);
    }

    #[test]
    fn test_gas_counts_bytes() {
        let short = TransactionFields::new("a", "", "1", TxKind::Report);
        let long = TransactionFields::new("aaaa", "", "1", TxKind::Report);
        assert_eq!(estimate_gas(&long) - estimate_gas(&short), 3 * GAS_PER_BYTE);
        assert!(estimate_gas(&short) > BASE_GAS);
    }

    #[test]
    fn test_json_layout() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "transfer");
        assert_eq!(json["fromAccount"], "BLsender");
        assert_eq!(json["status"], "pending");
        assert!(json.get("signature").is_none());
        assert!(json.get("gasPrice").is_some());
    }

    #[test]
    fn test_priority_prefers_attributed() {
        let anon = Transaction::from_fields(TransactionFields::new("t", "d", "1", TxKind::Report), 1, None, 0);
        assert!(sample().priority() > anon.priority());
    }
}
