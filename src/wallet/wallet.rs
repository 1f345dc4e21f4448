//! Wallet implementation
//!
//! Handles key generation, the wallet registry, and transaction signing.
//! Wallets never affect block validity beyond the signatures they produce.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::{validate_address, PrivateKey, PublicKey, RecoverableSignature};
use crate::validation::{Transaction, TxStatus};

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
}

/// A key pair with its derived address, stored as hex
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub address: String,
    pub private_key: String,
    pub public_key: String,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl Wallet {
    /// Generate a new random wallet
    pub fn generate() -> Self {
        Self::from_key(&PrivateKey::generate())
    }

    /// Import from a hex private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let key = PrivateKey::from_hex(private_key_hex).map_err(|_| WalletError::InvalidPrivateKey)?;
        Ok(Self::from_key(&key))
    }

    fn from_key(key: &PrivateKey) -> Self {
        let public_key = key.public_key();
        Self {
            address: public_key.to_address(),
            private_key: key.to_hex(),
            public_key: public_key.to_hex(),
        }
    }
}

/// Registry of every wallet the ledger has created or imported
///
/// Keeps insertion order; wallets are never removed.
#[derive(Debug, Default, Clone)]
pub struct WalletRegistry {
    wallets: Vec<Wallet>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted wallets, skipping duplicate addresses
    pub fn from_wallets(wallets: Vec<Wallet>) -> Self {
        let mut registry = Self::new();
        for wallet in wallets {
            registry.insert(wallet);
        }
        registry
    }

    /// Generate a new wallet and add it to the registry
    pub fn create(&mut self) -> Wallet {
        let wallet = Wallet::generate();
        self.insert(wallet.clone());
        wallet
    }

    /// Add a wallet; returns false if the address is already registered
    pub fn insert(&mut self, wallet: Wallet) -> bool {
        if self.get(&wallet.address).is_some() {
            return false;
        }
        self.wallets.push(wallet);
        true
    }

    /// Get a wallet by address
    pub fn get(&self, address: &str) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.address == address)
    }

    pub fn all(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}

/// Sign a transaction with a hex private key
///
/// Sets the sender to the signer's address when absent, then assigns the
/// signing hash as id and attaches a recoverable signature over it. An
/// unusable key yields the transaction marked `failed` and unsigned.
pub fn sign_transaction(mut tx: Transaction, private_key_hex: &str) -> Transaction {
    let key = match PrivateKey::from_hex(private_key_hex) {
        Ok(key) => key,
        Err(e) => {
            warn!("Error in transaction signing process: {}", e);
            tx.id = tx.signing_hash();
            tx.signature = None;
            tx.status = TxStatus::Failed;
            return tx;
        }
    };

    if tx.from_account.is_none() {
        tx.from_account = Some(key.public_key().to_address());
    }

    tx.id = tx.signing_hash();
    match key.sign(&tx.id) {
        Ok(signature) => tx.signature = Some(signature.to_hex()),
        Err(e) => {
            warn!("Error signing transaction {}: {}", tx.id, e);
            tx.signature = None;
            tx.status = TxStatus::Failed;
        }
    }
    tx
}

/// Verify a transaction's signature against its sender address
///
/// Coinbase transactions always verify. Otherwise a signature and a sender
/// are required, and the key recovered from the signature must derive to
/// the sender's address.
pub fn verify_transaction(tx: &Transaction) -> bool {
    if tx.is_coinbase() {
        return true;
    }

    let (Some(signature), Some(from)) = (tx.signature.as_deref(), tx.from_account.as_deref()) else {
        return false;
    };

    if !validate_address(from) {
        return false;
    }

    let Ok(signature) = RecoverableSignature::from_hex(signature) else {
        return false;
    };

    match PublicKey::recover(&tx.signing_hash(), &signature) {
        Ok(signer) => signer.to_address() == from,
        Err(e) => {
            debug!("Error verifying transaction signature {}: {}", tx.id, e);
            false
        }
    }
}

/// Next per-sender nonce: one past the highest nonce already used by
/// `address`, or 0 when it has no transactions
pub fn next_nonce<'a>(address: &str, transactions: impl IntoIterator<Item = &'a Transaction>) -> u64 {
    transactions
        .into_iter()
        .filter(|tx| tx.from_account.as_deref() == Some(address))
        .map(|tx| tx.nonce.unwrap_or(0))
        .max()
        .map_or(0, |highest| highest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{TransactionFields, TxKind};

    fn unsigned(from: Option<&str>) -> Transaction {
        let mut fields = TransactionFields::new("Expense Approval", "roads", "-₹250.00", TxKind::Approval);
        if let Some(from) = from {
            fields = fields.from_account(from);
        }
        Transaction::from_fields(fields, 1_000, Some(0), 0)
    }

    #[test]
    fn test_wallet_generation() {
        let wallet = Wallet::generate();
        assert!(validate_address(&wallet.address));
        assert_eq!(wallet.private_key.len(), 64);
    }

    #[test]
    fn test_wallet_import_matches() {
        let wallet = Wallet::generate();
        let imported = Wallet::from_private_key(&wallet.private_key).unwrap();
        assert_eq!(wallet, imported);
        assert!(Wallet::from_private_key("zz").is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let wallet = Wallet::generate();
        assert!(!format!("{:?}", wallet).contains(&wallet.private_key));
    }

    #[test]
    fn test_registry_keeps_order_and_rejects_duplicates() {
        let mut registry = WalletRegistry::new();
        let first = registry.create();
        let second = registry.create();
        assert!(!registry.insert(first.clone()));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.all()[0], first);
        assert_eq!(registry.get(&second.address), Some(&second));
        assert!(registry.get("BLmissing").is_none());
    }

    #[test]
    fn test_sign_then_verify() {
        let wallet = Wallet::generate();
        let signed = sign_transaction(unsigned(Some(&wallet.address)), &wallet.private_key);

        assert!(signed.signature.is_some());
        assert_eq!(signed.id, signed.signing_hash());
        assert_eq!(signed.status, TxStatus::Pending);
        assert!(verify_transaction(&signed));
    }

    #[test]
    fn test_sign_fills_missing_sender() {
        let wallet = Wallet::generate();
        let signed = sign_transaction(unsigned(None), &wallet.private_key);
        assert_eq!(signed.from_account.as_deref(), Some(wallet.address.as_str()));
        assert!(verify_transaction(&signed));
    }

    #[test]
    fn test_signature_survives_confirmation() {
        let wallet = Wallet::generate();
        let mut signed = sign_transaction(unsigned(Some(&wallet.address)), &wallet.private_key);
        signed.status = TxStatus::Confirmed;
        signed.block_id = Some(4);
        assert!(verify_transaction(&signed));
    }

    #[test]
    fn test_verify_rejects_tampering_and_impostors() {
        let wallet = Wallet::generate();
        let other = Wallet::generate();
        let signed = sign_transaction(unsigned(Some(&wallet.address)), &wallet.private_key);

        let mut tampered = signed.clone();
        tampered.amount = "-₹1.00".into();
        assert!(!verify_transaction(&tampered));

        let mut impostor = signed.clone();
        impostor.from_account = Some(other.address.clone());
        assert!(!verify_transaction(&impostor));

        let mut unsigned_copy = signed;
        unsigned_copy.signature = None;
        assert!(!verify_transaction(&unsigned_copy));
    }

    #[test]
    fn test_bad_key_marks_failed() {
        let tx = sign_transaction(unsigned(Some("BLsomeone")), "not a key");
        assert_eq!(tx.status, TxStatus::Failed);
        assert!(tx.signature.is_none());
    }

    #[test]
    fn test_coinbase_always_verifies() {
        let coinbase = Transaction::coinbase("Reward", "", "₹50.00", "Treasury", 1, 0);
        assert!(verify_transaction(&coinbase));
    }

    #[test]
    fn test_next_nonce() {
        let mut txs = Vec::new();
        assert_eq!(next_nonce("BLa", &txs), 0);

        for nonce in 0..3 {
            let mut tx = unsigned(Some("BLa"));
            tx.nonce = Some(nonce);
            txs.push(tx);
        }
        txs.push(unsigned(Some("BLb")));

        assert_eq!(next_nonce("BLa", &txs), 3);
        assert_eq!(next_nonce("BLb", &txs), 1);
        assert_eq!(next_nonce("BLc", &txs), 0);
    }
}
