//! secp256k1 keys with recoverable ECDSA signatures
//!
//! A signature carries its recovery id, so a verifier can rebuild the
//! signer's public key (and therefore its address) from the signature and
//! the signed digest alone.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use super::{double_hash, hash_bytes, Hash};
use crate::constants::ADDRESS_PREFIX;

/// Length of a compressed SEC1 public key
pub const PUBLIC_KEY_LEN: usize = 33;

/// Length of a recoverable signature (r ‖ s ‖ recovery id)
pub const SIGNATURE_LEN: usize = 65;

/// Key and signature errors
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature encoding")]
    InvalidSignature,
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    #[error("Public key recovery failed")]
    RecoveryFailed,
}

/// 32-byte private key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// Compressed secp256k1 public key
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

/// 65-byte recoverable signature
#[derive(Clone, PartialEq, Eq)]
pub struct RecoverableSignature(pub [u8; SIGNATURE_LEN]);

impl PrivateKey {
    /// Generate a new random private key
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    /// Create from 32 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        SigningKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|_| KeyError::InvalidPrivateKey)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim_start_matches("0x"))
            .map_err(|_| KeyError::InvalidPrivateKey)?;
        Self::from_bytes(&bytes)
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.0.verifying_key())
    }

    /// Sign a message digest
    pub fn sign(&self, message: &Hash) -> Result<RecoverableSignature, KeyError> {
        let (signature, recovery_id) = self
            .0
            .sign_prehash_recoverable(message.as_bytes())
            .map_err(|e| KeyError::SigningFailed(e.to_string()))?;

        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte();
        Ok(RecoverableSignature(bytes))
    }

    /// Export to bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl PublicKey {
    /// Create from compressed or uncompressed SEC1 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(PublicKey)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }

    /// Recover the signer of `message` from a recoverable signature
    pub fn recover(message: &Hash, signature: &RecoverableSignature) -> Result<Self, KeyError> {
        let sig = Signature::from_slice(&signature.0[..64]).map_err(|_| KeyError::InvalidSignature)?;
        let recovery_id =
            RecoveryId::from_byte(signature.0[64]).ok_or(KeyError::InvalidSignature)?;

        VerifyingKey::recover_from_prehash(message.as_bytes(), &sig, recovery_id)
            .map(PublicKey)
            .map_err(|_| KeyError::RecoveryFailed)
    }

    /// Export compressed SEC1 bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Convert to address with checksum
    pub fn to_address(&self) -> String {
        // Address = prefix + Base58(BLAKE3(pubkey)[0:20] ‖ checksum[0:4])
        let hash = hash_bytes(&self.to_bytes());
        let addr_bytes = &hash.0[0..20];
        let checksum = double_hash(addr_bytes);

        let mut with_checksum = Vec::with_capacity(24);
        with_checksum.extend_from_slice(addr_bytes);
        with_checksum.extend_from_slice(&checksum.0[0..4]);

        format!("{}{}", ADDRESS_PREFIX, bs58::encode(&with_checksum).into_string())
    }
}

impl RecoverableSignature {
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.len() != SIGNATURE_LEN {
            return Err(KeyError::InvalidSignature);
        }
        let mut arr = [0u8; SIGNATURE_LEN];
        arr.copy_from_slice(&bytes);
        Ok(RecoverableSignature(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

/// Check an address's prefix, length and checksum
pub fn validate_address(address: &str) -> bool {
    let Some(encoded) = address.strip_prefix(ADDRESS_PREFIX) else {
        return false;
    };
    let Ok(decoded) = bs58::decode(encoded).into_vec() else {
        return false;
    };
    if decoded.len() != 24 {
        return false;
    }
    let checksum = double_hash(&decoded[0..20]);
    decoded[20..24] == checksum.0[0..4]
}
