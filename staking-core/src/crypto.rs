//! Cryptographic operations for account authorization
//!
//! This module provides:
//! - Ed25519 key pairs for signing transaction inputs
//! - Address derivation from public keys
//! - The built-in [`Ed25519Handler`] account handler

use crate::{
    accounts::AccountHandler,
    error::{Rejection, Result, TxResult},
    tx::{Input, Transaction},
    types::Address,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Length of an address in bytes (before hex encoding)
const ADDRESS_LEN: usize = 20;

/// Derive an account address: `hex(sha256(pubkey)[..20])`
pub fn address_from_pubkey(pubkey: &[u8]) -> Address {
    let digest = hash_bytes(pubkey);
    Address::new(hex::encode(&digest[..ADDRESS_LEN]))
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Ed25519 key pair for signing
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Get public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Address controlled by this key
    pub fn address(&self) -> Address {
        address_from_pubkey(&self.public_key())
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Sign every input of `tx` spending from this key's address
    ///
    /// Public keys are filled in first since they are part of the signed
    /// payload; signatures are not.
    pub fn sign_transaction(&self, tx: &mut Transaction) -> Result<()> {
        let address = self.address();
        let public_key = self.public_key().to_vec();

        for input in tx.inputs.iter_mut().filter(|input| input.address == address) {
            input.pubkey = public_key.clone();
        }

        let sighash = tx.sighash()?;
        let signature = self.sign(&sighash).to_vec();

        for input in tx.inputs.iter_mut().filter(|input| input.address == address) {
            input.signature = signature.clone();
        }

        Ok(())
    }
}

/// Authorizes ed25519 accounts
///
/// The input's public key must hash to its address, and its signature must
/// verify over the transaction's signing hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Handler;

impl AccountHandler for Ed25519Handler {
    fn authorize(&self, input: &Input, sighash: &[u8; 32]) -> TxResult<()> {
        let public_key: [u8; 32] = input
            .pubkey
            .as_slice()
            .try_into()
            .map_err(|_| Rejection::Unauthorized("ed25519 public key must be 32 bytes".into()))?;

        if address_from_pubkey(&public_key) != input.address {
            return Err(Rejection::Unauthorized(format!(
                "public key does not match address {}",
                input.address
            )));
        }

        let signature: [u8; 64] = input
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| Rejection::Unauthorized("ed25519 signature must be 64 bytes".into()))?;

        let verifying_key = VerifyingKey::from_bytes(&public_key)
            .map_err(|e| Rejection::Unauthorized(format!("Invalid public key: {}", e)))?;

        verifying_key
            .verify(sighash, &Signature::from_bytes(&signature))
            .map_err(|e| Rejection::Unauthorized(format!("Verification failed: {}", e)))
    }
}
