//! Identifier types shared across the staking core
//!
//! All types are designed for:
//! - Deterministic serialization (bincode, ordered map keys)
//! - Canonical form at construction, so equal identities compare equal

use serde::{Deserialize, Serialize};
use std::fmt;

/// Validator identity (public key, lowercase hex)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ValidatorId(String);

impl ValidatorId {
    /// Create new validator ID, normalising to lowercase
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().to_ascii_lowercase())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ValidatorId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<ValidatorId> for String {
    fn from(id: ValidatorId) -> Self {
        id.0
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account address within a ledger or delegator sub-ledger
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Create new address
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account kind, selects the handler that authorizes spends
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Ed25519 single-key account
    Ed25519,
    /// Secp256k1 single-key account
    Secp256k1,
    /// Multi-signature account
    Multisig,
}

impl AccountKind {
    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            AccountKind::Ed25519 => "ed25519",
            AccountKind::Secp256k1 => "secp256k1",
            AccountKind::Multisig => "multisig",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
