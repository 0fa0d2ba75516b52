//! Persisted staking state
//!
//! The entire durable footprint of the core:
//!
//! - `bonded` - validator pools (key: validator id)
//! - `unbonding` - pending unbonds (maturity order)
//! - `unbonded` - spendable balances (key: address)
//!
//! Every map is ordered, so the bincode encoding, and with it the state
//! root, depends only on content.

use crate::{
    accounts::AccountLedger,
    crypto::hash_bytes,
    error::{Error, Result},
    pool::PoolRegistry,
    types::Address,
    unbonding::UnbondingQueue,
};
use serde::{Deserialize, Serialize};

/// Staking state committed by the host after each block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingState {
    /// Validator pools
    pub bonded: PoolRegistry,

    /// Pending unbonds
    pub unbonding: UnbondingQueue,

    /// Spendable balances
    pub unbonded: AccountLedger,
}

impl StakingState {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state with funded unbonded accounts
    pub fn from_genesis(allocations: impl IntoIterator<Item = (Address, u64)>) -> Result<Self> {
        let mut state = Self::new();
        for (address, amount) in allocations {
            state.unbonded.deposit(address, amount).map_err(|rejection| {
                Error::Config(format!("Invalid genesis allocation: {}", rejection))
            })?;
        }
        Ok(state)
    }

    /// Canonical binary encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode canonical binary encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Human-readable encoding
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode human-readable encoding
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// SHA-256 of the canonical encoding
    pub fn state_root(&self) -> Result<[u8; 32]> {
        Ok(hash_bytes(&self.to_bytes()?))
    }

    /// Unbonded balances plus bonded pool balances
    ///
    /// Coins waiting in the unbonding queue are still counted in their pool.
    pub fn total_value(&self) -> u128 {
        self.unbonded.total() + self.bonded.total_balance()
    }
}
