//! Voting power table and chain context
//!
//! The consensus layer reads one voting-power figure per validator. It moves
//! with bonded stake: up on bond (and reward), down the moment an unbond is
//! announced (and on slash), not when the unbond matures.

use crate::{
    error::{Rejection, TxResult},
    types::ValidatorId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Validator → voting power
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VotingPowerTable {
    powers: BTreeMap<ValidatorId, u64>,
}

impl VotingPowerTable {
    /// Create empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Voting power of a validator (0 if unknown)
    pub fn get(&self, validator: &ValidatorId) -> u64 {
        self.powers.get(validator).copied().unwrap_or(0)
    }

    /// Add `amount` to a validator's power
    pub fn increase(&mut self, validator: &ValidatorId, amount: u64) -> TxResult<u64> {
        let power = self
            .get(validator)
            .checked_add(amount)
            .ok_or(Rejection::Overflow("voting power"))?;
        self.powers.insert(validator.clone(), power);
        Ok(power)
    }

    /// Subtract `amount` from a validator's power, stopping at zero
    ///
    /// Floor rounding lets announced unbond amounts sum to slightly more
    /// than the stake they were priced against, so this saturates.
    pub fn decrease(&mut self, validator: &ValidatorId, amount: u64) -> u64 {
        let current = self.get(validator);
        if amount > current {
            warn!(%validator, current, amount, "voting power decrease saturated at zero");
        }
        let power = current.saturating_sub(amount);
        self.powers.insert(validator.clone(), power);
        power
    }

    /// Raw entry, distinguishing "no entry" from zero power
    pub(crate) fn entry(&self, validator: &ValidatorId) -> Option<u64> {
        self.powers.get(validator).copied()
    }

    /// Put back a pre-image taken with [`VotingPowerTable::entry`]
    pub(crate) fn restore(&mut self, validator: ValidatorId, power: Option<u64>) {
        match power {
            Some(power) => {
                self.powers.insert(validator, power);
            }
            None => {
                self.powers.remove(&validator);
            }
        }
    }

    /// Iterate validators in identity order
    pub fn iter(&self) -> impl Iterator<Item = (&ValidatorId, u64)> {
        self.powers.iter().map(|(validator, power)| (validator, *power))
    }

    /// Number of validators with an entry (including zero power)
    pub fn len(&self) -> usize {
        self.powers.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }

    /// Sum of all voting power
    pub fn total(&self) -> u128 {
        self.powers.values().map(|power| u128::from(*power)).sum()
    }
}

/// Host chain view consumed by the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContext {
    /// Current block height
    pub height: u64,

    /// Voting power handed to consensus
    pub validators: VotingPowerTable,
}

impl ChainContext {
    /// Create context at `height` with an empty validator table
    pub fn new(height: u64) -> Self {
        Self {
            height,
            validators: VotingPowerTable::new(),
        }
    }
}
