//! Unbonding queue
//!
//! Entries are appended with `maturity_height = height + unbonding_period`.
//! The period is fixed for the life of the chain, so insertion order is
//! maturity order and the queue drains from the front without sorting.

use crate::{
    accounts::{AccountLedger, Accounts},
    error::{Error, Result},
    pool::PoolRegistry,
    types::{AccountKind, Address, ValidatorId},
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, error};

/// Recipient of a matured unbond
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Account kind of the recipient
    pub kind: AccountKind,

    /// Recipient address in the unbonded ledger
    pub address: Address,
}

/// A withdrawal waiting for its maturity height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingEntry {
    /// Height at which the entry becomes payable
    pub maturity_height: u64,

    /// Pool the shares are redeemed from
    pub validator: ValidatorId,

    /// Shares redeemed (already debited from the delegator, still counted
    /// in the pool's totals)
    pub shares: u64,

    /// Where the coins go
    pub destination: Destination,
}

impl UnbondingEntry {
    /// Whether the entry is payable at `height`
    pub fn is_mature(&self, height: u64) -> bool {
        self.maturity_height <= height
    }
}

/// A completed payout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    /// Pool the shares were redeemed from
    pub validator: ValidatorId,

    /// Credited account
    pub destination: Destination,

    /// Shares redeemed
    pub shares: u64,

    /// Coins credited
    pub coins: u64,
}

/// FIFO of pending unbonds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnbondingQueue {
    entries: VecDeque<UnbondingEntry>,
}

impl UnbondingQueue {
    /// Create empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the tail
    pub fn enqueue(&mut self, entry: UnbondingEntry) {
        debug!(
            validator = %entry.validator,
            shares = entry.shares,
            maturity_height = entry.maturity_height,
            "unbond queued"
        );
        self.entries.push_back(entry);
    }

    /// Next entry to mature
    pub fn front(&self) -> Option<&UnbondingEntry> {
        self.entries.front()
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries appended after the queue had `len` entries
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Iterate pending entries in maturity order
    pub fn iter(&self) -> impl Iterator<Item = &UnbondingEntry> {
        self.entries.iter()
    }

    /// Pay out every entry mature at `height`
    ///
    /// Each matured entry's shares are redeemed at the pool's current ratio,
    /// removed from the pool totals, and the coins credited to the
    /// destination in `unbonded`. Stops at the first immature entry. Any
    /// failure is an invariant violation: the entry was valid when queued.
    pub fn drain(
        &mut self,
        height: u64,
        pools: &mut PoolRegistry,
        unbonded: &mut AccountLedger,
        accounts: &Accounts,
    ) -> Result<Vec<Payout>> {
        let mut payouts = Vec::new();

        while self.entries.front().is_some_and(|entry| entry.is_mature(height)) {
            let Some(entry) = self.entries.pop_front() else {
                break;
            };

            let coins = pools.settle(&entry)?;
            accounts
                .credit(unbonded, entry.destination.kind, &entry.destination.address, coins)
                .map_err(|rejection| {
                    error!(
                        validator = %entry.validator,
                        address = %entry.destination.address,
                        %rejection,
                        "matured unbond could not be credited"
                    );
                    Error::InvariantViolation(format!("unbond payout failed: {}", rejection))
                })?;

            debug!(
                validator = %entry.validator,
                address = %entry.destination.address,
                shares = entry.shares,
                coins,
                "unbond matured"
            );
            payouts.push(Payout {
                validator: entry.validator,
                destination: entry.destination,
                shares: entry.shares,
                coins,
            });
        }

        Ok(payouts)
    }
}
