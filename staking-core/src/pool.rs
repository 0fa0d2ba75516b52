//! Validator pool registry
//!
//! Each validator identity maps to a [`Pool`]: the coins bonded to it, the
//! shares issued against those coins, and the delegator sub-ledger holding
//! each delegator's share balance. Pools are created on the first committed
//! bond and never removed.
//!
//! Unbond initiation debits the delegator's shares but leaves the pool
//! totals alone; they change only when the queued entry matures
//! ([`PoolRegistry::settle`]), so balance changes in between (rewards,
//! slashes) are reflected in the payout.

use crate::{
    accounts::{Account, AccountLedger, Accounts},
    error::{Error, Rejection, Result, TxResult},
    shares,
    tx::{Input, Output},
    types::{Address, ValidatorId},
    unbonding::UnbondingEntry,
    voting::VotingPowerTable,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

/// Bonded stake of one validator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Total coins bonded
    pub balance: u64,

    /// Total shares outstanding (including shares queued for unbonding)
    pub shares: u64,

    /// Delegator share balances and sequences
    pub delegators: AccountLedger,
}

impl Pool {
    /// Whether `shares == 0 ⇔ balance == 0` holds
    pub fn is_consistent(&self) -> bool {
        (self.shares == 0) == (self.balance == 0)
    }

    /// Coin value of `shares` at the current ratio
    pub fn value_of(&self, shares: u64) -> Option<u64> {
        shares::to_coins(shares, self)
    }
}

/// Validator identity → pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolRegistry {
    pools: BTreeMap<ValidatorId, Pool>,
}

impl PoolRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a validator's pool
    pub fn get(&self, validator: &ValidatorId) -> TxResult<&Pool> {
        self.pools
            .get(validator)
            .ok_or_else(|| Rejection::UnknownValidator(validator.clone()))
    }

    fn get_mut(&mut self, validator: &ValidatorId) -> TxResult<&mut Pool> {
        self.pools
            .get_mut(validator)
            .ok_or_else(|| Rejection::UnknownValidator(validator.clone()))
    }

    /// Whether the validator has ever been bonded to
    pub fn contains(&self, validator: &ValidatorId) -> bool {
        self.pools.contains_key(validator)
    }

    /// Number of pools
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether no pool exists
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Iterate pools in validator order
    pub fn iter(&self) -> impl Iterator<Item = (&ValidatorId, &Pool)> {
        self.pools.iter()
    }

    /// Sum of pool balances
    pub fn total_balance(&self) -> u128 {
        self.pools.values().map(|pool| u128::from(pool.balance)).sum()
    }

    /// `(balance, shares)` of a pool, if it exists
    pub(crate) fn totals(&self, validator: &ValidatorId) -> Option<(u64, u64)> {
        self.pools.get(validator).map(|pool| (pool.balance, pool.shares))
    }

    /// Delegator pre-image, if the pool and account exist
    pub(crate) fn delegator(&self, validator: &ValidatorId, address: &Address) -> Option<Account> {
        self.pools
            .get(validator)
            .and_then(|pool| pool.delegators.get(address).copied())
    }

    /// Put back pool totals and delegator accounts
    ///
    /// `None` totals mean the pool did not exist and is removed.
    pub(crate) fn restore(
        &mut self,
        validator: &ValidatorId,
        totals: Option<(u64, u64)>,
        delegators: Vec<(Address, Option<Account>)>,
    ) {
        let Some((balance, shares)) = totals else {
            self.pools.remove(validator);
            return;
        };
        if let Some(pool) = self.pools.get_mut(validator) {
            pool.balance = balance;
            pool.shares = shares;
            for (address, account) in delegators {
                pool.delegators.restore(address, account);
            }
        }
    }

    /// Bond `output.amount` coins to `validator` on behalf of `output.address`
    ///
    /// Shares are priced at the ratio before the deposit. Returns the shares
    /// credited to the delegator.
    pub fn bond(
        &mut self,
        validator: &ValidatorId,
        output: &Output,
        accounts: &Accounts,
        voting: &mut VotingPowerTable,
    ) -> TxResult<u64> {
        let fresh = Pool::default();
        let current = self.pools.get(validator).unwrap_or(&fresh);
        if !current.is_consistent() {
            return Err(Rejection::InconsistentPool(validator.clone()));
        }
        if !accounts.supports(output.kind) {
            return Err(Rejection::UnknownAccountKind(output.kind));
        }

        let amount = output.amount;
        let shares =
            shares::to_shares(amount, current).ok_or(Rejection::Overflow("bonded shares"))?;
        let balance = current
            .balance
            .checked_add(amount)
            .ok_or(Rejection::Overflow("pool balance"))?;
        let total_shares = current
            .shares
            .checked_add(shares)
            .ok_or(Rejection::Overflow("pool shares"))?;

        // Nothing below can fail once voting power accepts the increase:
        // the delegator's share balance is bounded by `total_shares`.
        voting.increase(validator, amount)?;
        let pool = self.pools.entry(validator.clone()).or_default();
        accounts.credit(&mut pool.delegators, output.kind, &output.address, shares)?;
        pool.balance = balance;
        pool.shares = total_shares;

        debug!(
            %validator,
            delegator = %output.address,
            amount,
            shares,
            pool_balance = pool.balance,
            pool_shares = pool.shares,
            "bonded"
        );
        Ok(shares)
    }

    /// Debit the delegator's shares for a withdrawal of `input.amount` coins
    ///
    /// Voting power drops by the coin amount immediately; the pool totals are
    /// left for [`PoolRegistry::settle`]. Returns the shares debited. A
    /// withdrawal too small to redeem a single share is rejected.
    pub fn initiate_unbond(
        &mut self,
        validator: &ValidatorId,
        input: &Input,
        sighash: &[u8; 32],
        accounts: &Accounts,
        voting: &mut VotingPowerTable,
    ) -> TxResult<u64> {
        let pool = self.get_mut(validator)?;
        let shares =
            shares::to_shares(input.amount, pool).ok_or(Rejection::Overflow("unbonded shares"))?;
        if shares == 0 {
            return Err(Rejection::Malformed(format!(
                "withdrawal of {} from validator \"{}\" redeems no shares",
                input.amount, validator
            )));
        }

        accounts.debit(&mut pool.delegators, input, shares, sighash)?;
        voting.decrease(validator, input.amount);

        debug!(
            %validator,
            delegator = %input.address,
            amount = input.amount,
            shares,
            "unbond initiated"
        );
        Ok(shares)
    }

    /// Redeem a matured entry's shares against the pool, returning the coins
    ///
    /// Failure here means state was corrupted after a valid initiation.
    pub(crate) fn settle(&mut self, entry: &UnbondingEntry) -> Result<u64> {
        let validator = &entry.validator;
        let pool = self.pools.get_mut(validator).ok_or_else(|| {
            error!(%validator, "matured unbond references missing pool");
            Error::InvariantViolation(format!("No staking state for validator \"{}\"", validator))
        })?;

        let owed = shares::to_coins(entry.shares, pool).ok_or_else(|| {
            Error::InvariantViolation(format!("payout overflow for validator \"{}\"", validator))
        })?;
        let coins = owed.min(pool.balance);
        if coins < owed {
            warn!(%validator, owed, paid = coins, "payout clamped to pool balance");
        }

        pool.shares = pool.shares.checked_sub(entry.shares).ok_or_else(|| {
            error!(%validator, pool_shares = pool.shares, redeemed = entry.shares, "share underflow");
            Error::InvariantViolation(format!(
                "validator \"{}\" has {} shares, {} redeemed",
                validator, pool.shares, entry.shares
            ))
        })?;
        pool.balance -= coins;

        Ok(coins)
    }

    /// Add `amount` coins to a pool without issuing shares
    pub fn apply_reward(
        &mut self,
        validator: &ValidatorId,
        amount: u64,
        voting: &mut VotingPowerTable,
    ) -> TxResult<()> {
        let pool = self.get_mut(validator)?;
        if pool.shares == 0 {
            return Err(Rejection::InconsistentPool(validator.clone()));
        }

        let balance = pool
            .balance
            .checked_add(amount)
            .ok_or(Rejection::Overflow("pool balance"))?;
        voting.increase(validator, amount)?;
        pool.balance = balance;

        debug!(%validator, amount, pool_balance = pool.balance, "reward applied");
        Ok(())
    }

    /// Remove up to `amount` coins from a pool, returning the amount removed
    pub fn apply_slash(
        &mut self,
        validator: &ValidatorId,
        amount: u64,
        voting: &mut VotingPowerTable,
    ) -> TxResult<u64> {
        let pool = self.get_mut(validator)?;
        let slashed = amount.min(pool.balance);
        pool.balance -= slashed;
        voting.decrease(validator, slashed);

        if !pool.is_consistent() {
            warn!(%validator, shares = pool.shares, "pool slashed to zero with shares outstanding");
        }
        debug!(%validator, slashed, pool_balance = pool.balance, "slash applied");
        Ok(slashed)
    }
}
