//! Account ledger adapter
//!
//! One [`AccountLedger`] holds the spendable (unbonded) balances, and every
//! validator pool embeds another one holding its delegators' share balances.
//! Both are driven through the same [`Accounts`] registry: a debit checks the
//! input's authorization with the handler for its [`AccountKind`], enforces
//! the per-address sequence number, then deducts; a credit adds to the
//! destination, creating the account on first use.

use crate::{
    crypto::Ed25519Handler,
    error::{Rejection, TxResult},
    tx::Input,
    types::{AccountKind, Address},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Balance and replay-protection sequence of one address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Coins (unbonded ledger) or shares (delegator sub-ledger)
    pub balance: u64,

    /// Next expected input sequence
    pub sequence: u64,
}

/// Address-keyed ledger state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountLedger {
    accounts: BTreeMap<Address, Account>,
}

impl AccountLedger {
    /// Create empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Get account, if it has ever been credited
    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Balance of an address (0 if unknown)
    pub fn balance(&self, address: &Address) -> u64 {
        self.accounts.get(address).map_or(0, |account| account.balance)
    }

    /// Sequence of an address (0 if unknown)
    pub fn sequence(&self, address: &Address) -> u64 {
        self.accounts.get(address).map_or(0, |account| account.sequence)
    }

    /// Sum of all balances
    pub fn total(&self) -> u128 {
        self.accounts
            .values()
            .map(|account| u128::from(account.balance))
            .sum()
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the ledger has no accounts
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterate accounts in address order
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Credit without any handler check (genesis allocation)
    pub(crate) fn deposit(&mut self, address: Address, amount: u64) -> TxResult<()> {
        let account = self.accounts.entry(address).or_default();
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(Rejection::Overflow("account balance"))?;
        Ok(())
    }

    /// Put back a pre-image taken with [`AccountLedger::get`]
    pub(crate) fn restore(&mut self, address: Address, account: Option<Account>) {
        match account {
            Some(account) => {
                self.accounts.insert(address, account);
            }
            None => {
                self.accounts.remove(&address);
            }
        }
    }
}

/// Authorizes spends for one account kind
pub trait AccountHandler: fmt::Debug + Send + Sync {
    /// Check that `input` proves control of `input.address` over `sighash`
    fn authorize(&self, input: &Input, sighash: &[u8; 32]) -> TxResult<()>;
}

/// Handler registry and debit/credit primitives
#[derive(Debug, Default)]
pub struct Accounts {
    handlers: BTreeMap<AccountKind, Box<dyn AccountHandler>>,
}

impl Accounts {
    /// Create registry with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create registry with the built-in handlers (ed25519)
    pub fn with_defaults() -> Self {
        let mut accounts = Self::new();
        accounts.register(AccountKind::Ed25519, Ed25519Handler);
        accounts
    }

    /// Register (or replace) the handler for an account kind
    pub fn register(&mut self, kind: AccountKind, handler: impl AccountHandler + 'static) {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Whether a handler exists for `kind`
    pub fn supports(&self, kind: AccountKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    fn handler(&self, kind: AccountKind) -> TxResult<&dyn AccountHandler> {
        self.handlers
            .get(&kind)
            .map(|handler| handler.as_ref())
            .ok_or(Rejection::UnknownAccountKind(kind))
    }

    /// Debit `amount` from `input.address`, authorized by `input`
    ///
    /// `amount` is passed separately because the bonded path debits shares
    /// while the input itself is denominated in coins.
    pub fn debit(
        &self,
        ledger: &mut AccountLedger,
        input: &Input,
        amount: u64,
        sighash: &[u8; 32],
    ) -> TxResult<()> {
        self.handler(input.kind)?.authorize(input, sighash)?;

        let address = &input.address;
        let account = ledger
            .accounts
            .get_mut(address)
            .ok_or_else(|| Rejection::InsufficientBalance {
                address: address.clone(),
                available: 0,
                requested: amount,
            })?;

        if input.sequence != account.sequence {
            return Err(Rejection::InvalidSequence {
                address: address.clone(),
                expected: account.sequence,
                actual: input.sequence,
            });
        }

        if account.balance < amount {
            return Err(Rejection::InsufficientBalance {
                address: address.clone(),
                available: account.balance,
                requested: amount,
            });
        }

        account.balance -= amount;
        account.sequence += 1;

        debug!(%address, amount, sequence = account.sequence, "debited account");
        Ok(())
    }

    /// Credit `amount` to `address`
    pub fn credit(
        &self,
        ledger: &mut AccountLedger,
        kind: AccountKind,
        address: &Address,
        amount: u64,
    ) -> TxResult<()> {
        self.handler(kind)?;
        ledger.deposit(address.clone(), amount)?;

        debug!(%address, amount, "credited account");
        Ok(())
    }
}
