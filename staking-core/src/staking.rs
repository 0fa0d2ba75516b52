//! State transition dispatcher
//!
//! Three entry points, driven by the host in a fixed order:
//!
//! - [`Staking::on_input`] for each transaction input (debits)
//! - [`Staking::on_output`] for each transaction output (credits)
//! - [`Staking::on_block`] once at the end of every block
//!
//! [`Staking::execute_transaction`] wraps the first two with structural
//! checks and all-or-nothing commit.

use crate::{
    accounts::{AccountHandler, Accounts},
    checkpoint::Checkpoint,
    config::Config,
    error::{Rejection, Result, TxResult},
    metrics::Metrics,
    shares,
    state::StakingState,
    tx::{Input, InputSource, Output, OutputTarget, Transaction},
    types::AccountKind,
    unbonding::{Destination, Payout, UnbondingEntry},
    voting::ChainContext,
};
use tracing::{debug, info, warn};

/// Staking state machine
#[derive(Debug)]
pub struct Staking {
    /// Configuration
    config: Config,

    /// Account handlers for every ledger
    accounts: Accounts,

    /// Metrics
    metrics: Metrics,
}

impl Staking {
    /// Create dispatcher with the built-in account handlers
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            accounts: Accounts::with_defaults(),
            metrics: Metrics::new()?,
        })
    }

    /// Register (or replace) the handler for an account kind
    pub fn with_handler(mut self, kind: AccountKind, handler: impl AccountHandler + 'static) -> Self {
        self.accounts.register(kind, handler);
        self
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get account handler registry
    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Get metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Apply one input
    ///
    /// Unbonded inputs are a plain ledger debit. Bonded inputs debit the
    /// delegator's shares, drop voting power, and require the transaction to
    /// carry the matching unbond output.
    pub fn on_input(
        &self,
        input: &Input,
        tx: &Transaction,
        state: &mut StakingState,
        chain: &mut ChainContext,
    ) -> TxResult<()> {
        let sighash = tx
            .sighash()
            .map_err(|e| Rejection::Malformed(format!("Cannot compute signing hash: {}", e)))?;

        match &input.source {
            InputSource::Unbonded => {
                self.accounts
                    .debit(&mut state.unbonded, input, input.amount, &sighash)
            }
            InputSource::Bonded { validator } => {
                tx.require_output(&Output {
                    target: OutputTarget::Unbond {
                        validator: validator.clone(),
                    },
                    kind: input.kind,
                    address: input.address.clone(),
                    amount: input.amount,
                })?;

                state
                    .bonded
                    .initiate_unbond(validator, input, &sighash, &self.accounts, &mut chain.validators)
                    .map(|_| ())
            }
        }
    }

    /// Apply one output
    ///
    /// Bond outputs grow (or create) the validator's pool. Unbond outputs
    /// queue a payout of the equivalent shares at
    /// `height + unbonding_period`.
    pub fn on_output(
        &self,
        output: &Output,
        state: &mut StakingState,
        chain: &mut ChainContext,
    ) -> TxResult<()> {
        match &output.target {
            OutputTarget::Bond { validator } => state
                .bonded
                .bond(validator, output, &self.accounts, &mut chain.validators)
                .map(|_| ()),
            OutputTarget::Unbond { validator } => {
                let pool = state.bonded.get(validator)?;
                if !self.accounts.supports(output.kind) {
                    return Err(Rejection::UnknownAccountKind(output.kind));
                }

                let shares = shares::to_shares(output.amount, pool)
                    .ok_or(Rejection::Overflow("unbonded shares"))?;
                let maturity_height = chain
                    .height
                    .checked_add(self.config.unbonding_period)
                    .ok_or(Rejection::Overflow("maturity height"))?;

                state.unbonding.enqueue(UnbondingEntry {
                    maturity_height,
                    validator: validator.clone(),
                    shares,
                    destination: Destination {
                        kind: output.kind,
                        address: output.address.clone(),
                    },
                });
                Ok(())
            }
        }
    }

    /// End-of-block processing: pay out every matured unbond
    pub fn on_block(&self, state: &mut StakingState, chain: &ChainContext) -> Result<Vec<Payout>> {
        let StakingState {
            bonded,
            unbonding,
            unbonded,
        } = &mut *state;
        let payouts = unbonding.drain(chain.height, bonded, unbonded, &self.accounts)?;

        for payout in &payouts {
            self.metrics.record_payout(payout.coins);
        }
        self.metrics.update_queue_length(state.unbonding.len());

        if !payouts.is_empty() {
            info!(
                height = chain.height,
                matured = payouts.len(),
                pending = state.unbonding.len(),
                "processed unbonding queue"
            );
        }
        Ok(payouts)
    }

    /// Check, apply and commit a whole transaction
    ///
    /// Inputs then outputs run in place after a checkpoint of every
    /// entry the transaction can touch; on rejection the checkpoint is
    /// rolled back, leaving `state` and `chain` as they were.
    pub fn execute_transaction(
        &self,
        tx: &Transaction,
        state: &mut StakingState,
        chain: &mut ChainContext,
    ) -> TxResult<()> {
        let checkpoint = Checkpoint::capture(tx, state, chain);

        match self.apply_transaction(tx, state, chain) {
            Ok(()) => {
                let bonds = tx
                    .outputs
                    .iter()
                    .filter(|output| matches!(output.target, OutputTarget::Bond { .. }))
                    .count();
                let unbonds = tx
                    .inputs
                    .iter()
                    .filter(|input| matches!(input.source, InputSource::Bonded { .. }))
                    .count();
                self.metrics.record_committed(bonds as u64, unbonds as u64);
                self.metrics.update_queue_length(state.unbonding.len());

                debug!(
                    height = chain.height,
                    inputs = tx.inputs.len(),
                    outputs = tx.outputs.len(),
                    "transaction committed"
                );
                Ok(())
            }
            Err(rejection) => {
                checkpoint.rollback(state, chain);
                self.metrics.record_rejected();
                warn!(
                    height = chain.height,
                    code = rejection.code(),
                    "transaction rejected: {}",
                    rejection
                );
                Err(rejection)
            }
        }
    }

    fn apply_transaction(
        &self,
        tx: &Transaction,
        state: &mut StakingState,
        chain: &mut ChainContext,
    ) -> TxResult<()> {
        tx.validate_basic()?;

        for input in &tx.inputs {
            self.on_input(input, tx, state, chain)?;
        }
        for output in &tx.outputs {
            self.on_output(output, state, chain)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accounts::tests::AllowAll,
        types::{Address, ValidatorId},
    };

    const PERIOD: u64 = 100;

    fn staking() -> Staking {
        let config = Config {
            unbonding_period: PERIOD,
            ..Config::default()
        };
        Staking::new(config)
            .unwrap()
            .with_handler(AccountKind::Ed25519, AllowAll)
    }

    fn validator() -> ValidatorId {
        ValidatorId::new("V")
    }

    fn alice() -> Address {
        Address::new("alice")
    }

    fn bond_tx(amount: u64, sequence: u64) -> Transaction {
        Transaction {
            inputs: vec![Input {
                source: InputSource::Unbonded,
                kind: AccountKind::Ed25519,
                address: alice(),
                amount,
                sequence,
                pubkey: vec![],
                signature: vec![],
            }],
            outputs: vec![Output {
                target: OutputTarget::Bond {
                    validator: validator(),
                },
                kind: AccountKind::Ed25519,
                address: alice(),
                amount,
            }],
        }
    }

    fn unbond_tx(amount: u64, sequence: u64) -> Transaction {
        Transaction {
            inputs: vec![Input {
                source: InputSource::Bonded {
                    validator: validator(),
                },
                kind: AccountKind::Ed25519,
                address: alice(),
                amount,
                sequence,
                pubkey: vec![],
                signature: vec![],
            }],
            outputs: vec![Output {
                target: OutputTarget::Unbond {
                    validator: validator(),
                },
                kind: AccountKind::Ed25519,
                address: alice(),
                amount,
            }],
        }
    }

    #[test]
    fn test_bond_unbond_mature_scenario() {
        let staking = staking();
        let mut state = StakingState::from_genesis([(alice(), 1_000_000)]).unwrap();
        let mut chain = ChainContext::new(10);

        staking
            .execute_transaction(&bond_tx(1_000_000, 0), &mut state, &mut chain)
            .unwrap();
        let pool = state.bonded.get(&validator()).unwrap();
        assert_eq!((pool.balance, pool.shares), (1_000_000, 1_000_000));
        assert_eq!(chain.validators.get(&validator()), 1_000_000);
        assert_eq!(state.unbonded.balance(&alice()), 0);

        staking
            .execute_transaction(&unbond_tx(400_000, 0), &mut state, &mut chain)
            .unwrap();
        let pool = state.bonded.get(&validator()).unwrap();
        assert_eq!(pool.delegators.balance(&alice()), 600_000);
        assert_eq!((pool.balance, pool.shares), (1_000_000, 1_000_000));
        assert_eq!(chain.validators.get(&validator()), 600_000);
        assert_eq!(state.unbonding.len(), 1);
        let entry = state.unbonding.front().unwrap();
        assert_eq!(entry.shares, 400_000);
        assert_eq!(entry.maturity_height, 10 + PERIOD);

        chain.height = 10 + PERIOD - 1;
        assert!(staking.on_block(&mut state, &chain).unwrap().is_empty());

        chain.height = 10 + PERIOD;
        let payouts = staking.on_block(&mut state, &chain).unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].coins, 400_000);

        let pool = state.bonded.get(&validator()).unwrap();
        assert_eq!((pool.balance, pool.shares), (600_000, 600_000));
        assert_eq!(state.unbonded.balance(&alice()), 400_000);
        assert!(state.unbonding.is_empty());
        assert_eq!(staking.metrics().unbonds_matured_total.get(), 1);
    }

    #[test]
    fn test_bonded_input_without_unbond_output_is_rejected() {
        let staking = staking();
        let mut state = StakingState::from_genesis([(alice(), 100)]).unwrap();
        let mut chain = ChainContext::new(1);
        staking
            .execute_transaction(&bond_tx(100, 0), &mut state, &mut chain)
            .unwrap();

        let tx = unbond_tx(50, 0);
        let mut other = tx.clone();
        other.outputs[0].amount = 49;

        let err = staking
            .on_input(&other.inputs[0], &other, &mut state, &mut chain)
            .unwrap_err();
        assert!(matches!(err, Rejection::MissingRequiredOutput(_)));
        assert_eq!(chain.validators.get(&validator()), 100);
    }

    #[test]
    fn test_withdraw_from_unknown_validator() {
        let staking = staking();
        let mut state = StakingState::new();
        let mut chain = ChainContext::new(1);

        let err = staking
            .execute_transaction(&unbond_tx(5, 0), &mut state, &mut chain)
            .unwrap_err();
        assert_eq!(err, Rejection::UnknownValidator(validator()));
    }

    #[test]
    fn test_rejected_transaction_leaves_state_untouched() {
        let staking = staking();
        let mut state = StakingState::from_genesis([(alice(), 100)]).unwrap();
        let mut chain = ChainContext::new(1);

        // second output bonds to an account kind with no handler
        let mut tx = bond_tx(100, 0);
        tx.outputs[0].amount = 60;
        tx.outputs.push(Output {
            target: OutputTarget::Bond {
                validator: ValidatorId::new("W"),
            },
            kind: AccountKind::Multisig,
            address: alice(),
            amount: 40,
        });

        let before_state = state.clone();
        let before_chain = chain.clone();
        let err = staking
            .execute_transaction(&tx, &mut state, &mut chain)
            .unwrap_err();

        assert_eq!(err, Rejection::UnknownAccountKind(AccountKind::Multisig));
        assert_eq!(state, before_state);
        assert_eq!(chain, before_chain);
        assert_eq!(staking.metrics().rejected_total.get(), 1);
    }

    #[test]
    fn test_rejection_after_enqueue_rolls_back_everything() {
        let staking = staking();
        let mut state = StakingState::from_genesis([(alice(), 100)]).unwrap();
        let mut chain = ChainContext::new(1);
        staking
            .execute_transaction(&bond_tx(60, 0), &mut state, &mut chain)
            .unwrap();

        // bonded withdrawal and unbonded spend both succeed, the unbond is
        // queued, then the last output fails
        let mut tx = unbond_tx(50, 0);
        tx.inputs.push(Input {
            source: InputSource::Unbonded,
            kind: AccountKind::Ed25519,
            address: alice(),
            amount: 40,
            sequence: 1,
            pubkey: vec![],
            signature: vec![],
        });
        tx.outputs.push(Output {
            target: OutputTarget::Bond {
                validator: ValidatorId::new("W"),
            },
            kind: AccountKind::Multisig,
            address: alice(),
            amount: 40,
        });

        let before_state = state.clone();
        let before_chain = chain.clone();
        let err = staking
            .execute_transaction(&tx, &mut state, &mut chain)
            .unwrap_err();

        assert_eq!(err, Rejection::UnknownAccountKind(AccountKind::Multisig));
        assert_eq!(state, before_state);
        assert_eq!(chain, before_chain);
        assert!(state.unbonding.is_empty());
        assert_eq!(chain.validators.get(&validator()), 60);
    }

    #[test]
    fn test_unbond_output_for_unknown_validator() {
        let staking = staking();
        let mut state = StakingState::new();
        let mut chain = ChainContext::new(1);
        let tx = unbond_tx(5, 0);

        let err = staking
            .on_output(&tx.outputs[0], &mut state, &mut chain)
            .unwrap_err();
        assert_eq!(err.code(), 2);
        assert!(state.unbonding.is_empty());
    }

    #[test]
    fn test_maturity_height_overflow() {
        let staking = staking();
        let mut state = StakingState::from_genesis([(alice(), 10)]).unwrap();
        let mut chain = ChainContext::new(1);
        staking
            .execute_transaction(&bond_tx(10, 0), &mut state, &mut chain)
            .unwrap();

        chain.height = u64::MAX;
        let err = staking
            .execute_transaction(&unbond_tx(10, 0), &mut state, &mut chain)
            .unwrap_err();
        assert_eq!(err, Rejection::Overflow("maturity height"));
    }

    #[test]
    fn test_zero_unbonding_period_rejected() {
        let config = Config {
            unbonding_period: 0,
            ..Config::default()
        };
        assert!(Staking::new(config).is_err());
    }
}
