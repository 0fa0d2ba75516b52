//! Transaction checkpoints
//!
//! Before a transaction runs, [`Checkpoint::capture`] records the pre-image of
//! every entry the transaction can touch: the unbonded accounts its unbonded
//! inputs debit, the totals and delegator accounts of every pool it names,
//! the voting power of those validators, and the unbonding queue length.
//! [`Checkpoint::rollback`] writes the pre-images back, so a rejected
//! transaction costs work proportional to its own size rather than to the
//! state's.

use crate::{
    accounts::Account,
    state::StakingState,
    tx::{InputSource, OutputTarget, Transaction},
    types::{Address, ValidatorId},
    voting::ChainContext,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Pre-image of one pool
#[derive(Debug)]
struct PoolImage {
    totals: Option<(u64, u64)>,
    delegators: Vec<(Address, Option<Account>)>,
    power: Option<u64>,
}

/// Pre-images of everything one transaction may mutate
#[derive(Debug)]
pub(crate) struct Checkpoint {
    unbonded: Vec<(Address, Option<Account>)>,
    pools: BTreeMap<ValidatorId, PoolImage>,
    queue_len: usize,
}

impl Checkpoint {
    /// Record pre-images for `tx` against the current state
    pub(crate) fn capture(tx: &Transaction, state: &StakingState, chain: &ChainContext) -> Self {
        let mut unbonded = Vec::new();
        let mut touched: BTreeMap<&ValidatorId, Vec<&Address>> = BTreeMap::new();

        for input in &tx.inputs {
            match &input.source {
                InputSource::Unbonded => unbonded.push((
                    input.address.clone(),
                    state.unbonded.get(&input.address).copied(),
                )),
                InputSource::Bonded { validator } => {
                    touched.entry(validator).or_default().push(&input.address)
                }
            }
        }
        for output in &tx.outputs {
            if let OutputTarget::Bond { validator } = &output.target {
                touched.entry(validator).or_default().push(&output.address);
            }
        }

        let pools = touched
            .into_iter()
            .map(|(validator, addresses)| {
                let image = PoolImage {
                    totals: state.bonded.totals(validator),
                    delegators: addresses
                        .into_iter()
                        .map(|address| {
                            (address.clone(), state.bonded.delegator(validator, address))
                        })
                        .collect(),
                    power: chain.validators.entry(validator),
                };
                (validator.clone(), image)
            })
            .collect();

        Self {
            unbonded,
            pools,
            queue_len: state.unbonding.len(),
        }
    }

    /// Write every pre-image back
    pub(crate) fn rollback(self, state: &mut StakingState, chain: &mut ChainContext) {
        state.unbonding.truncate(self.queue_len);

        for (address, account) in self.unbonded.into_iter().rev() {
            state.unbonded.restore(address, account);
        }
        for (validator, image) in self.pools {
            chain.validators.restore(validator.clone(), image.power);
            state.bonded.restore(&validator, image.totals, image.delegators);
        }

        debug!(queue_len = self.queue_len, "transaction rolled back");
    }
}
