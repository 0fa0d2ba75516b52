//! Transactions: tagged inputs/outputs, wire parsing, and structural checks
//!
//! Inputs and outputs arrive on the wire as loosely-typed JSON records whose
//! role is selected by marker fields (`unbonded`/`bonded` on inputs,
//! `bond`/`unbond` on outputs). [`Transaction::from_json`] resolves those
//! markers exactly once into [`InputSource`] and [`OutputTarget`]; a record
//! with no marker, with both, or without the validator it needs is rejected
//! here and never reaches the dispatcher.

use crate::{
    crypto::hash_bytes,
    error::{Rejection, Result, TxResult},
    types::{AccountKind, Address, ValidatorId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pool an input spends from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    /// Spendable coin balance
    Unbonded,
    /// Delegated shares in a validator pool
    Bonded {
        /// Pool's validator
        validator: ValidatorId,
    },
}

/// Transaction input (a debit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Pool debited
    pub source: InputSource,

    /// Account kind (selects the authorizing handler)
    pub kind: AccountKind,

    /// Debited address
    pub address: Address,

    /// Amount in coins
    pub amount: u64,

    /// Expected account sequence in the debited ledger
    pub sequence: u64,

    /// Public key proving control of `address`
    pub pubkey: Vec<u8>,

    /// Signature over [`Transaction::sighash`]
    pub signature: Vec<u8>,
}

/// Destination of an output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTarget {
    /// Bond coins to a validator pool
    Bond {
        /// Pool's validator
        validator: ValidatorId,
    },
    /// Queue a bonded withdrawal for payout after the unbonding period
    Unbond {
        /// Pool's validator
        validator: ValidatorId,
    },
}

/// Transaction output (a credit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Where the value goes
    pub target: OutputTarget,

    /// Account kind of the recipient
    pub kind: AccountKind,

    /// Recipient address (delegator for bonds, payout address for unbonds)
    pub address: Address,

    /// Amount in coins
    pub amount: u64,
}

/// A staking transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Debits, processed first
    pub inputs: Vec<Input>,

    /// Credits, processed after every input succeeded
    pub outputs: Vec<Output>,
}

impl Transaction {
    /// Parse the JSON wire format
    pub fn from_json(bytes: &[u8]) -> TxResult<Self> {
        let raw: RawTransaction = serde_json::from_slice(bytes)
            .map_err(|e| Rejection::Malformed(format!("Invalid transaction JSON: {}", e)))?;
        raw.try_into()
    }

    /// Signing hash: SHA-256 of the encoding with all signatures cleared
    pub fn sighash(&self) -> Result<[u8; 32]> {
        let mut unsigned = self.clone();
        for input in &mut unsigned.inputs {
            input.signature.clear();
        }
        let bytes = bincode::serialize(&unsigned)?;
        Ok(hash_bytes(&bytes))
    }

    /// Sum of input amounts
    pub fn input_total(&self) -> TxResult<u64> {
        self.inputs.iter().try_fold(0u64, |total, input| {
            total
                .checked_add(input.amount)
                .ok_or(Rejection::Overflow("input total"))
        })
    }

    /// Sum of output amounts
    pub fn output_total(&self) -> TxResult<u64> {
        self.outputs.iter().try_fold(0u64, |total, output| {
            total
                .checked_add(output.amount)
                .ok_or(Rejection::Overflow("output total"))
        })
    }

    /// Structural checks that need no state
    ///
    /// - at least one input and one output
    /// - every amount positive
    /// - inputs and outputs carry the same total
    /// - unbond outputs and bonded inputs pair up one-to-one
    pub fn validate_basic(&self) -> TxResult<()> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(Rejection::Malformed(
                "Transaction must have inputs and outputs".to_string(),
            ));
        }

        if self.inputs.iter().any(|input| input.amount == 0)
            || self.outputs.iter().any(|output| output.amount == 0)
        {
            return Err(Rejection::Malformed("Amounts must be positive".to_string()));
        }

        let inputs = self.input_total()?;
        let outputs = self.output_total()?;
        if inputs != outputs {
            return Err(Rejection::Unbalanced { inputs, outputs });
        }

        self.check_unbond_pairing()
    }

    /// Require an output identical to `expected`
    pub fn require_output(&self, expected: &Output) -> TxResult<()> {
        if self.outputs.contains(expected) {
            Ok(())
        } else {
            Err(Rejection::MissingRequiredOutput(format!(
                "{} output of {} to {}",
                expected.target.label(),
                expected.amount,
                expected.address
            )))
        }
    }

    /// Every unbond output must be backed by exactly one bonded input
    fn check_unbond_pairing(&self) -> TxResult<()> {
        let mut balance: BTreeMap<UnbondKey<'_>, i64> = BTreeMap::new();

        for input in &self.inputs {
            if let InputSource::Bonded { validator } = &input.source {
                *balance
                    .entry((validator, input.kind, &input.address, input.amount))
                    .or_default() += 1;
            }
        }
        for output in &self.outputs {
            if let OutputTarget::Unbond { validator } = &output.target {
                *balance
                    .entry((validator, output.kind, &output.address, output.amount))
                    .or_default() -= 1;
            }
        }

        match balance.into_iter().find(|(_, count)| *count != 0) {
            None => Ok(()),
            Some(((validator, _, address, amount), count)) if count > 0 => {
                Err(Rejection::MissingRequiredOutput(format!(
                    "unbond output of {} to {} from validator {}",
                    amount, address, validator
                )))
            }
            Some(((validator, _, address, amount), _)) => Err(Rejection::Malformed(format!(
                "unbond output of {} to {} from validator {} has no bonded input",
                amount, address, validator
            ))),
        }
    }
}

type UnbondKey<'a> = (&'a ValidatorId, AccountKind, &'a Address, u64);

impl OutputTarget {
    fn label(&self) -> &'static str {
        match self {
            OutputTarget::Bond { .. } => "bond",
            OutputTarget::Unbond { .. } => "unbond",
        }
    }
}

/// Wire transaction
#[derive(Debug, Deserialize)]
struct RawTransaction {
    #[serde(default)]
    inputs: Vec<RawInput>,
    #[serde(default)]
    outputs: Vec<RawOutput>,
}

/// Wire input, role selected by marker fields
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInput {
    #[serde(rename = "type")]
    kind: AccountKind,
    amount: u64,
    address: Address,
    #[serde(default)]
    sequence: u64,
    #[serde(default)]
    pubkey: String,
    #[serde(default)]
    signature: String,
    #[serde(default)]
    unbonded: bool,
    #[serde(default)]
    bonded: bool,
    validator_pubkey: Option<String>,
}

/// Wire output, role selected by marker fields
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOutput {
    #[serde(rename = "type")]
    kind: AccountKind,
    amount: u64,
    address: Address,
    #[serde(default)]
    bond: bool,
    #[serde(default)]
    unbond: bool,
    validator_pubkey: Option<String>,
}

impl TryFrom<RawTransaction> for Transaction {
    type Error = Rejection;

    fn try_from(raw: RawTransaction) -> TxResult<Self> {
        Ok(Self {
            inputs: raw
                .inputs
                .into_iter()
                .map(Input::try_from)
                .collect::<TxResult<_>>()?,
            outputs: raw
                .outputs
                .into_iter()
                .map(Output::try_from)
                .collect::<TxResult<_>>()?,
        })
    }
}

impl TryFrom<RawInput> for Input {
    type Error = Rejection;

    fn try_from(raw: RawInput) -> TxResult<Self> {
        let source = match (raw.unbonded, raw.bonded, raw.validator_pubkey) {
            (true, false, _) => InputSource::Unbonded,
            (false, true, Some(validator)) => InputSource::Bonded {
                validator: ValidatorId::new(validator),
            },
            (false, true, None) => {
                return Err(Rejection::Malformed(
                    "Bonded input requires validatorPubkey".to_string(),
                ))
            }
            (true, true, _) => {
                return Err(Rejection::Malformed(
                    "Input cannot withdraw from both bonded and unbonded accounts".to_string(),
                ))
            }
            (false, false, _) => {
                return Err(Rejection::Malformed(
                    "Must withdraw from bonded or unbonded accounts".to_string(),
                ))
            }
        };

        Ok(Self {
            source,
            kind: raw.kind,
            address: raw.address,
            amount: raw.amount,
            sequence: raw.sequence,
            pubkey: decode_hex("pubkey", &raw.pubkey)?,
            signature: decode_hex("signature", &raw.signature)?,
        })
    }
}

impl TryFrom<RawOutput> for Output {
    type Error = Rejection;

    fn try_from(raw: RawOutput) -> TxResult<Self> {
        let validator = raw.validator_pubkey.map(ValidatorId::new);
        let target = match (raw.unbond, raw.bond, validator) {
            (true, false, Some(validator)) => OutputTarget::Unbond { validator },
            (false, true, Some(validator)) => OutputTarget::Bond { validator },
            (true, false, None) | (false, true, None) => {
                return Err(Rejection::Malformed(
                    "Bond and unbond outputs require validatorPubkey".to_string(),
                ))
            }
            (true, true, _) => {
                return Err(Rejection::Malformed(
                    "Output cannot both bond and unbond".to_string(),
                ))
            }
            (false, false, _) => {
                return Err(Rejection::Malformed(
                    "Must bond or pay to unbond queue".to_string(),
                ))
            }
        };

        Ok(Self {
            target,
            kind: raw.kind,
            address: raw.address,
            amount: raw.amount,
        })
    }
}

fn decode_hex(field: &str, value: &str) -> TxResult<Vec<u8>> {
    hex::decode(value).map_err(|e| Rejection::Malformed(format!("Invalid {} hex: {}", field, e)))
}
