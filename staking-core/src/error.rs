//! Error types for the staking core
//!
//! Two families are kept apart:
//!
//! - [`Rejection`]: a transaction is refused. Permanent, carries a reason
//!   code, no state is mutated.
//! - [`Error`]: fatal or infrastructure failure. An
//!   [`Error::InvariantViolation`] raised during block processing must halt
//!   the block rather than be swallowed per transaction.

use crate::types::{AccountKind, Address, ValidatorId};
use thiserror::Error;

/// Result type for fatal/infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for transaction processing
pub type TxResult<T> = std::result::Result<T, Rejection>;

/// Fatal and infrastructure errors
#[derive(Error, Debug)]
pub enum Error {
    /// State is corrupt (missing pool at maturity, arithmetic underflow, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Binary serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a transaction is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Structurally invalid transaction
    #[error("Malformed transaction: {0}")]
    Malformed(String),

    /// Withdrawal from a validator that has never been bonded to
    #[error("No staking state for validator \"{0}\"")]
    UnknownValidator(ValidatorId),

    /// Bonded withdrawal without its paired unbond output
    #[error("Missing required output: {0}")]
    MissingRequiredOutput(String),

    /// Signature or key does not authorize the spend
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Account does not hold enough to cover the debit
    #[error("Insufficient balance for {address}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Debited account
        address: Address,
        /// Current balance
        available: u64,
        /// Requested debit
        requested: u64,
    },

    /// Sequence number does not match the account's next sequence
    #[error("Invalid sequence for {address}: expected {expected}, got {actual}")]
    InvalidSequence {
        /// Debited account
        address: Address,
        /// Account's current sequence
        expected: u64,
        /// Sequence carried by the input
        actual: u64,
    },

    /// No handler registered for the account kind
    #[error("Unknown account kind: {0}")]
    UnknownAccountKind(AccountKind),

    /// Inputs and outputs do not carry the same total
    #[error("Sum of inputs ({inputs}) does not match sum of outputs ({outputs})")]
    Unbalanced {
        /// Total of input amounts
        inputs: u64,
        /// Total of output amounts
        outputs: u64,
    },

    /// An amount, share count or height does not fit in 64 bits
    #[error("Arithmetic overflow: {0}")]
    Overflow(&'static str),

    /// Pool violates `shares == 0 ⇔ balance == 0`
    #[error("Pool for validator \"{0}\" is inconsistent")]
    InconsistentPool(ValidatorId),
}

impl Rejection {
    /// Stable reason code reported to the host (0 is success)
    pub fn code(&self) -> u32 {
        match self {
            Rejection::Malformed(_) => 1,
            Rejection::UnknownValidator(_) => 2,
            Rejection::MissingRequiredOutput(_) => 3,
            Rejection::Unauthorized(_) => 4,
            Rejection::InsufficientBalance { .. } => 5,
            Rejection::InvalidSequence { .. } => 6,
            Rejection::UnknownAccountKind(_) => 7,
            Rejection::Unbalanced { .. } => 8,
            Rejection::Overflow(_) => 9,
            Rejection::InconsistentPool(_) => 10,
        }
    }
}
