//! DelTran Staking Core
//!
//! Proof-of-stake delegation state machine: moves value between the
//! unbonded ledger, per-validator bonded pools, and the unbonding queue.
//!
//! # Architecture
//!
//! - **Share Ledger**: Each validator pool issues shares against its bonded
//!   balance; delegators hold shares, not coins
//! - **Unbonding Queue**: FIFO of withdrawal requests, drained at end of block
//! - **Voting Power**: Kept in step with bonded stake for the consensus layer
//! - **Single Writer**: Every transition runs against one mutable snapshot
//!
//! # Invariants
//!
//! - Value conservation: bond, unbond and maturity never mint coins
//! - Floor rounding: every share/coin conversion rounds in favour of the pool
//! - `shares == 0 ⇔ balance == 0` for every consistent pool
//! - Deterministic replay: same transactions → same state root
//!
//! # Example
//!
//! ```no_run
//! use staking_core::{ChainContext, Config, Staking, StakingState, Transaction};
//!
//! fn main() -> anyhow::Result<()> {
//!     let staking = Staking::new(Config::default())?;
//!     let mut state = StakingState::new();
//!     let mut chain = ChainContext::new(1);
//!
//!     let tx = Transaction::from_json(br#"{"inputs":[],"outputs":[]}"#)?;
//!     if let Err(rejection) = staking.execute_transaction(&tx, &mut state, &mut chain) {
//!         println!("rejected ({}): {}", rejection.code(), rejection);
//!     }
//!
//!     chain.height += 1;
//!     staking.on_block(&mut state, &chain)?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod accounts;
mod checkpoint;
pub mod config;
pub mod crypto;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod shares;
pub mod staking;
pub mod state;
pub mod tx;
pub mod types;
pub mod unbonding;
pub mod voting;

// Re-exports
pub use accounts::{Account, AccountHandler, AccountLedger, Accounts};
pub use config::Config;
pub use crypto::{address_from_pubkey, Ed25519Handler, KeyPair};
pub use error::{Error, Rejection, Result, TxResult};
pub use pool::{Pool, PoolRegistry};
pub use staking::Staking;
pub use state::StakingState;
pub use tx::{Input, InputSource, Output, OutputTarget, Transaction};
pub use types::{AccountKind, Address, ValidatorId};
pub use unbonding::{Destination, Payout, UnbondingEntry, UnbondingQueue};
pub use voting::{ChainContext, VotingPowerTable};
