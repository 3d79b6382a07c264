//! Deterministic staking ledger.
//!
//! The crate is built around one state machine and the plumbing an external
//! caller needs to drive and observe it:
//!
//! * [`engine`] — the [`StakingLedger`]: deposits, withdrawals, pooled
//!   reward-per-token accrual, administrative controls.
//! * [`event`] — the serialized event log observers consume.
//! * [`snapshot`] — serializable state images with a sha256 state root.
//!
//! Every operation is an atomic transition with an explicit caller identity
//! and an explicit clock, so a given operation sequence always replays to the
//! same state. The external transaction layer performs the actual value
//! transfers; the ledger only accounts for them and tells the caller how much
//! to move.

pub mod engine;
pub mod event;
pub mod snapshot;

mod error;

pub use engine::{
    AccountId, Amount, StakePosition, StakingLedger, DEFAULT_REWARD_RATE, MAX_REWARD_RATE,
    MIN_REWARD_RATE, PRECISION, SECONDS_PER_YEAR,
};
pub use error::StakingError;
pub use event::LedgerEvent;
pub use snapshot::LedgerSnapshot;
