use thiserror::Error;

use crate::engine::{AccountId, Amount};

/// Canonical error type surfaced by every ledger operation.
///
/// Each variant aborts the whole operation: a failed call leaves the ledger
/// state exactly as it was, including the reward accumulator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StakingError {
    #[error("amount must be greater than 0")]
    InvalidAmount,

    #[error("reward rate {rate} outside allowed range {min}..={max}")]
    InvalidRate { rate: u64, min: u64, max: u64 },

    #[error("insufficient staked amount: requested {requested}, staked {staked}")]
    InsufficientStake { requested: Amount, staked: Amount },

    #[error("no rewards available for {account}")]
    NoRewards { account: AccountId },

    #[error("caller {caller} is not the owner")]
    Unauthorized { caller: AccountId },

    #[error("new owner identity is empty")]
    InvalidOwner,

    #[error("ledger is paused")]
    Paused,

    #[error("ledger is not paused")]
    ExpectedPaused,

    #[error("ledger is already paused")]
    ExpectedUnpaused,

    #[error("reentrant call into a mutating operation")]
    ReentrantCall,

    #[error("pool cannot cover payout of {requested}: balance {balance}, staked principal {staked}")]
    InsufficientPoolFunds {
        requested: Amount,
        balance: Amount,
        staked: Amount,
    },

    #[error("withdrawal of {requested} would leave balance below staked principal {staked}")]
    WouldBreachPrincipal { requested: Amount, staked: Amount },

    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}
