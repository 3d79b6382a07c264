use serde::{Deserialize, Serialize};

use crate::engine::{AccountId, Amount};

/// Observer-facing record of every successful state transition.
///
/// Events are appended to the ledger's log in execution order; indexers and
/// UIs consume them via [`crate::StakingLedger::events`] or
/// [`crate::StakingLedger::drain_events`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Staked {
        who: AccountId,
        amount: Amount,
    },
    Unstaked {
        who: AccountId,
        amount: Amount,
    },
    RewardsClaimed {
        who: AccountId,
        amount: Amount,
    },
    RewardRateUpdated {
        new_rate: u64,
    },
    RewardsDeposited {
        from: AccountId,
        amount: Amount,
    },
    ContractPaused {
        paused: bool,
    },
    OwnershipTransferred {
        previous: Option<AccountId>,
        new: Option<AccountId>,
    },
}
