use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StakingError;
use crate::event::LedgerEvent;

pub type AccountId = String;
pub type Amount = u64;

/// Fixed-point scale of the reward-per-token accumulator.
pub const PRECISION: u128 = 1_000_000_000_000_000_000;
/// Denominator for annual rates expressed in whole percents.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;
/// Lowest accepted annual reward rate, in percent.
pub const MIN_REWARD_RATE: u64 = 1;
/// Highest accepted annual reward rate, in percent.
pub const MAX_REWARD_RATE: u64 = 50;
/// Rate a freshly created ledger starts with.
pub const DEFAULT_REWARD_RATE: u64 = 12;

/// Per-participant staking record.
///
/// Created lazily on the first non-zero deposit and dropped from the ledger
/// once both `amount` and `pending_reward` return to zero.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StakePosition {
    /// Currently staked principal.
    pub amount: Amount,
    /// Time of the most recent deposit (informational).
    pub staked_at: u64,
    /// Accumulator value at the last settlement; rewards are only ever
    /// computed against growth past this checkpoint.
    pub reward_checkpoint: u128,
    /// Settled, claimable reward balance.
    pub pending_reward: Amount,
}

/// Deterministic staking ledger.
///
/// Owns all staking state and exposes the operations an external
/// transaction-submission layer drives. Every operation is an atomic state
/// transition: it either completes fully or fails with a [`StakingError`]
/// leaving the ledger untouched, including the reward accumulator. Time is a
/// caller-supplied `now` so that replaying the same operation sequence always
/// produces the same state.
///
/// Reward accrual uses a pooled reward-per-token accumulator: on every
/// settlement the global accumulator advances by
/// `rate * elapsed * PRECISION / (100 * SECONDS_PER_YEAR)` (truncating, so
/// rounding always favors the pool), and a participant's newly earned reward
/// is `amount * (accumulator - checkpoint) / PRECISION`. Per-call cost is
/// O(1) in the number of participants.
#[derive(Debug)]
pub struct StakingLedger {
    pub(crate) owner: Option<AccountId>,
    pub(crate) paused: bool,
    pub(crate) total_staked: Amount,
    pub(crate) reward_rate: u64,
    pub(crate) reward_per_token_stored: u128,
    pub(crate) last_update_time: u64,
    pub(crate) contract_balance: Amount,
    pub(crate) positions: BTreeMap<AccountId, StakePosition>,
    events: Vec<LedgerEvent>,
    locked: bool,
}

/// Precomputed outcome of settling one participant at a given instant.
///
/// Previewing is pure; committing writes the values back without any further
/// fallible step, which is what keeps failed operations free of partial
/// mutation.
struct Settlement {
    reward_per_token: u128,
    /// `pending_reward` after folding in newly accrued reward.
    pending: Amount,
}

impl StakingLedger {
    /// Creates an empty ledger owned by `owner`, accruing from `created_at`
    /// at [`DEFAULT_REWARD_RATE`].
    pub fn new(owner: impl Into<AccountId>, created_at: u64) -> Self {
        Self {
            owner: Some(owner.into()),
            paused: false,
            total_staked: 0,
            reward_rate: DEFAULT_REWARD_RATE,
            reward_per_token_stored: 0,
            last_update_time: created_at,
            contract_balance: 0,
            positions: BTreeMap::new(),
            events: Vec::new(),
            locked: false,
        }
    }

    // ── participant operations ──────────────────────────────────────────

    /// Deposits `amount` of principal for `caller`.
    pub fn stake(&mut self, caller: &str, amount: Amount, now: u64) -> Result<(), StakingError> {
        self.with_guard(|ledger| {
            ledger.ensure_not_paused()?;
            if amount == 0 {
                return Err(StakingError::InvalidAmount);
            }

            let settlement = ledger.preview_settlement(caller, now)?;
            let position = ledger.positions.get(caller);
            let new_amount = position
                .map(|p| p.amount)
                .unwrap_or(0)
                .checked_add(amount)
                .ok_or(StakingError::ArithmeticOverflow)?;
            let new_total = ledger
                .total_staked
                .checked_add(amount)
                .ok_or(StakingError::ArithmeticOverflow)?;
            let new_balance = ledger
                .contract_balance
                .checked_add(amount)
                .ok_or(StakingError::ArithmeticOverflow)?;

            ledger.commit_settlement(caller, now, &settlement);
            let position = ledger.positions.entry(caller.to_owned()).or_default();
            position.amount = new_amount;
            position.staked_at = now;
            position.reward_checkpoint = settlement.reward_per_token;
            ledger.total_staked = new_total;
            ledger.contract_balance = new_balance;

            debug!(caller, amount, total_staked = ledger.total_staked, "stake");
            ledger.events.push(LedgerEvent::Staked {
                who: caller.to_owned(),
                amount,
            });
            Ok(())
        })
    }

    /// Withdraws `amount` of principal for `caller`. Returns the amount the
    /// external caller must hand back to the participant.
    pub fn unstake(&mut self, caller: &str, amount: Amount, now: u64) -> Result<Amount, StakingError> {
        self.with_guard(|ledger| {
            ledger.ensure_not_paused()?;
            if amount == 0 {
                return Err(StakingError::InvalidAmount);
            }
            let staked = ledger.positions.get(caller).map(|p| p.amount).unwrap_or(0);
            if amount > staked {
                return Err(StakingError::InsufficientStake {
                    requested: amount,
                    staked,
                });
            }

            let settlement = ledger.preview_settlement(caller, now)?;
            let new_total = ledger
                .total_staked
                .checked_sub(amount)
                .ok_or(StakingError::ArithmeticOverflow)?;
            let new_balance = ledger
                .contract_balance
                .checked_sub(amount)
                .ok_or(StakingError::ArithmeticOverflow)?;

            ledger.commit_settlement(caller, now, &settlement);
            if let Some(position) = ledger.positions.get_mut(caller) {
                position.amount = staked - amount;
            }
            ledger.total_staked = new_total;
            ledger.contract_balance = new_balance;
            ledger.drop_position_if_empty(caller);

            debug!(caller, amount, total_staked = ledger.total_staked, "unstake");
            ledger.events.push(LedgerEvent::Unstaked {
                who: caller.to_owned(),
                amount,
            });
            Ok(amount)
        })
    }

    /// Pays out the full claimable reward balance of `caller`. Returns the
    /// amount the external caller must transfer out of the pool.
    pub fn claim_rewards(&mut self, caller: &str, now: u64) -> Result<Amount, StakingError> {
        self.with_guard(|ledger| {
            ledger.ensure_not_paused()?;

            let settlement = ledger.preview_settlement(caller, now)?;
            let payout = settlement.pending;
            if payout == 0 {
                return Err(StakingError::NoRewards {
                    account: caller.to_owned(),
                });
            }
            // A payout must never cut into staked principal.
            let new_balance = ledger
                .contract_balance
                .checked_sub(payout)
                .filter(|b| *b >= ledger.total_staked)
                .ok_or(StakingError::InsufficientPoolFunds {
                    requested: payout,
                    balance: ledger.contract_balance,
                    staked: ledger.total_staked,
                })?;

            ledger.commit_settlement(caller, now, &settlement);
            if let Some(position) = ledger.positions.get_mut(caller) {
                position.pending_reward = 0;
            }
            ledger.contract_balance = new_balance;
            ledger.drop_position_if_empty(caller);

            debug!(caller, payout, "claim rewards");
            ledger.events.push(LedgerEvent::RewardsClaimed {
                who: caller.to_owned(),
                amount: payout,
            });
            Ok(payout)
        })
    }

    // ── administrative operations ───────────────────────────────────────

    /// Switches the annual reward rate. Accrual up to `now` is settled at the
    /// old rate first, so the change is never retroactive.
    pub fn set_reward_rate(&mut self, caller: &str, new_rate: u64, now: u64) -> Result<(), StakingError> {
        self.with_guard(|ledger| {
            ledger.ensure_owner(caller)?;
            if !(MIN_REWARD_RATE..=MAX_REWARD_RATE).contains(&new_rate) {
                return Err(StakingError::InvalidRate {
                    rate: new_rate,
                    min: MIN_REWARD_RATE,
                    max: MAX_REWARD_RATE,
                });
            }

            let reward_per_token = ledger.reward_per_token_at(now)?;
            ledger.reward_per_token_stored = reward_per_token;
            ledger.advance_clock(now);
            ledger.reward_rate = new_rate;

            info!(caller, new_rate, "reward rate updated");
            ledger.events.push(LedgerEvent::RewardRateUpdated { new_rate });
            Ok(())
        })
    }

    /// Tops up the reward pool. Open to any caller; does not touch staked
    /// principal or any position.
    pub fn deposit_rewards(&mut self, caller: &str, amount: Amount) -> Result<(), StakingError> {
        self.with_guard(|ledger| {
            if amount == 0 {
                return Err(StakingError::InvalidAmount);
            }
            ledger.contract_balance = ledger
                .contract_balance
                .checked_add(amount)
                .ok_or(StakingError::ArithmeticOverflow)?;

            info!(caller, amount, balance = ledger.contract_balance, "rewards deposited");
            ledger.events.push(LedgerEvent::RewardsDeposited {
                from: caller.to_owned(),
                amount,
            });
            Ok(())
        })
    }

    /// Withdraws pool funds to the owner. Refuses to leave the balance below
    /// staked principal, which must stay redeemable in full.
    pub fn emergency_withdraw(&mut self, caller: &str, amount: Amount) -> Result<Amount, StakingError> {
        self.with_guard(|ledger| {
            ledger.ensure_owner(caller)?;
            if amount == 0 {
                return Err(StakingError::InvalidAmount);
            }
            let new_balance = ledger
                .contract_balance
                .checked_sub(amount)
                .filter(|b| *b >= ledger.total_staked)
                .ok_or(StakingError::WouldBreachPrincipal {
                    requested: amount,
                    staked: ledger.total_staked,
                })?;
            ledger.contract_balance = new_balance;

            info!(caller, amount, balance = ledger.contract_balance, "emergency withdraw");
            Ok(amount)
        })
    }

    /// Halts stake/unstake/claim. Pausing an already-paused ledger is an
    /// error, never a silent no-op.
    pub fn pause(&mut self, caller: &str) -> Result<(), StakingError> {
        self.with_guard(|ledger| {
            ledger.ensure_owner(caller)?;
            if ledger.paused {
                return Err(StakingError::ExpectedUnpaused);
            }
            ledger.paused = true;
            info!(caller, "ledger paused");
            ledger.events.push(LedgerEvent::ContractPaused { paused: true });
            Ok(())
        })
    }

    /// Lifts a pause. Unpausing a running ledger is an error.
    pub fn unpause(&mut self, caller: &str) -> Result<(), StakingError> {
        self.with_guard(|ledger| {
            ledger.ensure_owner(caller)?;
            if !ledger.paused {
                return Err(StakingError::ExpectedPaused);
            }
            ledger.paused = false;
            info!(caller, "ledger unpaused");
            ledger.events.push(LedgerEvent::ContractPaused { paused: false });
            Ok(())
        })
    }

    /// Hands ownership to `new_owner`.
    pub fn transfer_ownership(&mut self, caller: &str, new_owner: &str) -> Result<(), StakingError> {
        self.with_guard(|ledger| {
            ledger.ensure_owner(caller)?;
            if new_owner.is_empty() {
                return Err(StakingError::InvalidOwner);
            }
            let previous = ledger.owner.replace(new_owner.to_owned());

            info!(caller, new_owner, "ownership transferred");
            ledger.events.push(LedgerEvent::OwnershipTransferred {
                previous,
                new: Some(new_owner.to_owned()),
            });
            Ok(())
        })
    }

    /// Irreversibly gives up ownership, permanently disabling every
    /// administrative operation. Unlike a pause there is no way back.
    pub fn renounce_ownership(&mut self, caller: &str) -> Result<(), StakingError> {
        self.with_guard(|ledger| {
            ledger.ensure_owner(caller)?;
            let previous = ledger.owner.take();

            info!(caller, "ownership renounced");
            ledger.events.push(LedgerEvent::OwnershipTransferred {
                previous,
                new: None,
            });
            Ok(())
        })
    }

    // ── views ───────────────────────────────────────────────────────────

    /// Principal currently staked by `who`.
    pub fn staked_amount(&self, who: &str) -> Amount {
        self.positions.get(who).map(|p| p.amount).unwrap_or(0)
    }

    /// Claimable reward of `who` as of `now`: the settled balance plus
    /// accrual since the last checkpoint. Pure; mutates nothing.
    pub fn rewards(&self, who: &str, now: u64) -> Result<Amount, StakingError> {
        Ok(self.preview_settlement(who, now)?.pending)
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    pub fn reward_rate(&self) -> u64 {
        self.reward_rate
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pool funds currently held: staked principal plus reward funding.
    pub fn contract_balance(&self) -> Amount {
        self.contract_balance
    }

    /// Full position record of `who`, if any.
    pub fn position(&self, who: &str) -> Option<&StakePosition> {
        self.positions.get(who)
    }

    /// Events emitted so far, in execution order.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Removes and returns all emitted events.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // ── internals ───────────────────────────────────────────────────────

    /// Runs `f` under the reentrancy latch. A nested mutating call while the
    /// latch is held fails with `ReentrantCall`; the latch is released on
    /// every exit path, error or not.
    pub(crate) fn with_guard<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, StakingError>,
    ) -> Result<T, StakingError> {
        if self.locked {
            return Err(StakingError::ReentrantCall);
        }
        self.locked = true;
        let result = f(self);
        self.locked = false;
        result
    }

    fn ensure_not_paused(&self) -> Result<(), StakingError> {
        if self.paused {
            return Err(StakingError::Paused);
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: &str) -> Result<(), StakingError> {
        match self.owner.as_deref() {
            Some(owner) if owner == caller => Ok(()),
            _ => Err(StakingError::Unauthorized {
                caller: caller.to_owned(),
            }),
        }
    }

    /// Accumulator value as of `now`. While nothing is staked the accumulator
    /// holds still; the clock checkpoint is advanced separately so that idle
    /// periods are never retroactively credited.
    fn reward_per_token_at(&self, now: u64) -> Result<u128, StakingError> {
        if self.total_staked == 0 {
            return Ok(self.reward_per_token_stored);
        }
        let elapsed = now.saturating_sub(self.last_update_time);
        let accrued = (self.reward_rate as u128)
            .checked_mul(elapsed as u128)
            .and_then(|v| v.checked_mul(PRECISION))
            .ok_or(StakingError::ArithmeticOverflow)?
            / (100 * SECONDS_PER_YEAR as u128);
        self.reward_per_token_stored
            .checked_add(accrued)
            .ok_or(StakingError::ArithmeticOverflow)
    }

    fn preview_settlement(&self, who: &str, now: u64) -> Result<Settlement, StakingError> {
        let reward_per_token = self.reward_per_token_at(now)?;
        let pending = match self.positions.get(who) {
            Some(position) => {
                let delta = reward_per_token - position.reward_checkpoint;
                let earned = (position.amount as u128)
                    .checked_mul(delta)
                    .ok_or(StakingError::ArithmeticOverflow)?
                    / PRECISION;
                let earned =
                    Amount::try_from(earned).map_err(|_| StakingError::ArithmeticOverflow)?;
                position
                    .pending_reward
                    .checked_add(earned)
                    .ok_or(StakingError::ArithmeticOverflow)?
            }
            None => 0,
        };
        Ok(Settlement {
            reward_per_token,
            pending,
        })
    }

    /// Writes a previewed settlement back. Infallible: every checked
    /// computation already happened in the preview.
    fn commit_settlement(&mut self, who: &str, now: u64, settlement: &Settlement) {
        self.reward_per_token_stored = settlement.reward_per_token;
        self.advance_clock(now);
        if let Some(position) = self.positions.get_mut(who) {
            position.pending_reward = settlement.pending;
            position.reward_checkpoint = settlement.reward_per_token;
        }
    }

    /// Clock checkpoint is monotone: a caller clock running backwards accrues
    /// nothing and never regresses the checkpoint.
    fn advance_clock(&mut self, now: u64) {
        if now > self.last_update_time {
            self.last_update_time = now;
        }
    }

    fn drop_position_if_empty(&mut self, who: &str) {
        if let Some(position) = self.positions.get(who) {
            if position.amount == 0 && position.pending_reward == 0 {
                self.positions.remove(who);
            }
        }
    }
}
