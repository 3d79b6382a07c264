//! Cross-operation scenarios: interleaved participants, rate changes, and
//! the solvency/consistency invariants the ledger promises after every call.

use stake_ledger::{LedgerEvent, StakingError, StakingLedger, SECONDS_PER_YEAR};

const UNIT: u64 = 1_000_000_000;
const HALF_YEAR: u64 = SECONDS_PER_YEAR / 2;

fn funded_ledger() -> StakingLedger {
    let mut ledger = StakingLedger::new("owner", 0);
    ledger.deposit_rewards("owner", 10 * UNIT).unwrap();
    ledger
}

fn assert_invariants(ledger: &StakingLedger) {
    let snapshot = ledger.snapshot();
    let position_sum: u64 = snapshot.positions.values().map(|p| p.amount).sum();
    assert_eq!(snapshot.total_staked, position_sum);
    assert!(snapshot.contract_balance >= snapshot.total_staked);
}

#[test]
fn stake_then_immediate_unstake_is_a_clean_round_trip() {
    let mut ledger = funded_ledger();
    let balance_before = ledger.contract_balance();

    ledger.stake("alice", UNIT, 1_000).unwrap();
    let returned = ledger.unstake("alice", UNIT, 1_000).unwrap();

    assert_eq!(returned, UNIT);
    assert_eq!(ledger.total_staked(), 0);
    assert_eq!(ledger.staked_amount("alice"), 0);
    assert_eq!(ledger.contract_balance(), balance_before);
    assert_eq!(ledger.rewards("alice", 1_000).unwrap(), 0);
    assert_invariants(&ledger);
}

#[test]
fn two_stakers_accrue_independently() {
    let mut ledger = funded_ledger();

    ledger.stake("alice", UNIT, 0).unwrap();
    ledger.stake("bob", 2 * UNIT, HALF_YEAR).unwrap();

    // Alice: 1 unit for a full year at 12%. Bob: 2 units for half a year.
    // Bob joining midway must not dilute or inflate Alice's accrual.
    let alice = ledger.rewards("alice", SECONDS_PER_YEAR).unwrap();
    let bob = ledger.rewards("bob", SECONDS_PER_YEAR).unwrap();
    assert_eq!(alice, UNIT * 12 / 100);
    assert_eq!(bob, 2 * UNIT * 6 / 100);
    assert_invariants(&ledger);

    // Bob unstaking must not disturb Alice's already-accrued reward.
    ledger.unstake("bob", 2 * UNIT, SECONDS_PER_YEAR).unwrap();
    assert_eq!(ledger.rewards("alice", SECONDS_PER_YEAR).unwrap(), alice);
    assert_invariants(&ledger);
}

#[test]
fn rate_change_splits_accrual_at_the_boundary() {
    let mut ledger = funded_ledger();
    ledger.stake("alice", UNIT, 0).unwrap();

    ledger.set_reward_rate("owner", 24, HALF_YEAR).unwrap();

    // Reward earned before the switch stays priced at 12%.
    let reward = ledger.rewards("alice", SECONDS_PER_YEAR).unwrap();
    assert_eq!(reward, UNIT * 6 / 100 + UNIT * 12 / 100);

    let payout = ledger.claim_rewards("alice", SECONDS_PER_YEAR).unwrap();
    assert_eq!(payout, reward);
    assert_invariants(&ledger);
}

#[test]
fn interleaved_operations_keep_totals_consistent() {
    let mut ledger = funded_ledger();

    ledger.stake("alice", UNIT, 0).unwrap();
    assert_invariants(&ledger);
    ledger.stake("bob", 3 * UNIT, 1_000).unwrap();
    assert_invariants(&ledger);
    ledger.unstake("alice", UNIT / 2, HALF_YEAR).unwrap();
    assert_invariants(&ledger);
    ledger.set_reward_rate("owner", 30, HALF_YEAR + 1).unwrap();
    assert_invariants(&ledger);
    ledger.stake("alice", 2 * UNIT, HALF_YEAR + 2).unwrap();
    assert_invariants(&ledger);
    ledger.claim_rewards("bob", SECONDS_PER_YEAR).unwrap();
    assert_invariants(&ledger);
    ledger.unstake("bob", 3 * UNIT, SECONDS_PER_YEAR).unwrap();
    assert_invariants(&ledger);

    assert_eq!(
        ledger.total_staked(),
        UNIT / 2 + 2 * UNIT,
        "alice's remaining principal"
    );
}

#[test]
fn accumulator_and_clock_never_regress() {
    let mut ledger = funded_ledger();
    ledger.stake("alice", UNIT, 100).unwrap();

    let mut last_accumulator = 0u128;
    let mut last_time = 0u64;
    let times = [200u64, 150, 5_000, 4_999, HALF_YEAR, SECONDS_PER_YEAR];
    for (i, now) in times.into_iter().enumerate() {
        ledger.stake("alice", 1, now).unwrap();
        let snapshot = ledger.snapshot();
        assert!(
            snapshot.reward_per_token_stored >= last_accumulator,
            "accumulator regressed at step {i}"
        );
        assert!(
            snapshot.last_update_time >= last_time,
            "clock regressed at step {i}"
        );
        last_accumulator = snapshot.reward_per_token_stored;
        last_time = snapshot.last_update_time;
    }
}

#[test]
fn paused_ledger_rejects_all_participant_operations_identically() {
    let mut ledger = funded_ledger();
    ledger.stake("alice", UNIT, 0).unwrap();
    ledger.pause("owner").unwrap();

    assert_eq!(ledger.stake("bob", UNIT, 10), Err(StakingError::Paused));
    assert_eq!(ledger.unstake("alice", UNIT, 10), Err(StakingError::Paused));
    assert_eq!(
        ledger.claim_rewards("alice", SECONDS_PER_YEAR),
        Err(StakingError::Paused)
    );

    // Administrative operations stay available while paused.
    ledger.set_reward_rate("owner", 20, 10).unwrap();
    ledger.deposit_rewards("owner", UNIT).unwrap();
    assert_invariants(&ledger);
}

#[test]
fn claim_failure_due_to_underfunded_pool_is_retryable_after_funding() {
    let mut ledger = StakingLedger::new("owner", 0);
    ledger.stake("alice", UNIT, 0).unwrap();

    let err = ledger.claim_rewards("alice", SECONDS_PER_YEAR).unwrap_err();
    assert!(matches!(err, StakingError::InsufficientPoolFunds { .. }));

    // The external caller funds the pool and resubmits; the accrued amount
    // is unchanged because the failed claim mutated nothing.
    ledger.deposit_rewards("owner", UNIT).unwrap();
    let payout = ledger.claim_rewards("alice", SECONDS_PER_YEAR).unwrap();
    assert_eq!(payout, UNIT * 12 / 100);
    assert_invariants(&ledger);
}

#[test]
fn event_log_records_the_full_history_in_order() {
    let mut ledger = funded_ledger();
    ledger.stake("alice", UNIT, 0).unwrap();
    ledger.unstake("alice", UNIT / 2, 0).unwrap();
    ledger.pause("owner").unwrap();
    ledger.unpause("owner").unwrap();
    ledger.transfer_ownership("owner", "admin2").unwrap();

    let events = ledger.drain_events();
    assert_eq!(
        events,
        vec![
            LedgerEvent::RewardsDeposited {
                from: "owner".into(),
                amount: 10 * UNIT
            },
            LedgerEvent::Staked {
                who: "alice".into(),
                amount: UNIT
            },
            LedgerEvent::Unstaked {
                who: "alice".into(),
                amount: UNIT / 2
            },
            LedgerEvent::ContractPaused { paused: true },
            LedgerEvent::ContractPaused { paused: false },
            LedgerEvent::OwnershipTransferred {
                previous: Some("owner".into()),
                new: Some("admin2".into())
            },
        ]
    );
    assert!(ledger.events().is_empty());
}

#[test]
fn emergency_withdraw_keeps_every_staker_whole() {
    let mut ledger = funded_ledger();
    ledger.stake("alice", UNIT, 0).unwrap();
    ledger.stake("bob", 2 * UNIT, 0).unwrap();

    // Drain the entire reward surplus; principal must stay intact.
    ledger.emergency_withdraw("owner", 10 * UNIT).unwrap();
    assert_eq!(ledger.contract_balance(), ledger.total_staked());
    assert_invariants(&ledger);

    // Every participant can still redeem principal in full.
    assert_eq!(ledger.unstake("alice", UNIT, 0).unwrap(), UNIT);
    assert_eq!(ledger.unstake("bob", 2 * UNIT, 0).unwrap(), 2 * UNIT);
    assert_eq!(ledger.contract_balance(), 0);
}
