use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::{AccountId, Amount, StakePosition, StakingLedger};

/// Serializable image of the full ledger state at one instant.
///
/// The `state_root` commits to every field an observer can act on: two
/// ledgers with the same snapshot contents always produce the same root, so
/// replaying the same operation sequence can be checked cheaply.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub owner: Option<AccountId>,
    pub paused: bool,
    pub reward_rate: u64,
    pub total_staked: Amount,
    pub contract_balance: Amount,
    pub reward_per_token_stored: u128,
    pub last_update_time: u64,
    pub positions: BTreeMap<AccountId, StakePosition>,
    pub state_root: [u8; 32],
}

impl StakingLedger {
    /// Captures the current state, including a sha256 merkle root over the
    /// global header and every position.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            owner: self.owner.clone(),
            paused: self.paused,
            reward_rate: self.reward_rate,
            total_staked: self.total_staked,
            contract_balance: self.contract_balance,
            reward_per_token_stored: self.reward_per_token_stored,
            last_update_time: self.last_update_time,
            positions: self.positions.clone(),
            state_root: compute_state_root(self),
        }
    }
}

fn compute_state_root(ledger: &StakingLedger) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(ledger.positions.len() + 1);

    let mut hasher = Sha256::new();
    hasher.update(b"global");
    match &ledger.owner {
        Some(owner) => {
            hasher.update([1u8]);
            hasher.update(owner.as_bytes());
        }
        None => hasher.update([0u8]),
    }
    hasher.update([ledger.paused as u8]);
    hasher.update(ledger.reward_rate.to_le_bytes());
    hasher.update(ledger.total_staked.to_le_bytes());
    hasher.update(ledger.contract_balance.to_le_bytes());
    hasher.update(ledger.reward_per_token_stored.to_le_bytes());
    hasher.update(ledger.last_update_time.to_le_bytes());
    leaves.push(hasher.finalize().into());

    for (account, position) in &ledger.positions {
        let mut hasher = Sha256::new();
        hasher.update(b"pos");
        hasher.update(account.as_bytes());
        hasher.update(position.amount.to_le_bytes());
        hasher.update(position.staked_at.to_le_bytes());
        hasher.update(position.reward_checkpoint.to_le_bytes());
        hasher.update(position.pending_reward.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }

    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"stake-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
