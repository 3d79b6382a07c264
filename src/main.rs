use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use stake_ledger::{AccountId, Amount, LedgerEvent, LedgerSnapshot, StakingLedger};

/// Replay driver for the staking ledger.
///
/// The ledger itself is deterministic, so a JSON script of operations fully
/// determines the final state. `replay` applies a script to a fresh ledger
/// and prints the event log, the resulting snapshot, and its state root.
#[derive(Parser)]
#[command(name = "stake-ledger", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a JSON operation script to a fresh ledger.
    Replay {
        /// Path to the script file.
        script: PathBuf,
        /// Continue past failed operations instead of stopping.
        #[arg(long)]
        keep_going: bool,
        /// Pretty-print the JSON outcome.
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ReplayScript {
    owner: AccountId,
    #[serde(default)]
    created_at: u64,
    ops: Vec<ReplayOp>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ReplayOp {
    Stake { caller: AccountId, amount: Amount, at: u64 },
    Unstake { caller: AccountId, amount: Amount, at: u64 },
    ClaimRewards { caller: AccountId, at: u64 },
    SetRewardRate { caller: AccountId, rate: u64, at: u64 },
    DepositRewards { caller: AccountId, amount: Amount },
    EmergencyWithdraw { caller: AccountId, amount: Amount },
    Pause { caller: AccountId },
    Unpause { caller: AccountId },
    TransferOwnership { caller: AccountId, new_owner: AccountId },
    RenounceOwnership { caller: AccountId },
}

#[derive(Debug, Serialize)]
struct FailedOp {
    index: usize,
    error: String,
}

#[derive(Debug, Serialize)]
struct ReplayOutcome {
    applied: usize,
    failed: Vec<FailedOp>,
    events: Vec<LedgerEvent>,
    snapshot: LedgerSnapshot,
    state_root_hex: String,
}

fn apply_op(ledger: &mut StakingLedger, op: &ReplayOp) -> Result<(), stake_ledger::StakingError> {
    match op {
        ReplayOp::Stake { caller, amount, at } => ledger.stake(caller, *amount, *at),
        ReplayOp::Unstake { caller, amount, at } => {
            ledger.unstake(caller, *amount, *at).map(|_| ())
        }
        ReplayOp::ClaimRewards { caller, at } => ledger.claim_rewards(caller, *at).map(|_| ()),
        ReplayOp::SetRewardRate { caller, rate, at } => {
            ledger.set_reward_rate(caller, *rate, *at)
        }
        ReplayOp::DepositRewards { caller, amount } => ledger.deposit_rewards(caller, *amount),
        ReplayOp::EmergencyWithdraw { caller, amount } => {
            ledger.emergency_withdraw(caller, *amount).map(|_| ())
        }
        ReplayOp::Pause { caller } => ledger.pause(caller),
        ReplayOp::Unpause { caller } => ledger.unpause(caller),
        ReplayOp::TransferOwnership { caller, new_owner } => {
            ledger.transfer_ownership(caller, new_owner)
        }
        ReplayOp::RenounceOwnership { caller } => ledger.renounce_ownership(caller),
    }
}

fn replay(script_path: &PathBuf, keep_going: bool, pretty: bool) -> Result<ExitCode, String> {
    let raw = fs::read_to_string(script_path)
        .map_err(|e| format!("read {}: {e}", script_path.display()))?;
    let script: ReplayScript =
        serde_json::from_str(&raw).map_err(|e| format!("parse script: {e}"))?;

    let mut ledger = StakingLedger::new(script.owner, script.created_at);
    let mut applied = 0;
    let mut failed = Vec::new();
    for (index, op) in script.ops.iter().enumerate() {
        match apply_op(&mut ledger, op) {
            Ok(()) => applied += 1,
            Err(error) => {
                tracing::warn!(index, %error, "operation failed");
                failed.push(FailedOp {
                    index,
                    error: error.to_string(),
                });
                if !keep_going {
                    break;
                }
            }
        }
    }

    let events = ledger.drain_events();
    let snapshot = ledger.snapshot();
    let state_root_hex = hex::encode(snapshot.state_root);
    let outcome = ReplayOutcome {
        applied,
        failed,
        events,
        snapshot,
        state_root_hex,
    };
    let rendered = if pretty {
        serde_json::to_string_pretty(&outcome)
    } else {
        serde_json::to_string(&outcome)
    }
    .map_err(|e| format!("encode outcome: {e}"))?;
    println!("{rendered}");

    if outcome.failed.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Replay {
            script,
            keep_going,
            pretty,
        } => match replay(&script, keep_going, pretty) {
            Ok(code) => code,
            Err(message) => {
                eprintln!("error: {message}");
                ExitCode::from(2)
            }
        },
    }
}
