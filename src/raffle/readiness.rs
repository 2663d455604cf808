use super::{clock::RoundClock, ledger::PoolLedger, lifecycle::Lifecycle};
use crate::errors::UpkeepDiagnostics;
use crate::types::Timestamp;
use serde::Serialize;

/// Result of polling the readiness predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpkeepCheck {
    pub upkeep_needed: bool,
    pub diagnostics: UpkeepDiagnostics,
}

/// Settlement may begin iff the raffle is open, the interval has elapsed,
/// and the pool has at least one participant and a non-zero balance.
pub fn evaluate(
    ledger: &PoolLedger,
    clock: &RoundClock,
    lifecycle: &Lifecycle,
    interval_secs: u64,
    now: Timestamp,
) -> UpkeepCheck {
    let elapsed_secs = clock.elapsed_since_start(now);

    let is_open = lifecycle.is_open();
    let time_passed = elapsed_secs >= interval_secs;
    let has_players = ledger.participant_count() > 0;
    let has_balance = ledger.current_balance() > 0;

    UpkeepCheck {
        upkeep_needed: is_open && time_passed && has_players && has_balance,
        diagnostics: UpkeepDiagnostics {
            balance: ledger.current_balance(),
            players: ledger.participant_count(),
            state: lifecycle.state(),
            elapsed_secs,
            interval_secs,
        },
    }
}
