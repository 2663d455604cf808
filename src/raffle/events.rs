use crate::types::{Address, Amount, RequestId, Timestamp};
use serde::{Deserialize, Serialize};

/// Notifications emitted after a raffle operation commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RaffleEvent {
    RaffleEntered {
        player: Address,
        #[serde(with = "crate::types::amount_serde")]
        value: Amount,
        round: u64,
    },
    RequestedRaffleWinner {
        request_id: RequestId,
        round: u64,
    },
    WinnerPicked {
        winner: Address,
        #[serde(with = "crate::types::amount_serde")]
        payout: Amount,
        round: u64,
    },
}

/// Receipt of a completed settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub round: u64,
    pub request_id: RequestId,
    pub winner: Address,
    pub winner_index: usize,
    #[serde(with = "crate::types::amount_serde")]
    pub payout: Amount,
    pub settled_at: Timestamp,
}

impl Settlement {
    pub fn event(&self) -> RaffleEvent {
        RaffleEvent::WinnerPicked {
            winner: self.winner,
            payout: self.payout,
            round: self.round,
        }
    }
}
