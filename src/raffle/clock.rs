use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Start time and sequence number of the current round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundClock {
    round_start: Timestamp,
    round: u64,
}

impl RoundClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            round_start: now,
            round: 1,
        }
    }

    pub fn round_start(&self) -> Timestamp {
        self.round_start
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    /// Seconds since the round began; zero if `now` is behind the start
    pub fn elapsed_since_start(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.round_start)
    }

    /// Begin the next round at `now`. The start never moves backwards.
    pub(crate) fn restart(&mut self, now: Timestamp) {
        self.round_start = self.round_start.max(now);
        self.round += 1;
    }
}
