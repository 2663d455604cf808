use serde::{Deserialize, Serialize};
use std::fmt;

/// Raffle lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaffleState {
    /// Accepting entries and settlement triggers
    #[default]
    Open,
    /// Entry closed, waiting for the oracle to deliver randomness
    Settling,
}

impl fmt::Display for RaffleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaffleState::Open => write!(f, "open"),
            RaffleState::Settling => write!(f, "settling"),
        }
    }
}

/// Guarded {Open, Settling} state machine.
///
/// There is no timeout path back to `Open`: a round whose fulfillment never
/// arrives stays in `Settling` until someone intervenes outside the system.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lifecycle {
    state: RaffleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RaffleState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == RaffleState::Open
    }

    /// Open -> Settling as one check-then-set step. Returns the current
    /// state as the error when the raffle is not open.
    pub fn begin_settlement(&mut self) -> Result<(), RaffleState> {
        match self.state {
            RaffleState::Open => {
                self.state = RaffleState::Settling;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Settling -> Open. Returns the current state as the error when no
    /// settlement is in progress.
    pub fn reopen(&mut self) -> Result<(), RaffleState> {
        match self.state {
            RaffleState::Settling => {
                self.state = RaffleState::Open;
                Ok(())
            }
            other => Err(other),
        }
    }
}
