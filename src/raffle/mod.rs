//! Raffle core
//!
//! Timed, pooled lottery: players join an open round by paying at least the
//! entrance fee; once the interval has passed and the pool is non-empty an
//! automation caller closes entry and requests randomness; the oracle
//! callback picks the winner, pays out the pool and opens the next round.

pub mod clock;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod randomness;
pub mod readiness;

pub use engine::{Raffle, RaffleSnapshot};
pub use events::{RaffleEvent, Settlement};
pub use lifecycle::RaffleState;
pub use randomness::{PendingRequest, RandomWordsRequest, RandomnessOracle};
pub use readiness::UpkeepCheck;
