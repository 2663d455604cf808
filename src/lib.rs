//! Lucky Raffle - timed, pooled lottery settled by verifiable randomness
//!
//! Players enter an open round by paying at least the entrance fee. When the
//! round interval has elapsed and the pool is non-empty an automation caller
//! closes entry and asks a randomness oracle for a random word; the oracle's
//! later callback picks the winner (`word mod players`), pays out the whole
//! pool and opens the next round.
//!
//! The core lives in [`raffle`]. [`service`] serializes concurrent access,
//! [`keeper`] runs the automation and oracle relay tasks, [`api`] exposes
//! everything over HTTP and [`node`] wires it together against the local
//! coordinator in [`oracle`].

pub mod api;
pub mod config;
pub mod errors;
pub mod keeper;
pub mod metrics;
pub mod node;
pub mod oracle;
pub mod payout;
pub mod raffle;
pub mod service;
pub mod storage;
pub mod types;

pub use config::{ConfigLoader, NodeConfig, RaffleConfig};
pub use errors::{AppError, AppResult, RaffleError};
pub use raffle::{Raffle, RaffleEvent, RaffleSnapshot, RaffleState, Settlement};
pub use types::{Address, Amount, RandomWord, RequestId, Timestamp};
