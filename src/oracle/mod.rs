//! Randomness oracle implementations

pub mod coordinator;
pub mod vrf;

pub use coordinator::{Fulfillment, Subscription, VrfCoordinatorMock};
pub use vrf::{VrfEngine, VrfProof};
