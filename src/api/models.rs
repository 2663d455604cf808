//! API request and response models

use crate::oracle::VrfProof;
use crate::types::{Address, Amount, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub time: DateTime<Utc>,
}

/// POST /raffle/enter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterRequest {
    pub player: Address,
    /// Paid amount in wei, decimal string
    #[serde(with = "crate::types::amount_serde")]
    pub value: Amount,
}

/// POST /oracle/fulfill
///
/// Words are taken from the proofs, which must verify against the
/// coordinator's key for this request and this raffle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillRequest {
    pub request_id: RequestId,
    pub proofs: Vec<VrfProof>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerResponse {
    pub index: usize,
    pub player: Address,
}
