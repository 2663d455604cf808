//! Randomness request/fulfillment protocol
//!
//! The raffle never blocks on the oracle. A trigger submits a request and
//! records the returned id as the single outstanding request; the oracle
//! later delivers the random words in an independent call that must name
//! exactly that id.

use crate::errors::{OracleError, RaffleError};
use crate::types::{Address, KeyHash, RandomWord, RequestId, Timestamp};
use serde::{Deserialize, Serialize};

/// Parameters of one randomness request as submitted to the oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomWordsRequest {
    pub key_hash: KeyHash,
    pub subscription_id: String,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
    /// Consumer that the oracle will call back
    pub consumer: Address,
}

/// External randomness service
pub trait RandomnessOracle: Send + Sync {
    /// Submit a request and return its correlation id. Must not block on
    /// the random value itself.
    fn request_random_words(&self, request: &RandomWordsRequest) -> Result<RequestId, OracleError>;
}

/// Request currently awaiting fulfillment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub requested_at: Timestamp,
}

/// At most one in-flight request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestRegistry {
    outstanding: Option<PendingRequest>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outstanding(&self) -> Option<PendingRequest> {
        self.outstanding
    }

    /// Submit a request and record the returned id. Nothing is recorded if
    /// the oracle rejects the call.
    pub(crate) fn request(
        &mut self,
        oracle: &dyn RandomnessOracle,
        request: &RandomWordsRequest,
        now: Timestamp,
    ) -> Result<RequestId, RaffleError> {
        let request_id = oracle.request_random_words(request)?;
        self.outstanding = Some(PendingRequest {
            request_id,
            requested_at: now,
        });
        Ok(request_id)
    }

    /// Match an incoming fulfillment against the outstanding request and
    /// consume it. Only the first word is used for the draw.
    pub(crate) fn fulfill(
        &mut self,
        request_id: RequestId,
        random_words: &[RandomWord],
        expected_words: usize,
    ) -> Result<RandomWord, RaffleError> {
        let pending = match self.outstanding {
            Some(pending) if pending.request_id == request_id => pending,
            other => {
                return Err(RaffleError::UnknownRequest {
                    request_id,
                    outstanding: other.map(|p| p.request_id),
                })
            }
        };

        if random_words.len() != expected_words || random_words.is_empty() {
            return Err(RaffleError::MalformedFulfillment {
                expected: expected_words,
                received: random_words.len(),
            });
        }

        self.outstanding = None;
        tracing::debug!(
            request_id = %pending.request_id,
            requested_at = pending.requested_at,
            "Consumed outstanding randomness request"
        );
        Ok(random_words[0])
    }
}
