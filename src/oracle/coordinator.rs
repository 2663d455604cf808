//! Local VRF coordinator
//!
//! Stand-in for the on-chain coordinator used on local networks. Consumers
//! are registered on funded subscriptions; each request waits for its
//! confirmations (counted in locally advanced blocks) before it can be
//! fulfilled, and every fulfillment is charged to the subscription.

use super::vrf::{VrfEngine, VrfProof};
use crate::config::{MockOracleConfig, MAX_NUM_WORDS};
use crate::errors::OracleError;
use crate::raffle::randomness::{RandomWordsRequest, RandomnessOracle};
use crate::types::{Address, Amount, RandomWord, RequestId};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

/// Subscription view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: String,
    #[serde(with = "crate::types::amount_serde")]
    pub balance: Amount,
    pub request_count: u64,
    pub consumers: BTreeSet<Address>,
}

/// Request accepted by the coordinator and not yet fulfilled
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub request_id: RequestId,
    pub subscription_id: String,
    pub consumer: Address,
    pub num_words: u32,
    pub callback_gas_limit: u32,
    pub confirmations_remaining: u16,
    proofs: Option<Vec<VrfProof>>,
}

/// Words ready to be delivered to a consumer
#[derive(Debug, Clone)]
pub struct Fulfillment {
    pub request_id: RequestId,
    pub consumer: Address,
    pub random_words: Vec<RandomWord>,
    pub proofs: Vec<VrfProof>,
}

pub struct VrfCoordinatorMock {
    address: Address,
    base_fee: Amount,
    gas_price: Amount,
    engine: VrfEngine,
    subscriptions: DashMap<String, Subscription>,
    requests: DashMap<RequestId, QueuedRequest>,
    next_subscription: AtomicU64,
    next_request: AtomicU64,
    block: AtomicU64,
    paused: AtomicBool,
}

impl VrfCoordinatorMock {
    pub fn new(address: Address, base_fee: Amount, gas_price: Amount, engine: VrfEngine) -> Self {
        Self {
            address,
            base_fee,
            gas_price,
            engine,
            subscriptions: DashMap::new(),
            requests: DashMap::new(),
            next_subscription: AtomicU64::new(1),
            next_request: AtomicU64::new(1),
            block: AtomicU64::new(0),
            paused: AtomicBool::new(false),
        }
    }

    pub fn from_config(address: Address, config: &MockOracleConfig, engine: VrfEngine) -> Self {
        Self::new(address, config.base_fee, config.gas_price, engine)
    }

    /// Identity the coordinator uses when calling consumers back
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn engine(&self) -> &VrfEngine {
        &self.engine
    }

    pub fn create_subscription(&self) -> String {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst).to_string();
        self.subscriptions.insert(
            id.clone(),
            Subscription {
                id: id.clone(),
                balance: 0,
                request_count: 0,
                consumers: BTreeSet::new(),
            },
        );
        info!(subscription_id = %id, "Subscription created");
        id
    }

    pub fn fund_subscription(&self, subscription_id: &str, amount: Amount) -> Result<Amount, OracleError> {
        let mut sub = self
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| OracleError::InvalidSubscription(subscription_id.to_string()))?;
        sub.balance = sub.balance.saturating_add(amount);
        debug!(subscription_id, balance = %sub.balance, "Subscription funded");
        Ok(sub.balance)
    }

    pub fn add_consumer(&self, subscription_id: &str, consumer: Address) -> Result<(), OracleError> {
        let mut sub = self
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| OracleError::InvalidSubscription(subscription_id.to_string()))?;
        sub.consumers.insert(consumer);
        info!(subscription_id, consumer = %consumer, "Consumer added");
        Ok(())
    }

    pub fn subscription(&self, subscription_id: &str) -> Option<Subscription> {
        self.subscriptions.get(subscription_id).map(|s| s.clone())
    }

    /// While paused every new request is refused
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn block_number(&self) -> u64 {
        self.block.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }

    /// Mine one block: every queued request loses one outstanding confirmation
    pub fn advance_block(&self) -> u64 {
        for mut entry in self.requests.iter_mut() {
            entry.confirmations_remaining = entry.confirmations_remaining.saturating_sub(1);
        }
        self.block.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Requests with all confirmations in, oldest first
    pub fn ready_requests(&self) -> Vec<RequestId> {
        let mut ready: Vec<RequestId> = self
            .requests
            .iter()
            .filter(|r| r.confirmations_remaining == 0)
            .map(|r| r.request_id)
            .collect();
        ready.sort();
        ready
    }

    /// Produce the words for a request. Repeated calls return the same words.
    pub fn prepare_fulfillment(&self, request_id: RequestId) -> Result<Fulfillment, OracleError> {
        let mut request = self
            .requests
            .get_mut(&request_id)
            .ok_or(OracleError::InvalidRequest(request_id))?;

        let consumer = request.consumer;
        let num_words = request.num_words;
        let proofs = request
            .proofs
            .get_or_insert_with(|| self.engine.generate(request_id, &consumer, num_words))
            .clone();

        Ok(Fulfillment {
            request_id,
            consumer,
            random_words: proofs.iter().map(|p| p.word).collect(),
            proofs,
        })
    }

    /// Re-queue a request that was accepted before a restart. Later ids
    /// continue after it.
    pub fn restore_request(&self, request_id: RequestId, request: &RandomWordsRequest) {
        self.next_request.fetch_max(request_id.0 + 1, Ordering::SeqCst);
        self.requests.insert(
            request_id,
            QueuedRequest {
                request_id,
                subscription_id: request.subscription_id.clone(),
                consumer: request.consumer,
                num_words: request.num_words,
                callback_gas_limit: request.callback_gas_limit,
                confirmations_remaining: request.request_confirmations,
                proofs: None,
            },
        );
        info!(request_id = %request_id, "Pending request restored");
    }

    /// Drop a request the consumer will never accept, without charging.
    /// Returns whether it was queued.
    pub fn cancel(&self, request_id: RequestId) -> bool {
        let removed = self.requests.remove(&request_id).is_some();
        if removed {
            info!(request_id = %request_id, "Request cancelled");
        }
        removed
    }

    /// Drop a delivered request and charge its subscription. Returns the amount charged.
    pub fn mark_fulfilled(&self, request_id: RequestId) -> Result<Amount, OracleError> {
        let (_, request) = self
            .requests
            .remove(&request_id)
            .ok_or(OracleError::InvalidRequest(request_id))?;

        let cost = self
            .base_fee
            .saturating_add(self.gas_price.saturating_mul(request.callback_gas_limit as Amount));

        let charged = match self.subscriptions.get_mut(&request.subscription_id) {
            Some(mut sub) => {
                let charged = cost.min(sub.balance);
                sub.balance -= charged;
                charged
            }
            None => 0,
        };

        info!(
            request_id = %request_id,
            subscription_id = %request.subscription_id,
            charged = %charged,
            "Random words fulfilled"
        );
        Ok(charged)
    }
}

impl RandomnessOracle for VrfCoordinatorMock {
    fn request_random_words(&self, request: &RandomWordsRequest) -> Result<RequestId, OracleError> {
        if self.paused.load(Ordering::SeqCst) {
            return Err(OracleError::Unavailable("coordinator paused".to_string()));
        }
        if request.num_words > MAX_NUM_WORDS {
            return Err(OracleError::TooManyWords {
                requested: request.num_words,
                max: MAX_NUM_WORDS,
            });
        }

        let mut sub = self
            .subscriptions
            .get_mut(&request.subscription_id)
            .ok_or_else(|| OracleError::InvalidSubscription(request.subscription_id.clone()))?;
        if !sub.consumers.contains(&request.consumer) {
            return Err(OracleError::InvalidConsumer {
                subscription_id: request.subscription_id.clone(),
                consumer: request.consumer,
            });
        }
        if sub.balance < self.base_fee {
            return Err(OracleError::InsufficientBalance {
                subscription_id: request.subscription_id.clone(),
                balance: sub.balance,
                required: self.base_fee,
            });
        }
        sub.request_count += 1;
        drop(sub);

        let request_id = RequestId(self.next_request.fetch_add(1, Ordering::SeqCst));
        self.requests.insert(
            request_id,
            QueuedRequest {
                request_id,
                subscription_id: request.subscription_id.clone(),
                consumer: request.consumer,
                num_words: request.num_words,
                callback_gas_limit: request.callback_gas_limit,
                confirmations_remaining: request.request_confirmations,
                proofs: None,
            },
        );

        debug!(
            request_id = %request_id,
            consumer = %request.consumer,
            key_hash = %request.key_hash,
            confirmations = request.request_confirmations,
            "Random words requested"
        );
        Ok(request_id)
    }
}
