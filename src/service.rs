//! Shared raffle service
//!
//! One `Raffle` behind an async mutex. Every operation holds the lock for
//! its whole duration, so concurrent callers are serialized and each call
//! either commits all of its effects or none. Committed operations are
//! published on a broadcast channel.

use crate::errors::RaffleError;
use crate::metrics::RaffleMetrics;
use crate::payout::PayoutSink;
use crate::raffle::{
    PendingRequest, Raffle, RaffleEvent, RaffleSnapshot, RaffleState, RandomnessOracle, Settlement,
    UpkeepCheck,
};
use crate::types::{unix_now, Address, Amount, RandomWord, RequestId, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Source of "now" for the service
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock in unix seconds
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        unix_now()
    }
}

/// Manually driven clock for simulations and tests
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct RaffleService {
    raffle: Mutex<Raffle>,
    oracle: Arc<dyn RandomnessOracle>,
    payout: Arc<dyn PayoutSink>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<RaffleEvent>,
    metrics: Arc<RaffleMetrics>,
}

impl RaffleService {
    pub fn new(
        raffle: Raffle,
        oracle: Arc<dyn RandomnessOracle>,
        payout: Arc<dyn PayoutSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            raffle: Mutex::new(raffle),
            oracle,
            payout,
            clock,
            events,
            metrics: Arc::new(RaffleMetrics::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaffleEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> &Arc<RaffleMetrics> {
        &self.metrics
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn publish(&self, event: RaffleEvent) {
        // No subscribers is not an error
        if self.events.send(event).is_err() {
            debug!("No event subscribers");
        }
    }

    pub async fn enter(&self, player: Address, paid: Amount) -> Result<RaffleEvent, RaffleError> {
        let mut raffle = self.raffle.lock().await;
        let result = raffle.enter(player, paid);
        self.metrics.record_entry(result.is_ok());
        let event = result?;
        self.publish(event.clone());
        Ok(event)
    }

    pub async fn check_upkeep(&self) -> UpkeepCheck {
        let now = self.clock.now();
        self.raffle.lock().await.check_upkeep(now)
    }

    pub async fn perform_upkeep(&self) -> Result<RaffleEvent, RaffleError> {
        let mut raffle = self.raffle.lock().await;
        let now = self.clock.now();
        let result = raffle.perform_upkeep(self.oracle.as_ref(), now);
        self.metrics.record_upkeep(result.is_ok());
        let event = result?;
        self.publish(event.clone());
        Ok(event)
    }

    pub async fn fulfill_random_words(
        &self,
        caller: &Address,
        request_id: RequestId,
        random_words: &[RandomWord],
    ) -> Result<Settlement, RaffleError> {
        let mut raffle = self.raffle.lock().await;
        let now = self.clock.now();
        let result = raffle.fulfill_random_words(caller, request_id, random_words, self.payout.as_ref(), now);
        self.metrics.record_fulfillment(result.is_ok());
        let settlement = result?;
        self.publish(settlement.event());
        Ok(settlement)
    }

    // Queries

    pub async fn snapshot(&self) -> RaffleSnapshot {
        self.raffle.lock().await.snapshot()
    }

    pub async fn state(&self) -> RaffleState {
        self.raffle.lock().await.state()
    }

    pub async fn participant_at(&self, index: usize) -> Result<Address, RaffleError> {
        self.raffle.lock().await.participant_at(index)
    }

    pub async fn outstanding_request(&self) -> Option<PendingRequest> {
        self.raffle.lock().await.outstanding_request()
    }

    /// Copy of the whole aggregate, for persistence
    pub async fn export(&self) -> Raffle {
        self.raffle.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeConfig, RaffleConfig};
    use crate::oracle::VrfCoordinatorMock;
    use crate::oracle::VrfEngine;
    use crate::payout::Treasury;

    struct Fixture {
        service: Arc<RaffleService>,
        coordinator: Arc<VrfCoordinatorMock>,
        clock: Arc<ManualClock>,
        treasury: Treasury,
        config: RaffleConfig,
    }

    fn fixture() -> Fixture {
        let config = NodeConfig::fast_local().raffle;
        let coordinator = Arc::new(VrfCoordinatorMock::new(
            config.oracle.coordinator,
            1,
            0,
            VrfEngine::new_random(),
        ));
        let sub = coordinator.create_subscription();
        coordinator.fund_subscription(&sub, 1_000).unwrap();
        coordinator.add_consumer(&sub, config.address).unwrap();

        let clock = Arc::new(ManualClock::new(1_000));
        let treasury = Treasury::new();
        let raffle = Raffle::new(config.clone(), clock.now()).unwrap();
        let service = Arc::new(RaffleService::new(
            raffle,
            coordinator.clone(),
            Arc::new(treasury.clone()),
            clock.clone(),
        ));
        Fixture { service, coordinator, clock, treasury, config }
    }

    #[tokio::test]
    async fn test_full_round_publishes_events() {
        let f = fixture();
        let mut events = f.service.subscribe();
        let alice = Address::derive("alice");

        f.service.enter(alice, f.config.entrance_fee).await.unwrap();
        f.clock.advance(f.config.interval_secs);
        assert!(f.service.check_upkeep().await.upkeep_needed);

        let RaffleEvent::RequestedRaffleWinner { request_id, .. } = f.service.perform_upkeep().await.unwrap() else {
            panic!("Expected settlement request");
        };
        let fulfillment = f.coordinator.prepare_fulfillment(request_id).unwrap();
        let settlement = f
            .service
            .fulfill_random_words(&f.config.oracle.coordinator, request_id, &fulfillment.random_words)
            .await
            .unwrap();

        assert_eq!(settlement.winner, alice);
        assert_eq!(f.treasury.balance_of(&alice), f.config.entrance_fee);
        assert_eq!(f.service.state().await, RaffleState::Open);

        assert!(matches!(events.recv().await.unwrap(), RaffleEvent::RaffleEntered { .. }));
        assert!(matches!(events.recv().await.unwrap(), RaffleEvent::RequestedRaffleWinner { .. }));
        assert!(matches!(events.recv().await.unwrap(), RaffleEvent::WinnerPicked { round: 1, .. }));
        assert_eq!(f.service.metrics().settlements(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_triggers_settle_once() {
        let f = fixture();
        f.service.enter(Address::derive("alice"), f.config.entrance_fee).await.unwrap();
        f.clock.advance(f.config.interval_secs);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = f.service.clone();
                tokio::spawn(async move { service.perform_upkeep().await })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(f.coordinator.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_operations_publish_nothing() {
        let f = fixture();
        let mut events = f.service.subscribe();

        assert!(f.service.enter(Address::derive("alice"), 0).await.is_err());
        assert!(f.service.perform_upkeep().await.is_err());
        assert!(events.try_recv().is_err());
    }
}
