//! Background automation
//!
//! `Keeper` plays the automation caller: it polls the readiness predicate
//! and triggers settlement when it holds. `OracleRelay` plays the oracle
//! node for the local coordinator: it mines blocks and delivers the random
//! words for requests whose confirmations are in. Neither retries inside
//! the core; a failed attempt is simply tried again on the next tick.

use crate::errors::RaffleError;
use crate::oracle::VrfCoordinatorMock;
use crate::service::RaffleService;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info, warn};

pub struct Keeper {
    service: Arc<RaffleService>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl Keeper {
    pub fn spawn(service: Arc<RaffleService>, poll_interval: Duration) -> Arc<Self> {
        let keeper = Arc::new(Self {
            service,
            poll_interval,
            running: Arc::new(AtomicBool::new(true)),
        });

        keeper.clone().spawn_task();
        keeper
    }

    fn spawn_task(self: Arc<Self>) {
        tokio::spawn(async move {
            info!(poll_ms = self.poll_interval.as_millis() as u64, "Keeper started");
            let mut tick = tokio::time::interval(self.poll_interval);

            while self.running.load(Ordering::SeqCst) {
                tick.tick().await;
                self.poll_once().await;
            }
            info!("Keeper stopped");
        });
    }

    /// One readiness check, and a trigger if it passes. Returns whether a
    /// settlement was requested.
    pub async fn poll_once(&self) -> bool {
        let check = self.service.check_upkeep().await;
        if !check.upkeep_needed {
            return false;
        }

        match self.service.perform_upkeep().await {
            Ok(event) => {
                debug!(?event, "Keeper triggered settlement");
                true
            }
            // Another caller won the race between check and trigger
            Err(RaffleError::UpkeepNotNeeded(_)) => false,
            Err(e) => {
                warn!(error = %e, "Keeper trigger failed");
                false
            }
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

pub struct OracleRelay {
    service: Arc<RaffleService>,
    coordinator: Arc<VrfCoordinatorMock>,
    block_time: Duration,
    running: Arc<AtomicBool>,
}

impl OracleRelay {
    pub fn spawn(
        service: Arc<RaffleService>,
        coordinator: Arc<VrfCoordinatorMock>,
        block_time: Duration,
    ) -> Arc<Self> {
        let relay = Arc::new(Self {
            service,
            coordinator,
            block_time,
            running: Arc::new(AtomicBool::new(true)),
        });

        relay.clone().spawn_task();
        relay
    }

    fn spawn_task(self: Arc<Self>) {
        tokio::spawn(async move {
            info!(block_ms = self.block_time.as_millis() as u64, "Oracle relay started");
            let mut tick = tokio::time::interval(self.block_time);

            while self.running.load(Ordering::SeqCst) {
                tick.tick().await;
                self.coordinator.advance_block();
                self.deliver_ready().await;
            }
            info!("Oracle relay stopped");
        });
    }

    /// Deliver every request whose confirmations are in. Returns how many
    /// were accepted by the raffle.
    pub async fn deliver_ready(&self) -> usize {
        let mut delivered = 0;
        for request_id in self.coordinator.ready_requests() {
            let fulfillment = match self.coordinator.prepare_fulfillment(request_id) {
                Ok(f) => f,
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Could not prepare fulfillment");
                    continue;
                }
            };

            let caller = self.coordinator.address();
            match self
                .service
                .fulfill_random_words(&caller, request_id, &fulfillment.random_words)
                .await
            {
                Ok(settlement) => {
                    if let Err(e) = self.coordinator.mark_fulfilled(request_id) {
                        warn!(request_id = %request_id, error = %e, "Could not mark request fulfilled");
                    }
                    info!(
                        request_id = %request_id,
                        winner = %settlement.winner,
                        round = settlement.round,
                        "Fulfillment delivered"
                    );
                    delivered += 1;
                }
                // Settled elsewhere or superseded; the raffle will never take it
                Err(RaffleError::UnknownRequest { outstanding, .. }) => {
                    self.coordinator.cancel(request_id);
                    debug!(request_id = %request_id, ?outstanding, "Dropped stale request");
                }
                // Stays queued and is delivered again on the next block
                Err(e) => warn!(request_id = %request_id, error = %e, "Fulfillment rejected"),
            }
        }
        delivered
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::oracle::VrfEngine;
    use crate::payout::Treasury;
    use crate::raffle::{Raffle, RaffleState};
    use crate::service::{Clock, ManualClock};
    use crate::types::{Address, RequestId};

    struct Fixture {
        service: Arc<RaffleService>,
        coordinator: Arc<VrfCoordinatorMock>,
        clock: Arc<ManualClock>,
        treasury: Treasury,
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

        let clock = Arc::new(ManualClock::new(500));
        let treasury = Treasury::new();
        let raffle = Raffle::new(config, clock.now()).unwrap();
        let service = Arc::new(RaffleService::new(
            raffle,
            coordinator.clone(),
            Arc::new(treasury.clone()),
            clock.clone(),
        ));
        Fixture { service, coordinator, clock, treasury }
    }

    fn keeper(service: &Arc<RaffleService>) -> Keeper {
        Keeper {
            service: service.clone(),
            poll_interval: Duration::from_millis(10),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    fn relay(f: &Fixture) -> OracleRelay {
        OracleRelay {
            service: f.service.clone(),
            coordinator: f.coordinator.clone(),
            block_time: Duration::from_millis(10),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    #[tokio::test]
    async fn test_keeper_waits_for_readiness() {
        let f = fixture();
        let keeper = keeper(&f.service);
        assert!(!keeper.poll_once().await);

        f.service.enter(Address::derive("alice"), 10_000_000_000_000_000).await.unwrap();
        assert!(!keeper.poll_once().await);

        f.clock.advance(1);
        assert!(keeper.poll_once().await);
        assert_eq!(f.service.state().await, RaffleState::Settling);
        assert!(!keeper.poll_once().await);
    }

    #[tokio::test]
    async fn test_relay_delivers_after_confirmations() {
        let f = fixture();
        let keeper = keeper(&f.service);
        let relay = relay(&f);
        let alice = Address::derive("alice");

        f.service.enter(alice, 10_000_000_000_000_000).await.unwrap();
        f.clock.advance(1);
        assert!(keeper.poll_once().await);

        assert_eq!(relay.deliver_ready().await, 0);
        f.coordinator.advance_block();
        assert_eq!(relay.deliver_ready().await, 1);

        assert_eq!(f.service.state().await, RaffleState::Open);
        assert_eq!(f.treasury.balance_of(&alice), 10_000_000_000_000_000);
        assert_eq!(f.coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_relay_redelivers_after_payout_failure() {
        let f = fixture();
        let keeper = keeper(&f.service);
        let relay = relay(&f);
        let alice = Address::derive("alice");

        f.service.enter(alice, 10_000_000_000_000_000).await.unwrap();
        f.clock.advance(1);
        keeper.poll_once().await;
        f.coordinator.advance_block();

        f.treasury.reject_payments_to(alice);
        assert_eq!(relay.deliver_ready().await, 0);
        assert_eq!(f.service.state().await, RaffleState::Settling);
        assert_eq!(f.coordinator.pending_count(), 1);

        f.treasury.accept_payments_to(&alice);
        assert_eq!(relay.deliver_ready().await, 1);
        assert_eq!(f.treasury.balance_of(&alice), 10_000_000_000_000_000);
    }

    #[tokio::test]
    async fn test_relay_drops_request_settled_elsewhere() {
        let f = fixture();
        let keeper = keeper(&f.service);
        let relay = relay(&f);
        let alice = Address::derive("alice");

        f.service.enter(alice, 10_000_000_000_000_000).await.unwrap();
        f.clock.advance(1);
        keeper.poll_once().await;
        f.coordinator.advance_block();

        let request_id = f.coordinator.ready_requests()[0];
        let fulfillment = f.coordinator.prepare_fulfillment(request_id).unwrap();
        f.service
            .fulfill_random_words(&f.coordinator.address(), request_id, &fulfillment.random_words)
            .await
            .unwrap();

        assert_eq!(relay.deliver_ready().await, 0);
        assert_eq!(f.coordinator.pending_count(), 0);
        assert_eq!(f.treasury.balance_of(&alice), 10_000_000_000_000_000);
    }

    #[tokio::test]
    async fn test_relay_drops_request_the_raffle_never_made() {
        let f = fixture();
        let relay = relay(&f);
        let raffle = f.service.export().await;
        f.coordinator.restore_request(RequestId(77), &raffle.random_words_request());
        f.coordinator.advance_block();

        assert_eq!(relay.deliver_ready().await, 0);
        assert_eq!(f.coordinator.pending_count(), 0);
        assert_eq!(f.service.state().await, RaffleState::Open);
    }

    #[tokio::test]
    async fn test_spawned_tasks_settle_a_round() {
        let f = fixture();
        let alice = Address::derive("alice");
        f.service.enter(alice, 10_000_000_000_000_000).await.unwrap();
        f.clock.advance(1);

        let mut events = f.service.subscribe();
        let keeper = Keeper::spawn(f.service.clone(), Duration::from_millis(10));
        let relay = OracleRelay::spawn(f.service.clone(), f.coordinator.clone(), Duration::from_millis(10));

        let picked = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(crate::raffle::RaffleEvent::WinnerPicked { winner, .. }) = events.recv().await {
                    return winner;
                }
            }
        })
        .await
        .unwrap();

        keeper.stop();
        relay.stop();
        assert_eq!(picked, alice);
    }
}
