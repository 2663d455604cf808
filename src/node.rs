//! Local node assembly
//!
//! Wires a raffle to the local coordinator and an in-memory treasury the
//! same way the local deployment does: create and fund a subscription,
//! register the raffle as its consumer, then start accepting calls.

use crate::config::NodeConfig;
use crate::errors::{AppResult, ConfigurationError};
use crate::keeper::{Keeper, OracleRelay};
use crate::oracle::{VrfCoordinatorMock, VrfEngine};
use crate::payout::Treasury;
use crate::raffle::Raffle;
use crate::service::{Clock, RaffleService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct LocalNode {
    pub service: Arc<RaffleService>,
    pub coordinator: Arc<VrfCoordinatorMock>,
    pub treasury: Treasury,
}

/// Running background tasks of a node
pub struct NodeTasks {
    pub keeper: Option<Arc<Keeper>>,
    pub relay: Arc<OracleRelay>,
}

impl NodeTasks {
    pub fn stop(&self) {
        if let Some(keeper) = &self.keeper {
            keeper.stop();
        }
        self.relay.stop();
    }
}

impl LocalNode {
    /// Build a node, resuming `restored` when given
    pub fn build(
        config: &NodeConfig,
        restored: Option<Raffle>,
        clock: Arc<dyn Clock>,
        engine: VrfEngine,
    ) -> AppResult<Self> {
        let coordinator = Arc::new(VrfCoordinatorMock::from_config(
            config.raffle.oracle.coordinator,
            &config.mock_oracle,
            engine,
        ));
        let subscription_id = coordinator.create_subscription();
        coordinator.fund_subscription(&subscription_id, config.mock_oracle.fund_amount)?;

        let raffle = match restored {
            Some(raffle) => {
                if raffle.config().oracle.subscription_id != subscription_id {
                    return Err(ConfigurationError::InvalidValue {
                        field: "raffle.oracle.subscription_id".to_string(),
                        value: raffle.config().oracle.subscription_id.clone(),
                        reason: format!("local coordinator issued subscription {}", subscription_id),
                    }
                    .into());
                }
                if let Some(pending) = raffle.outstanding_request() {
                    warn!(request_id = %pending.request_id, "Resuming with a settlement in flight");
                    coordinator.restore_request(pending.request_id, &raffle.random_words_request());
                }
                raffle
            }
            None => {
                let mut raffle_config = config.raffle.clone();
                raffle_config.oracle.subscription_id = subscription_id.clone();
                Raffle::new(raffle_config, clock.now())?
            }
        };

        coordinator.add_consumer(&subscription_id, raffle.config().address)?;
        info!(
            raffle = %raffle.config().address,
            coordinator = %coordinator.address(),
            vrf_public_key = %coordinator.engine().public_key_hex(),
            "Local node ready"
        );

        let treasury = Treasury::new();
        let service = Arc::new(RaffleService::new(
            raffle,
            coordinator.clone(),
            Arc::new(treasury.clone()),
            clock,
        ));

        Ok(Self {
            service,
            coordinator,
            treasury,
        })
    }

    /// Start the relay and, if enabled, the keeper
    pub fn spawn_tasks(&self, config: &NodeConfig) -> NodeTasks {
        let keeper = config.keeper.enabled.then(|| {
            Keeper::spawn(
                self.service.clone(),
                Duration::from_millis(config.keeper.poll_interval_ms),
            )
        });
        let relay = OracleRelay::spawn(
            self.service.clone(),
            self.coordinator.clone(),
            Duration::from_millis(config.mock_oracle.block_time_ms),
        );
        NodeTasks { keeper, relay }
    }
}
