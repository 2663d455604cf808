//! Settlement engine
//!
//! `Raffle` is the single owned aggregate: configuration, pool ledger, round
//! clock, lifecycle, request registry and the most recent winner. Every
//! operation takes `now` explicitly and either commits all of its effects or
//! leaves the aggregate exactly as it found it.

use super::{
    clock::RoundClock,
    events::{RaffleEvent, Settlement},
    ledger::PoolLedger,
    lifecycle::{Lifecycle, RaffleState},
    readiness::{self, UpkeepCheck},
    randomness::{PendingRequest, RandomWordsRequest, RandomnessOracle, RequestRegistry},
};
use crate::config::RaffleConfig;
use crate::errors::{ConfigurationError, RaffleError};
use crate::payout::PayoutSink;
use crate::types::{Address, Amount, RandomWord, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Read-only view over every queryable field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleSnapshot {
    pub address: Address,
    pub state: RaffleState,
    #[serde(with = "crate::types::amount_serde")]
    pub entrance_fee: Amount,
    pub interval_secs: u64,
    pub round: u64,
    pub round_start: Timestamp,
    pub players: usize,
    #[serde(with = "crate::types::amount_serde")]
    pub balance: Amount,
    pub recent_winner: Option<Address>,
    pub outstanding_request: Option<PendingRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Raffle {
    config: RaffleConfig,
    ledger: PoolLedger,
    clock: RoundClock,
    lifecycle: Lifecycle,
    requests: RequestRegistry,
    recent_winner: Option<Address>,
}

impl Raffle {
    /// Create an open raffle whose first round starts at `now`
    pub fn new(config: RaffleConfig, now: Timestamp) -> Result<Self, ConfigurationError> {
        config.validate()?;
        info!(
            raffle = %config.address,
            entrance_fee = %config.entrance_fee,
            interval_secs = config.interval_secs,
            coordinator = %config.oracle.coordinator,
            "Raffle created"
        );
        Ok(Self {
            config,
            ledger: PoolLedger::new(),
            clock: RoundClock::new(now),
            lifecycle: Lifecycle::new(),
            requests: RequestRegistry::new(),
            recent_winner: None,
        })
    }

    // Entry interface

    /// Join the current round by paying at least the entrance fee
    pub fn enter(&mut self, player: Address, paid: Amount) -> Result<RaffleEvent, RaffleError> {
        if paid < self.config.entrance_fee {
            return Err(RaffleError::InsufficientPayment {
                paid,
                required: self.config.entrance_fee,
            });
        }
        if !self.lifecycle.is_open() {
            return Err(RaffleError::NotOpen {
                state: self.lifecycle.state(),
            });
        }

        self.ledger.record_entry(player, paid)?;
        debug!(
            player = %player,
            paid = %paid,
            players = self.ledger.participant_count(),
            "Raffle entered"
        );

        Ok(RaffleEvent::RaffleEntered {
            player,
            value: paid,
            round: self.clock.round(),
        })
    }

    // Automation interface

    /// Readiness predicate with diagnostics. Pure.
    pub fn check_upkeep(&self, now: Timestamp) -> UpkeepCheck {
        readiness::evaluate(
            &self.ledger,
            &self.clock,
            &self.lifecycle,
            self.config.interval_secs,
            now,
        )
    }

    /// Close entry and request randomness. Either the raffle ends up
    /// settling with exactly one outstanding request, or nothing changes.
    pub fn perform_upkeep(
        &mut self,
        oracle: &dyn RandomnessOracle,
        now: Timestamp,
    ) -> Result<RaffleEvent, RaffleError> {
        let check = self.check_upkeep(now);
        if !check.upkeep_needed {
            return Err(RaffleError::UpkeepNotNeeded(check.diagnostics));
        }

        self.lifecycle
            .begin_settlement()
            .map_err(|state| RaffleError::NotOpen { state })?;

        let request = self.random_words_request();
        let request_id = match self.requests.request(oracle, &request, now) {
            Ok(id) => id,
            Err(e) => {
                // Settling without an outstanding request could never finish
                let _ = self.lifecycle.reopen();
                warn!(error = %e, "Randomness request rejected, raffle stays open");
                return Err(e);
            }
        };

        info!(
            request_id = %request_id,
            round = self.clock.round(),
            players = self.ledger.participant_count(),
            balance = %self.ledger.current_balance(),
            "Requested raffle winner"
        );

        Ok(RaffleEvent::RequestedRaffleWinner {
            request_id,
            round: self.clock.round(),
        })
    }

    // Oracle callback

    /// Consume the outstanding request, pick the winner, reset the round and
    /// pay out the pool. Any failure restores the aggregate to its prior value.
    pub fn fulfill_random_words(
        &mut self,
        caller: &Address,
        request_id: RequestId,
        random_words: &[RandomWord],
        payout: &dyn PayoutSink,
        now: Timestamp,
    ) -> Result<Settlement, RaffleError> {
        if *caller != self.config.oracle.coordinator {
            return Err(RaffleError::UnauthorizedCaller { caller: *caller });
        }

        let snapshot = self.clone();
        match self.settle(request_id, random_words, payout, now) {
            Ok(settlement) => Ok(settlement),
            Err(e) => {
                *self = snapshot;
                warn!(request_id = %request_id, error = %e, "Fulfillment rolled back");
                Err(e)
            }
        }
    }

    fn settle(
        &mut self,
        request_id: RequestId,
        random_words: &[RandomWord],
        payout: &dyn PayoutSink,
        now: Timestamp,
    ) -> Result<Settlement, RaffleError> {
        let word = self
            .requests
            .fulfill(request_id, random_words, self.config.oracle.num_words as usize)?;

        let players = self.ledger.participant_count();
        let winner_index = word
            .index_for(players)
            .ok_or(RaffleError::IndexOutOfRange { index: 0, len: 0 })?;
        let winner = self.ledger.participant_at(winner_index)?;
        let amount = self.ledger.current_balance();
        let round = self.clock.round();

        self.recent_winner = Some(winner);
        self.ledger.reset();
        self.clock.restart(now);
        self.lifecycle
            .reopen()
            .map_err(|state| RaffleError::NotOpen { state })?;

        payout
            .transfer(&winner, amount)
            .map_err(|source| RaffleError::PayoutTransferFailed {
                winner,
                amount,
                source,
            })?;

        info!(
            round,
            winner = %winner,
            winner_index,
            payout = %amount,
            "Winner picked"
        );

        Ok(Settlement {
            round,
            request_id,
            winner,
            winner_index,
            payout: amount,
            settled_at: now,
        })
    }

    /// Parameters this raffle submits with every randomness request
    pub fn random_words_request(&self) -> RandomWordsRequest {
        let oracle = &self.config.oracle;
        RandomWordsRequest {
            key_hash: oracle.key_hash,
            subscription_id: oracle.subscription_id.clone(),
            request_confirmations: oracle.request_confirmations,
            callback_gas_limit: oracle.callback_gas_limit,
            num_words: oracle.num_words,
            consumer: self.config.address,
        }
    }

    // Query interface

    pub fn config(&self) -> &RaffleConfig {
        &self.config
    }

    pub fn state(&self) -> RaffleState {
        self.lifecycle.state()
    }

    pub fn entrance_fee(&self) -> Amount {
        self.config.entrance_fee
    }

    pub fn interval_secs(&self) -> u64 {
        self.config.interval_secs
    }

    pub fn participant_count(&self) -> usize {
        self.ledger.participant_count()
    }

    pub fn participant_at(&self, index: usize) -> Result<Address, RaffleError> {
        self.ledger.participant_at(index)
    }

    pub fn current_balance(&self) -> Amount {
        self.ledger.current_balance()
    }

    pub fn recent_winner(&self) -> Option<Address> {
        self.recent_winner
    }

    pub fn round_start(&self) -> Timestamp {
        self.clock.round_start()
    }

    pub fn round(&self) -> u64 {
        self.clock.round()
    }

    pub fn outstanding_request(&self) -> Option<PendingRequest> {
        self.requests.outstanding()
    }

    pub fn snapshot(&self) -> RaffleSnapshot {
        RaffleSnapshot {
            address: self.config.address,
            state: self.state(),
            entrance_fee: self.entrance_fee(),
            interval_secs: self.interval_secs(),
            round: self.round(),
            round_start: self.round_start(),
            players: self.participant_count(),
            balance: self.current_balance(),
            recent_winner: self.recent_winner,
            outstanding_request: self.outstanding_request(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OracleError;
    use crate::payout::Treasury;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    const FEE: Amount = 10;

    struct StubOracle {
        next: AtomicU64,
        down: AtomicBool,
    }

    impl StubOracle {
        fn new() -> Self {
            Self {
                next: AtomicU64::new(1),
                down: AtomicBool::new(false),
            }
        }
    }

    impl RandomnessOracle for StubOracle {
        fn request_random_words(&self, _request: &RandomWordsRequest) -> Result<RequestId, OracleError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(OracleError::Unavailable("stub down".to_string()));
            }
            Ok(RequestId(self.next.fetch_add(1, Ordering::SeqCst)))
        }
    }

    fn config() -> RaffleConfig {
        RaffleConfig {
            entrance_fee: FEE,
            interval_secs: 30,
            ..Default::default()
        }
    }

    fn coordinator() -> Address {
        config().oracle.coordinator
    }

    fn raffle_with_players(n: usize) -> Raffle {
        let mut raffle = Raffle::new(config(), 1_000).unwrap();
        for i in 0..n {
            raffle.enter(Address::derive(&format!("player-{i}")), FEE).unwrap();
        }
        raffle
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let bad = RaffleConfig {
            interval_secs: 0,
            ..config()
        };
        assert!(Raffle::new(bad, 0).is_err());
    }

    #[test]
    fn test_enter_emits_event() {
        let mut raffle = Raffle::new(config(), 0).unwrap();
        let alice = Address::derive("alice");
        let event = raffle.enter(alice, 15).unwrap();
        assert_eq!(
            event,
            RaffleEvent::RaffleEntered { player: alice, value: 15, round: 1 }
        );
        assert_eq!(raffle.current_balance(), 15);
    }

    #[test]
    fn test_underpaid_entry_is_rejected() {
        let mut raffle = Raffle::new(config(), 0).unwrap();
        let err = raffle.enter(Address::derive("alice"), FEE - 1).unwrap_err();
        assert_eq!(err, RaffleError::InsufficientPayment { paid: FEE - 1, required: FEE });
        assert_eq!(raffle.participant_count(), 0);
        assert_eq!(raffle.current_balance(), 0);
    }

    #[test]
    fn test_perform_upkeep_closes_entry() {
        let oracle = StubOracle::new();
        let mut raffle = raffle_with_players(2);

        let event = raffle.perform_upkeep(&oracle, 1_030).unwrap();
        assert_eq!(
            event,
            RaffleEvent::RequestedRaffleWinner { request_id: RequestId(1), round: 1 }
        );
        assert_eq!(raffle.state(), RaffleState::Settling);
        assert_eq!(raffle.outstanding_request().map(|p| p.request_id), Some(RequestId(1)));

        let err = raffle.enter(Address::derive("late"), FEE).unwrap_err();
        assert_eq!(err, RaffleError::NotOpen { state: RaffleState::Settling });
    }

    #[test]
    fn test_underpaid_entry_while_settling_reports_payment() {
        let oracle = StubOracle::new();
        let mut raffle = raffle_with_players(1);
        raffle.perform_upkeep(&oracle, 1_030).unwrap();
        let before = raffle.clone();

        let err = raffle.enter(Address::derive("late"), 1).unwrap_err();
        assert_eq!(err, RaffleError::InsufficientPayment { paid: 1, required: FEE });
        assert_eq!(raffle, before);
    }

    #[test]
    fn test_pool_overflow_rejects_entry() {
        let mut raffle = raffle_with_players(1);
        let before = raffle.clone();

        let err = raffle.enter(Address::derive("whale"), Amount::MAX).unwrap_err();
        assert_eq!(err, RaffleError::BalanceOverflow { balance: FEE, paid: Amount::MAX });
        assert_eq!(raffle, before);
    }

    #[test]
    fn test_second_trigger_fails_fast() {
        let oracle = StubOracle::new();
        let mut raffle = raffle_with_players(1);
        raffle.perform_upkeep(&oracle, 1_030).unwrap();

        let before = raffle.clone();
        let err = raffle.perform_upkeep(&oracle, 1_100).unwrap_err();
        assert!(matches!(err, RaffleError::UpkeepNotNeeded(ref d) if d.state == RaffleState::Settling));
        assert_eq!(raffle, before);
    }

    #[test]
    fn test_oracle_failure_rolls_back_trigger() {
        let oracle = StubOracle::new();
        oracle.down.store(true, Ordering::SeqCst);
        let mut raffle = raffle_with_players(1);
        let before = raffle.clone();

        let err = raffle.perform_upkeep(&oracle, 1_030).unwrap_err();
        assert!(matches!(err, RaffleError::OracleUnavailable(_)));
        assert_eq!(raffle, before);
        assert_eq!(raffle.state(), RaffleState::Open);
        assert!(raffle.outstanding_request().is_none());
    }

    #[test]
    fn test_unauthorized_fulfillment() {
        let oracle = StubOracle::new();
        let treasury = Treasury::new();
        let mut raffle = raffle_with_players(1);
        raffle.perform_upkeep(&oracle, 1_030).unwrap();
        let before = raffle.clone();

        let intruder = Address::derive("intruder");
        let err = raffle
            .fulfill_random_words(&intruder, RequestId(1), &[RandomWord::from_u64(0)], &treasury, 1_040)
            .unwrap_err();
        assert_eq!(err, RaffleError::UnauthorizedCaller { caller: intruder });
        assert_eq!(raffle, before);
    }

    #[test]
    fn test_fulfillment_pays_and_resets() {
        let oracle = StubOracle::new();
        let treasury = Treasury::new();
        let mut raffle = raffle_with_players(4);
        raffle.perform_upkeep(&oracle, 1_030).unwrap();

        let settlement = raffle
            .fulfill_random_words(&coordinator(), RequestId(1), &[RandomWord::from_u64(6)], &treasury, 1_050)
            .unwrap();

        let expected_winner = Address::derive("player-2");
        assert_eq!(settlement.winner_index, 2);
        assert_eq!(settlement.winner, expected_winner);
        assert_eq!(settlement.payout, 40);
        assert_eq!(settlement.round, 1);
        assert_eq!(treasury.balance_of(&expected_winner), 40);

        assert_eq!(raffle.state(), RaffleState::Open);
        assert_eq!(raffle.participant_count(), 0);
        assert_eq!(raffle.current_balance(), 0);
        assert_eq!(raffle.round_start(), 1_050);
        assert_eq!(raffle.round(), 2);
        assert_eq!(raffle.recent_winner(), Some(expected_winner));
        assert!(raffle.outstanding_request().is_none());
    }

    #[test]
    fn test_failed_payout_restores_state() {
        let oracle = StubOracle::new();
        let treasury = Treasury::new();
        let mut raffle = raffle_with_players(4);
        raffle.perform_upkeep(&oracle, 1_030).unwrap();
        treasury.reject_payments_to(Address::derive("player-2"));
        let before = raffle.clone();

        let err = raffle
            .fulfill_random_words(&coordinator(), RequestId(1), &[RandomWord::from_u64(6)], &treasury, 1_050)
            .unwrap_err();
        assert!(matches!(err, RaffleError::PayoutTransferFailed { amount: 40, .. }));
        assert_eq!(raffle, before);
        assert_eq!(raffle.state(), RaffleState::Settling);
    }

    #[test]
    fn test_snapshot_reflects_queries() {
        let raffle = raffle_with_players(3);
        let snapshot = raffle.snapshot();
        assert_eq!(snapshot.players, 3);
        assert_eq!(snapshot.balance, 30);
        assert_eq!(snapshot.entrance_fee, FEE);
        assert_eq!(snapshot.interval_secs, 30);
        assert_eq!(snapshot.round_start, 1_000);
        assert_eq!(snapshot.state, RaffleState::Open);
        assert_eq!(snapshot.recent_winner, None);
    }
}
