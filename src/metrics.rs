//! Raffle counters and Prometheus text rendering

use crate::raffle::{RaffleSnapshot, RaffleState};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct RaffleMetrics {
    start_time: Instant,
    entries: AtomicU64,
    entries_rejected: AtomicU64,
    upkeeps_performed: AtomicU64,
    upkeeps_rejected: AtomicU64,
    settlements: AtomicU64,
    fulfillments_rejected: AtomicU64,
}

impl Default for RaffleMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RaffleMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            entries: AtomicU64::new(0),
            entries_rejected: AtomicU64::new(0),
            upkeeps_performed: AtomicU64::new(0),
            upkeeps_rejected: AtomicU64::new(0),
            settlements: AtomicU64::new(0),
            fulfillments_rejected: AtomicU64::new(0),
        }
    }

    pub fn record_entry(&self, accepted: bool) {
        let counter = if accepted { &self.entries } else { &self.entries_rejected };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upkeep(&self, performed: bool) {
        let counter = if performed { &self.upkeeps_performed } else { &self.upkeeps_rejected };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fulfillment(&self, settled: bool) {
        let counter = if settled { &self.settlements } else { &self.fulfillments_rejected };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    pub fn settlements(&self) -> u64 {
        self.settlements.load(Ordering::Relaxed)
    }

    pub fn fulfillments_rejected(&self) -> u64 {
        self.fulfillments_rejected.load(Ordering::Relaxed)
    }

    /// Prometheus exposition format; gauges come from the current snapshot
    pub fn render(&self, snapshot: &RaffleSnapshot) -> String {
        let counters = [
            ("raffle_entries_total", "Accepted entries", &self.entries),
            ("raffle_entries_rejected_total", "Rejected entries", &self.entries_rejected),
            ("raffle_upkeeps_performed_total", "Settlement triggers accepted", &self.upkeeps_performed),
            ("raffle_upkeeps_rejected_total", "Settlement triggers rejected", &self.upkeeps_rejected),
            ("raffle_settlements_total", "Completed settlements", &self.settlements),
            ("raffle_fulfillments_rejected_total", "Rejected oracle fulfillments", &self.fulfillments_rejected),
        ];

        let mut out = String::new();
        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {}", counter.load(Ordering::Relaxed));
        }

        let settling = u8::from(snapshot.state == RaffleState::Settling);
        let gauges = [
            ("raffle_players", "Participants in the current round", snapshot.players.to_string()),
            ("raffle_pool_balance_wei", "Pool balance", snapshot.balance.to_string()),
            ("raffle_round", "Current round number", snapshot.round.to_string()),
            ("raffle_settling", "1 while a settlement is in flight", settling.to_string()),
            ("raffle_uptime_seconds", "Seconds since start", self.start_time.elapsed().as_secs().to_string()),
        ];
        for (name, help, value) in gauges {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} gauge");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}
