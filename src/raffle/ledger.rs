use crate::errors::RaffleError;
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Participants and pooled value of the current round.
///
/// Entry order is preserved and duplicates are allowed: every accepted
/// entry is one slot in the draw.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolLedger {
    players: Vec<Address>,
    #[serde(with = "crate::types::amount_serde")]
    balance: Amount,
}

impl PoolLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a participant and add the paid value to the pool.
    /// Fee and lifecycle checks belong to the caller. An entry that would
    /// overflow the pool is refused and leaves the ledger untouched.
    pub(crate) fn record_entry(&mut self, player: Address, paid: Amount) -> Result<(), RaffleError> {
        let balance = self
            .balance
            .checked_add(paid)
            .ok_or(RaffleError::BalanceOverflow {
                balance: self.balance,
                paid,
            })?;
        self.players.push(player);
        self.balance = balance;
        Ok(())
    }

    pub fn participant_at(&self, index: usize) -> Result<Address, RaffleError> {
        self.players
            .get(index)
            .copied()
            .ok_or(RaffleError::IndexOutOfRange {
                index,
                len: self.players.len(),
            })
    }

    pub fn participant_count(&self) -> usize {
        self.players.len()
    }

    pub fn current_balance(&self) -> Amount {
        self.balance
    }

    pub fn participants(&self) -> &[Address] {
        &self.players
    }

    /// Clear participants and zero the pool after a payout
    pub(crate) fn reset(&mut self) {
        self.players.clear();
        self.balance = 0;
    }
}
