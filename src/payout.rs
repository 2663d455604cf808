//! Winner payouts
//!
//! The engine hands the whole pool to a `PayoutSink`. `Treasury` is the
//! in-memory sink used by the node and by tests; it can be told to refuse
//! funds for given recipients.

use crate::errors::TransferError;
use crate::types::{Address, Amount};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;

/// Destination for settled pools
pub trait PayoutSink: Send + Sync {
    fn transfer(&self, to: &Address, amount: Amount) -> Result<(), TransferError>;
}

/// Shared in-memory ledger of paid-out balances
#[derive(Clone, Default)]
pub struct Treasury {
    balances: Arc<DashMap<Address, Amount>>,
    rejecting: Arc<DashSet<Address>>,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.balances.get(address).map(|b| *b).unwrap_or(0)
    }

    /// Make every later transfer to `address` fail
    pub fn reject_payments_to(&self, address: Address) {
        self.rejecting.insert(address);
    }

    pub fn accept_payments_to(&self, address: &Address) {
        self.rejecting.remove(address);
    }

    /// Sum over all recipients, saturating at `Amount::MAX`
    pub fn total_paid(&self) -> Amount {
        self.balances
            .iter()
            .fold(0, |total, e| total.saturating_add(*e.value()))
    }
}

impl PayoutSink for Treasury {
    fn transfer(&self, to: &Address, amount: Amount) -> Result<(), TransferError> {
        if self.rejecting.contains(to) {
            return Err(TransferError::Rejected(*to));
        }
        let mut balance = self.balances.entry(*to).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(TransferError::Overflow(*to))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_credits_recipient() {
        let treasury = Treasury::new();
        let alice = Address::derive("alice");
        treasury.transfer(&alice, 40).unwrap();
        treasury.transfer(&alice, 2).unwrap();
        assert_eq!(treasury.balance_of(&alice), 42);
        assert_eq!(treasury.total_paid(), 42);
    }

    #[test]
    fn test_rejecting_recipient() {
        let treasury = Treasury::new();
        let bob = Address::derive("bob");
        treasury.reject_payments_to(bob);
        assert_eq!(treasury.transfer(&bob, 10), Err(TransferError::Rejected(bob)));
        assert_eq!(treasury.balance_of(&bob), 0);

        treasury.accept_payments_to(&bob);
        assert!(treasury.transfer(&bob, 10).is_ok());
    }

    #[test]
    fn test_overflowing_transfer_is_refused() {
        let treasury = Treasury::new();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        treasury.transfer(&alice, Amount::MAX).unwrap();
        treasury.transfer(&bob, 5).unwrap();

        assert_eq!(treasury.transfer(&alice, 1), Err(TransferError::Overflow(alice)));
        assert_eq!(treasury.balance_of(&alice), Amount::MAX);
        assert_eq!(treasury.total_paid(), Amount::MAX);
    }

    #[test]
    fn test_clones_share_state() {
        let treasury = Treasury::new();
        let handle = treasury.clone();
        treasury.transfer(&Address::derive("carol"), 5).unwrap();
        assert_eq!(handle.balance_of(&Address::derive("carol")), 5);
    }
}
