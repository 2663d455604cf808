//! Error types for the raffle node
//!
//! Domain errors surface synchronously to the caller of the failing
//! operation; `AppError` rolls them up for the binary and the loaders.

use crate::raffle::lifecycle::RaffleState;
use crate::types::{Address, Amount, RequestId};
use serde::Serialize;

/// Diagnostics attached to a rejected settlement trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpkeepDiagnostics {
    #[serde(with = "crate::types::amount_serde")]
    pub balance: Amount,
    pub players: usize,
    pub state: RaffleState,
    pub elapsed_secs: u64,
    pub interval_secs: u64,
}

/// Raffle operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RaffleError {
    #[error("Insufficient payment: paid {paid}, entrance fee is {required}")]
    InsufficientPayment { paid: Amount, required: Amount },

    #[error("Raffle is not open (state: {state})")]
    NotOpen { state: RaffleState },

    #[error("Upkeep not needed (balance: {}, players: {}, state: {})", .0.balance, .0.players, .0.state)]
    UpkeepNotNeeded(UpkeepDiagnostics),

    #[error("Unknown randomness request {request_id} (outstanding: {outstanding:?})")]
    UnknownRequest {
        request_id: RequestId,
        outstanding: Option<RequestId>,
    },

    #[error("Caller {caller} is not the configured oracle")]
    UnauthorizedCaller { caller: Address },

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    #[error("Payout of {amount} to {winner} failed: {source}")]
    PayoutTransferFailed {
        winner: Address,
        amount: Amount,
        #[source]
        source: TransferError,
    },

    #[error("Participant index {index} out of range (participants: {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Malformed fulfillment: expected {expected} random words, got {received}")]
    MalformedFulfillment { expected: usize, received: usize },

    #[error("Invalid randomness proof for request {request_id}: {reason}")]
    InvalidProof { request_id: RequestId, reason: String },

    #[error("Pool balance {balance} cannot absorb payment {paid}")]
    BalanceOverflow { balance: Amount, paid: Amount },
}

impl RaffleError {
    /// Stable machine-readable code, used by the API layer and in logs
    pub fn code(&self) -> &'static str {
        match self {
            RaffleError::InsufficientPayment { .. } => "INSUFFICIENT_PAYMENT",
            RaffleError::NotOpen { .. } => "NOT_OPEN",
            RaffleError::UpkeepNotNeeded(_) => "UPKEEP_NOT_NEEDED",
            RaffleError::UnknownRequest { .. } => "UNKNOWN_REQUEST",
            RaffleError::UnauthorizedCaller { .. } => "UNAUTHORIZED_CALLER",
            RaffleError::OracleUnavailable(_) => "ORACLE_UNAVAILABLE",
            RaffleError::PayoutTransferFailed { .. } => "PAYOUT_TRANSFER_FAILED",
            RaffleError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            RaffleError::MalformedFulfillment { .. } => "MALFORMED_FULFILLMENT",
            RaffleError::InvalidProof { .. } => "INVALID_PROOF",
            RaffleError::BalanceOverflow { .. } => "BALANCE_OVERFLOW",
        }
    }
}

/// Errors raised by a randomness oracle while accepting or serving a request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Coordinator unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("Consumer {consumer} is not registered on subscription {subscription_id}")]
    InvalidConsumer {
        subscription_id: String,
        consumer: Address,
    },

    #[error("Subscription {subscription_id} balance {balance} below required {required}")]
    InsufficientBalance {
        subscription_id: String,
        balance: Amount,
        required: Amount,
    },

    #[error("Too many words requested: {requested} (max {max})")]
    TooManyWords { requested: u32, max: u32 },

    #[error("Invalid request: {0}")]
    InvalidRequest(RequestId),
}

/// Errors raised when moving funds to a recipient
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("recipient {0} rejected the transfer")]
    Rejected(Address),

    #[error("balance of {0} would overflow")]
    Overflow(Address),
}

/// Configuration and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

/// Snapshot storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Root error type for node-level operations
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Raffle error: {0}")]
    Raffle(#[from] RaffleError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

/// Convenience type alias for node-level results
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = RaffleError::InsufficientPayment { paid: 5, required: 10 };
        assert!(err.to_string().contains("paid 5"));
        assert!(err.to_string().contains("fee is 10"));
    }

    #[test]
    fn test_upkeep_error_carries_diagnostics() {
        let err = RaffleError::UpkeepNotNeeded(UpkeepDiagnostics {
            balance: 0,
            players: 0,
            state: RaffleState::Open,
            elapsed_secs: 3,
            interval_secs: 10,
        });
        assert_eq!(err.code(), "UPKEEP_NOT_NEEDED");
        assert!(err.to_string().contains("players: 0"));
    }

    #[test]
    fn test_error_conversion() {
        let oracle = OracleError::Unavailable("paused".to_string());
        let raffle: RaffleError = oracle.clone().into();
        assert_eq!(raffle, RaffleError::OracleUnavailable(oracle));

        let app: AppError = raffle.into();
        match app {
            AppError::Raffle(RaffleError::OracleUnavailable(_)) => {}
            other => panic!("Expected raffle error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_source() {
        let err = RaffleError::PayoutTransferFailed {
            winner: Address::derive("w"),
            amount: 40,
            source: TransferError::Rejected(Address::derive("w")),
        };
        assert!(err.source().is_some());

        let app = AppError::Configuration(ConfigurationError::ValidationFailed("x".to_string()));
        assert!(app.source().is_some());
    }
}
