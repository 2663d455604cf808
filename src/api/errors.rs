//! API Error Handling
//!
//! Structured error responses with status codes and request tracking.

use crate::errors::RaffleError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (NOT_OPEN, UPKEEP_NOT_NEEDED, BAD_REQUEST, ...)
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    Raffle(RaffleError),
    BadRequest(String),
    InternalError(String),
}

impl ApiError {
    pub fn raffle(request_id: String, error: RaffleError) -> Self {
        Self {
            kind: ApiErrorKind::Raffle(error),
            request_id,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::InternalError(message),
            request_id,
        }
    }
}

fn raffle_status(error: &RaffleError) -> StatusCode {
    match error {
        RaffleError::InsufficientPayment { .. } => StatusCode::PAYMENT_REQUIRED,
        RaffleError::NotOpen { .. } | RaffleError::UpkeepNotNeeded(_) => StatusCode::CONFLICT,
        RaffleError::UnknownRequest { .. } | RaffleError::IndexOutOfRange { .. } => StatusCode::NOT_FOUND,
        RaffleError::UnauthorizedCaller { .. } | RaffleError::InvalidProof { .. } => StatusCode::FORBIDDEN,
        RaffleError::OracleUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RaffleError::PayoutTransferFailed { .. } => StatusCode::BAD_GATEWAY,
        RaffleError::MalformedFulfillment { .. } => StatusCode::BAD_REQUEST,
        RaffleError::BalanceOverflow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn raffle_details(error: &RaffleError) -> Option<serde_json::Value> {
    match error {
        RaffleError::InsufficientPayment { paid, required } => Some(json!({
            "paid": paid.to_string(),
            "required": required.to_string(),
        })),
        RaffleError::NotOpen { state } => Some(json!({ "state": state })),
        RaffleError::UpkeepNotNeeded(diagnostics) => serde_json::to_value(diagnostics).ok(),
        RaffleError::UnknownRequest { outstanding, .. } => Some(json!({ "outstanding": outstanding })),
        RaffleError::IndexOutOfRange { index, len } => Some(json!({ "index": index, "len": len })),
        RaffleError::MalformedFulfillment { expected, received } => Some(json!({
            "expected": expected,
            "received": received,
        })),
        _ => None,
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::Raffle(e) => write!(f, "[{}] {}: {}", self.request_id, e.code(), e),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::InternalError(msg) => write!(f, "[{}] Internal Error: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self.kind {
            ApiErrorKind::Raffle(e) => (raffle_status(e), e.code(), e.to_string(), raffle_details(e)),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None),
            ApiErrorKind::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone(), None)
            }
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}
