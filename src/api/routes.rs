//! Route Definitions

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Query interface
        .route("/raffle", get(raffle_handler))
        .route("/raffle/players/:index", get(player_handler))
        // Entry interface
        .route("/raffle/enter", post(enter_handler))
        // Automation interface
        .route("/raffle/upkeep", get(check_upkeep_handler).post(perform_upkeep_handler))
        // Oracle callback
        .route("/oracle/fulfill", post(fulfill_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
