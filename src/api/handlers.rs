//! Request Handlers

use super::{
    errors::ApiError,
    middleware::RequestId,
    models::*,
};
use crate::{
    errors::RaffleError,
    oracle::{VrfCoordinatorMock, VrfEngine},
    raffle::{RaffleEvent, RaffleSnapshot, Settlement, UpkeepCheck},
    service::RaffleService,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

/// Shared application state
pub struct AppState {
    pub service: Arc<RaffleService>,
    /// The only oracle whose proofs `/oracle/fulfill` accepts
    pub coordinator: Arc<VrfCoordinatorMock>,
    pub version: String,
}

impl AppState {
    pub fn new(service: Arc<RaffleService>, coordinator: Arc<VrfCoordinatorMock>) -> Self {
        Self {
            service,
            coordinator,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn body<T>(request_id: &RequestId, payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
        time: Utc::now(),
    })
}

/// GET /raffle
pub async fn raffle_handler(State(state): State<Arc<AppState>>) -> Json<RaffleSnapshot> {
    Json(state.service.snapshot().await)
}

/// GET /raffle/players/:index
pub async fn player_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    index: Result<Path<usize>, PathRejection>,
) -> Result<Json<PlayerResponse>, ApiError> {
    let Path(index) = index.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;
    let player = state
        .service
        .participant_at(index)
        .await
        .map_err(|e| ApiError::raffle(request_id.0.clone(), e))?;
    Ok(Json(PlayerResponse { index, player }))
}

/// POST /raffle/enter
pub async fn enter_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EnterRequest>, JsonRejection>,
) -> Result<Json<RaffleEvent>, ApiError> {
    let req = body(&request_id, payload)?;
    let event = state
        .service
        .enter(req.player, req.value)
        .await
        .map_err(|e| ApiError::raffle(request_id.0.clone(), e))?;
    Ok(Json(event))
}

/// GET /raffle/upkeep
pub async fn check_upkeep_handler(State(state): State<Arc<AppState>>) -> Json<UpkeepCheck> {
    Json(state.service.check_upkeep().await)
}

/// POST /raffle/upkeep
pub async fn perform_upkeep_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RaffleEvent>, ApiError> {
    let event = state
        .service
        .perform_upkeep()
        .await
        .map_err(|e| ApiError::raffle(request_id.0.clone(), e))?;
    Ok(Json(event))
}

/// POST /oracle/fulfill
pub async fn fulfill_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FulfillRequest>, JsonRejection>,
) -> Result<Json<Settlement>, ApiError> {
    let req = body(&request_id, payload)?;
    let consumer = state.service.snapshot().await.address;
    let oracle_key = state.coordinator.engine().public_key_hex();

    let words = VrfEngine::verify_fulfillment(&oracle_key, req.request_id, &consumer, &req.proofs)
        .map_err(|reason| {
            warn!(request_id = %req.request_id, %reason, "Fulfillment proof rejected");
            ApiError::raffle(
                request_id.0.clone(),
                RaffleError::InvalidProof {
                    request_id: req.request_id,
                    reason,
                },
            )
        })?;

    let settlement = state
        .service
        .fulfill_random_words(&state.coordinator.address(), req.request_id, &words)
        .await
        .map_err(|e| ApiError::raffle(request_id.0.clone(), e))?;

    if let Err(e) = state.coordinator.mark_fulfilled(req.request_id) {
        warn!(request_id = %req.request_id, error = %e, "Could not mark request fulfilled");
    }
    Ok(Json(settlement))
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.service.snapshot().await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.service.metrics().render(&snapshot),
    )
}
