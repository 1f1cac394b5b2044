//! Seat administration: lookup, approval, revocation, reassignment and expiry.

use crate::error::{ApiJson, AppError};
use crate::state::{AppState, Backend};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use seat_engine_core::capacity::RejectionReason;
use seat_engine_core::engine::CardEligibility;
use seat_engine_core::lifecycle::ReassignOutcome;
use seat_engine_core::seat::Seat;
use seat_engine_core::spec::SeatSpecRequest;
use seat_engine_core::types::{Money, SeatId, TeamId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fetch a seat.
pub async fn get<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Seat>, AppError> {
    Ok(Json(state.engine.seat(SeatId::from_uuid(id)).await?))
}

/// `PENDING_APPROVAL` → `ACTIVE`
pub async fn approve<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Seat>, AppError> {
    Ok(Json(state.engine.approve_seat(SeatId::from_uuid(id)).await?))
}

/// Live → `REVOKED`, releasing the slot.
pub async fn revoke<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Seat>, AppError> {
    Ok(Json(state.engine.revoke_seat(SeatId::from_uuid(id)).await?))
}

/// `POST /api/seats/{id}/reassign` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignBody {
    /// Target spec
    #[serde(flatten)]
    pub spec: SeatSpecRequest,
    /// Team for fee scoping
    pub team_ref: Option<TeamId>,
}

/// Reassignment result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignResponse {
    /// `true` if the seat moved
    pub accepted: bool,
    /// Seat after the move
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<Seat>,
    /// Amount still owed for the new spec
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_due: Option<Money>,
    /// Cap that blocked the move
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
}

impl From<ReassignOutcome> for ReassignResponse {
    fn from(outcome: ReassignOutcome) -> Self {
        match outcome {
            ReassignOutcome::Accepted { seat, delta_due } => Self {
                accepted: true,
                seat: Some(seat),
                delta_due: Some(delta_due),
                reason: None,
            },
            ReassignOutcome::Rejected { reason } => Self {
                accepted: false,
                seat: None,
                delta_due: None,
                reason: Some(reason),
            },
        }
    }
}

/// Move a live seat to another spec. 409 when the target bucket is full.
pub async fn reassign<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<ReassignBody>,
) -> Result<(StatusCode, Json<ReassignResponse>), AppError> {
    let outcome = state
        .engine
        .reassign_seat(SeatId::from_uuid(id), body.spec.into_spec()?, body.team_ref)
        .await?;
    let response = ReassignResponse::from(outcome);
    let status = if response.accepted {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    Ok((status, Json(response)))
}

/// Expiry sweep result
#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    /// Seats moved to `EXPIRED`
    pub expired: Vec<SeatId>,
}

/// Expire every active seat past its end date.
pub async fn expire<B: Backend>(State(state): State<AppState<B>>) -> Result<Json<ExpireResponse>, AppError> {
    let expired = state.engine.expire_due().await?;
    if !expired.is_empty() {
        tracing::info!(count = expired.len(), "Expired seats");
    }
    Ok(Json(ExpireResponse { expired }))
}

/// `GET /api/seats/{id}/card-eligibility` query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityQuery {
    /// Seat holder
    pub user_id: UserId,
}

/// Whether an ID card may be issued for the seat.
pub async fn card_eligibility<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
    Query(query): Query<EligibilityQuery>,
) -> Result<Json<CardEligibility>, AppError> {
    let eligibility = state
        .engine
        .card_eligibility(query.user_id, SeatId::from_uuid(id))
        .await?;
    Ok(Json(eligibility))
}
