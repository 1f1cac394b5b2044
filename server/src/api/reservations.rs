//! Provisional seat reservations.

use crate::error::{ApiJson, AppError};
use crate::metrics;
use crate::state::{AppState, Backend};
use axum::{Json, extract::State, http::StatusCode};
use seat_engine_core::capacity::RejectionReason;
use seat_engine_core::reservation::ReservationOutcome;
use seat_engine_core::seat::SeatStatus;
use seat_engine_core::spec::SeatSpecRequest;
use seat_engine_core::types::{Money, SeatId, TeamId, UserId};
use serde::{Deserialize, Serialize};

/// `POST /api/reservations` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveBody {
    /// Identity to hold the seat, if already known
    pub user_id: Option<UserId>,
    /// Seat spec
    #[serde(flatten)]
    pub spec: SeatSpecRequest,
    /// Team for fee scoping
    pub team_ref: Option<TeamId>,
}

/// Reservation result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    /// `true` if a seat was created
    pub accepted: bool,
    /// New seat
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_id: Option<SeatId>,
    /// Display number in the bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_sequence: Option<u32>,
    /// Fee still owed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_payment: Option<bool>,
    /// Fee
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Money>,
    /// Starting status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SeatStatus>,
    /// Cap that blocked the reservation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
}

impl From<ReservationOutcome> for ReservationResponse {
    fn from(outcome: ReservationOutcome) -> Self {
        match outcome {
            ReservationOutcome::Accepted {
                seat_id,
                seat_sequence,
                requires_payment,
                fee,
                status,
            } => Self {
                accepted: true,
                seat_id: Some(seat_id),
                seat_sequence: Some(seat_sequence),
                requires_payment: Some(requires_payment),
                fee: Some(fee),
                status: Some(status),
                reason: None,
            },
            ReservationOutcome::Rejected { reason } => Self {
                accepted: false,
                seat_id: None,
                seat_sequence: None,
                requires_payment: None,
                fee: None,
                status: None,
                reason: Some(reason),
            },
        }
    }
}

/// Reserve a provisional seat.
///
/// 201 with the seat when accepted, 409 with `accepted: false` and the
/// blocking cap when the bucket is full.
pub async fn reserve<B: Backend>(
    State(state): State<AppState<B>>,
    ApiJson(body): ApiJson<ReserveBody>,
) -> Result<(StatusCode, Json<ReservationResponse>), AppError> {
    let outcome = state
        .engine
        .reserve_seat(body.user_id, body.spec.into_spec()?, body.team_ref)
        .await?;
    let response = ReservationResponse::from(outcome);
    metrics::record_reservation(response.accepted);

    let status = if response.accepted {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    };
    Ok((status, Json(response)))
}
