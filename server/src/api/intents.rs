//! Payment intents: creation, client confirmation and status polling.

use crate::error::{ApiJson, AppError};
use crate::metrics;
use crate::state::{AppState, Backend};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use seat_engine_core::SeatError;
use seat_engine_core::engine::{ConfirmOutcome, ConfirmPayment, ConfirmStatus, CreateIntent, IntentCreated, IntentStatusView};
use seat_engine_core::intent::IntentStatus;
use seat_engine_core::spec::SeatSpecRequest;
use seat_engine_core::types::{ContactNumber, IntentId, TeamId};
use serde::Deserialize;
use uuid::Uuid;

/// `POST /api/payments/intents` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentBody {
    /// Paying contact
    pub contact: String,
    /// Seat spec
    #[serde(flatten)]
    pub spec: SeatSpecRequest,
    /// Team for fee scoping
    pub team_ref: Option<TeamId>,
}

/// Client-reported checkout outcome
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmStatusBody {
    /// Checkout succeeded
    Success,
    /// Checkout failed or was abandoned
    Failed,
}

/// `POST /api/payments/confirm` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    /// Order id from intent creation
    pub order_id: IntentId,
    /// Reported outcome
    pub status: ConfirmStatusBody,
    /// Provider payment reference
    pub provider_payment_ref: Option<String>,
    /// Provider checkout signature
    pub provider_signature: Option<String>,
    /// Failure reason
    pub reason: Option<String>,
}

/// Create a payment intent.
///
/// Returns 201 with `{orderId, amount, currency, providerOrderId?, quote}`.
/// A bucket that is already full answers `409 SOLD_OUT`.
pub async fn create_intent<B: Backend>(
    State(state): State<AppState<B>>,
    ApiJson(body): ApiJson<CreateIntentBody>,
) -> Result<(StatusCode, Json<IntentCreated>), AppError> {
    let request = CreateIntent {
        spec: body.spec.into_spec()?,
        contact: ContactNumber::parse(&body.contact)?,
        team: body.team_ref,
    };
    let created = state.engine.create_intent(request).await?;
    metrics::record_intent_created();
    Ok((StatusCode::CREATED, Json(created)))
}

/// Apply the client-reported checkout outcome.
///
/// Returns `{status, seatId?}`. A payment that arrived after the bucket
/// sold out answers `409 REFUND_REQUIRED`.
pub async fn confirm<B: Backend>(
    State(state): State<AppState<B>>,
    ApiJson(body): ApiJson<ConfirmBody>,
) -> Result<Json<ConfirmOutcome>, AppError> {
    let order_id = body.order_id;
    let outcome = state
        .engine
        .confirm(ConfirmPayment {
            order_id,
            status: match body.status {
                ConfirmStatusBody::Success => ConfirmStatus::Success,
                ConfirmStatusBody::Failed => ConfirmStatus::Failed,
            },
            provider_payment_ref: body.provider_payment_ref,
            provider_signature: body.provider_signature,
            reason: body.reason,
        })
        .await?;
    metrics::record_intent_settled(outcome.status);

    if outcome.status == IntentStatus::RefundRequired {
        return Err(SeatError::RefundRequired {
            intent_id: order_id.to_string(),
        }
        .into());
    }
    Ok(Json(outcome))
}

/// Poll an intent.
///
/// ```text
/// GET /api/payments/status/{orderId}
/// {"orderId": "...", "status": "SUCCESS", "amount": 50000, "currency": "INR",
///  "canRegister": true, "seatId": "..."}
/// ```
pub async fn status<B: Backend>(
    State(state): State<AppState<B>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<IntentStatusView>, AppError> {
    let view = state.engine.intent_status(IntentId::from_uuid(order_id)).await?;
    Ok(Json(view))
}
