//! Contact discount administration.

use crate::error::{ApiJson, AppError};
use crate::state::{AppState, Backend};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use seat_engine_core::discount::{Discount, DiscountStatus};
use seat_engine_core::engine::NewDiscount;
use seat_engine_core::types::{ContactNumber, DiscountId};
use serde::Deserialize;
use uuid::Uuid;

/// `POST /api/discounts` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscountBody {
    /// Contact the discount belongs to
    pub contact: String,
    /// Percentage off, 1 to 100
    pub percent_off: u8,
    /// Window start
    pub active_from: Option<DateTime<Utc>>,
    /// Window end
    pub active_to: Option<DateTime<Utc>>,
}

/// `PATCH /api/discounts/{id}/status` body
#[derive(Debug, Deserialize)]
pub struct DiscountStatusBody {
    /// Target status
    pub status: DiscountStatus,
}

/// Create an ACTIVE discount. `409 CONFLICT` if the contact already holds one.
pub async fn create<B: Backend>(
    State(state): State<AppState<B>>,
    ApiJson(body): ApiJson<CreateDiscountBody>,
) -> Result<(StatusCode, Json<Discount>), AppError> {
    let discount = state
        .engine
        .create_discount(NewDiscount {
            contact: ContactNumber::parse(&body.contact)?,
            percent_off: body.percent_off,
            active_from: body.active_from,
            active_to: body.active_to,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(discount)))
}

/// Change a discount's status.
pub async fn update_status<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<DiscountStatusBody>,
) -> Result<Json<Discount>, AppError> {
    let discount = state
        .engine
        .update_discount_status(DiscountId::from_uuid(id), body.status)
        .await?;
    Ok(Json(discount))
}
