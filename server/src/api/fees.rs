//! Fee override administration.

use crate::error::{ApiJson, AppError};
use crate::state::{AppState, Backend};
use axum::{Json, extract::State, http::StatusCode};
use seat_engine_core::engine::NewFeeOverride;
use seat_engine_core::fee::{FeeOverride, FeeScope};
use seat_engine_core::types::{Currency, Money, Purpose};
use serde::Deserialize;

/// `POST /api/fee-overrides` body
///
/// `scope` is `{"kind": "STATE", "ref": "<uuid>"}` or `{"kind": "GLOBAL"}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeeOverrideBody {
    /// Fee purpose
    pub purpose: Purpose,
    /// Exactly one scope
    pub scope: FeeScope,
    /// Amount in minor units
    pub amount: Money,
    /// Currency code
    pub currency: Currency,
    /// Renewal cadence
    pub renewal_interval_months: Option<u32>,
}

/// Create a fee override.
pub async fn create<B: Backend>(
    State(state): State<AppState<B>>,
    ApiJson(body): ApiJson<CreateFeeOverrideBody>,
) -> Result<(StatusCode, Json<FeeOverride>), AppError> {
    let fee = state
        .engine
        .create_fee_override(NewFeeOverride {
            purpose: body.purpose,
            scope: body.scope,
            amount: body.amount,
            currency: body.currency,
            renewal_interval_months: body.renewal_interval_months,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(fee)))
}
