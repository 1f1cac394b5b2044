//! Fee quotes.

use crate::error::{ApiJson, AppError};
use crate::state::{AppState, Backend};
use axum::{Json, extract::State};
use seat_engine_core::pricing::{Quote, QuoteRequest};
use seat_engine_core::spec::SeatSpecRequest;
use seat_engine_core::types::{ContactNumber, Purpose, TeamId};
use serde::Deserialize;

/// `POST /api/quotes` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBody {
    /// Fee purpose, e.g. `MEMBERSHIP`
    #[serde(default)]
    pub purpose: String,
    /// Seat spec
    #[serde(flatten)]
    pub spec: SeatSpecRequest,
    /// Team for team-scoped overrides
    pub team_ref: Option<TeamId>,
    /// Contact whose discount should apply
    pub contact: Option<String>,
}

/// Price a seat.
///
/// ```text
/// POST /api/quotes
/// {"purpose": "MEMBERSHIP", "cellRef": "...", "designationRef": "...",
///  "level": "STATE", "stateRef": "..."}
/// ```
///
/// Errors: `MISSING_PURPOSE` and `MISSING_LOCATION` (400), `NOT_FOUND` (404).
pub async fn quote<B: Backend>(
    State(state): State<AppState<B>>,
    ApiJson(body): ApiJson<QuoteBody>,
) -> Result<Json<Quote>, AppError> {
    let request = QuoteRequest {
        purpose: Purpose::parse(&body.purpose)?,
        spec: body.spec.into_spec()?,
        team: body.team_ref,
        contact: body.contact.as_deref().map(ContactNumber::parse).transpose()?,
    };
    let quote = state.engine.quote(&request).await?;
    Ok(Json(quote))
}
