//! Read-only capacity queries.

use crate::error::AppError;
use crate::state::{AppState, Backend};
use axum::{
    Json,
    extract::{Query, State},
};
use seat_engine_core::capacity::CapacityReport;
use seat_engine_core::spec::SeatSpecRequest;

/// Capacity, usage and headroom of a seat spec's buckets.
///
/// ```text
/// GET /api/availability?cellRef=...&designationRef=...&level=ZONE&zone=SOUTH
/// ```
pub async fn availability<B: Backend>(
    State(state): State<AppState<B>>,
    Query(spec): Query<SeatSpecRequest>,
) -> Result<Json<CapacityReport>, AppError> {
    let report = state.engine.availability(&spec.into_spec()?).await?;
    Ok(Json(report))
}
