//! Payment provider webhook.

use crate::metrics;
use crate::state::{AppState, Backend};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use seat_engine_core::engine::WebhookAck;
use serde::Serialize;

/// Webhook acknowledgment body
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `processed`, `duplicate`, `ignored`, `failed` or `rejected`
    pub status: &'static str,
}

/// Receive a provider webhook.
///
/// The raw body is verified against the signature header before parsing.
/// Every verified delivery gets 200, processing and ledger failures
/// included. A missing or bad signature gets 401 so the provider retries.
pub async fn receive<B: Backend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    let signature = headers
        .get(state.webhook_signature_header.as_ref())
        .and_then(|v| v.to_str().ok());

    let ack = state.engine.handle_webhook(&body, signature).await;
    metrics::record_webhook(&ack);

    let status = match ack {
        WebhookAck::Rejected => StatusCode::UNAUTHORIZED,
        _ => StatusCode::OK,
    };
    (status, Json(WebhookResponse { status: ack.as_str() }))
}
