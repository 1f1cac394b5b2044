//! Router configuration.

use crate::api::{availability, discounts, fees, intents, quotes, reservations, seats, webhook};
use crate::health::{health_check, readiness_check};
use crate::state::{AppState, Backend};
use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

/// Build the complete router.
///
/// - `/health`, `/ready`: liveness and readiness
/// - `/api/availability`, `/api/quotes`, `/api/reservations`: capacity and pricing
/// - `/api/payments/*`: intents, confirmation, status and the provider webhook
/// - `/api/discounts`, `/api/fee-overrides`, `/api/seats/*`: administration
pub fn build_router<B: Backend>(state: AppState<B>) -> Router {
    let payment_routes = Router::new()
        .route("/intents", post(intents::create_intent::<B>))
        .route("/confirm", post(intents::confirm::<B>))
        .route("/status/:order_id", get(intents::status::<B>))
        .route("/webhook", post(webhook::receive::<B>));

    let seat_routes = Router::new()
        .route("/expire", post(seats::expire::<B>))
        .route("/:id", get(seats::get::<B>))
        .route("/:id/approve", post(seats::approve::<B>))
        .route("/:id/revoke", post(seats::revoke::<B>))
        .route("/:id/reassign", post(seats::reassign::<B>))
        .route("/:id/card-eligibility", get(seats::card_eligibility::<B>));

    let api_routes = Router::new()
        .route("/availability", get(availability::availability::<B>))
        .route("/quotes", post(quotes::quote::<B>))
        .route("/reservations", post(reservations::reserve::<B>))
        .route("/discounts", post(discounts::create::<B>))
        .route("/discounts/:id/status", patch(discounts::update_status::<B>))
        .route("/fee-overrides", post(fees::create::<B>))
        .nest("/payments", payment_routes)
        .nest("/seats", seat_routes);

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check::<B>))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
