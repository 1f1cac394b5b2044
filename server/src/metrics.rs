//! Business metrics for the seat engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `seat_engine_reservations_total{outcome}` - Reservations by outcome
//! - `seat_engine_intents_total{status}` - Intent creations and settlements
//! - `seat_engine_webhooks_total{outcome}` - Webhook deliveries by outcome
//! - `seat_engine_refund_required_total` - Paid intents that found no seat
//! - `seat_engine_webhook_ledger_errors_total{stage}` - Webhook ledger writes that failed (recorded by the engine)
//!
//! ## Histograms
//! - `seat_engine_lock_wait_seconds` - Advisory lock wait (recorded by the store)
//! - `seat_engine_transaction_seconds` - Committed transaction duration

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use seat_engine_core::engine::WebhookAck;
use seat_engine_core::intent::IntentStatus;
use std::net::SocketAddr;

/// Register metric descriptions.
///
/// Call once at start-up, before any metric is recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "seat_engine_reservations_total",
        "Seat reservations by outcome (accepted, rejected)"
    );
    describe_counter!(
        "seat_engine_intents_total",
        "Payment intents by status (created, success, failed, refund_required)"
    );
    describe_counter!(
        "seat_engine_webhooks_total",
        "Webhook deliveries by outcome (processed, duplicate, ignored, rejected, failed)"
    );
    describe_counter!(
        "seat_engine_refund_required_total",
        "Payments that succeeded after their bucket sold out"
    );
    describe_counter!(
        "seat_engine_webhook_ledger_errors_total",
        "Webhook ledger writes that failed, by stage (claim, outcome)"
    );
    describe_histogram!(
        "seat_engine_lock_wait_seconds",
        "Time spent waiting for a bucket or contact lock"
    );
    describe_histogram!(
        "seat_engine_transaction_seconds",
        "Duration of committed store transactions"
    );

    tracing::info!("Business metrics registered");
}

/// Install the Prometheus exporter listening on `addr`.
///
/// # Errors
///
/// Fails if the recorder is already installed or the address is taken.
pub fn install_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Record a reservation outcome.
pub fn record_reservation(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    metrics::counter!("seat_engine_reservations_total", "outcome" => outcome).increment(1);
}

/// Record an intent creation.
pub fn record_intent_created() {
    metrics::counter!("seat_engine_intents_total", "status" => "created").increment(1);
}

/// Record an intent settling after confirm.
pub fn record_intent_settled(status: IntentStatus) {
    let label = match status {
        IntentStatus::Pending => return,
        IntentStatus::Success => "success",
        IntentStatus::Failed => "failed",
        IntentStatus::RefundRequired => {
            metrics::counter!("seat_engine_refund_required_total").increment(1);
            "refund_required"
        }
    };
    metrics::counter!("seat_engine_intents_total", "status" => label).increment(1);
}

/// Record a webhook delivery.
pub fn record_webhook(ack: &WebhookAck) {
    metrics::counter!("seat_engine_webhooks_total", "outcome" => ack.as_str()).increment(1);
}
