//! Webhook reconciliation against the in-memory store

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use seat_engine_core::engine::{CreateIntent, IntentCreated, WebhookAck};
use seat_engine_core::intent::IntentStatus;
use chrono::Duration;
use seat_engine_core::webhook::{CLAIM_LEASE_SECS, WebhookEventStatus, fingerprint};
use seat_engine_testing::provider::{payment_captured_payload, payment_event_payload};
use seat_engine_testing::{Harness, StoreFault, contact};

async fn paid_intent(h: &Harness, capacity: u32) -> IntentCreated {
    let designation = h.designation(capacity, 50_000).await;
    h.engine
        .create_intent(CreateIntent {
            spec: h.national(&designation),
            contact: contact(1),
            team: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_captured_webhook_finalizes_intent() {
    let h = Harness::new().await;
    let created = paid_intent(&h, 1).await;
    let payload = payment_captured_payload(created.provider_order_id.as_deref().unwrap(), "pay_1");

    let ack = h
        .engine
        .handle_webhook(&payload, Some(&h.provider.sign_webhook(&payload)))
        .await;
    assert_eq!(ack, WebhookAck::Processed);

    let status = h.engine.intent_status(created.order_id).await.unwrap();
    assert_eq!(status.status, IntentStatus::Success);
    let seat = h.engine.seat(status.seat_id.unwrap()).await.unwrap();
    assert_eq!(seat.user, h.identities.user_for(&contact(1)));

    let event = h.store.snapshot().await.webhook_events[&fingerprint(&payload)].clone();
    assert_eq!(event.status, WebhookEventStatus::Processed);
    assert_eq!(event.event_type.as_deref(), Some("payment.captured"));
    assert_eq!(event.attempts, 1);
}

#[tokio::test]
async fn test_duplicate_delivery_is_acknowledged_once() {
    let h = Harness::new().await;
    let created = paid_intent(&h, 3).await;
    let payload = payment_captured_payload(created.provider_order_id.as_deref().unwrap(), "pay_1");
    let signature = h.provider.sign_webhook(&payload);

    let first = h.engine.handle_webhook(&payload, Some(&signature)).await;
    let second = h.engine.handle_webhook(&payload, Some(&signature)).await;

    assert_eq!(first, WebhookAck::Processed);
    assert_eq!(second, WebhookAck::Duplicate);
    assert_eq!(h.store.snapshot().await.webhook_events.len(), 1);
    assert_eq!(h.identities.calls(), 1);
}

#[tokio::test]
async fn test_order_paid_event_with_order_entity() {
    let h = Harness::new().await;
    let created = paid_intent(&h, 1).await;
    let payload = serde_json::json!({
        "event": "order.paid",
        "payload": {
            "payment": { "entity": { "id": "pay_9", "order_id": "order_other" } },
            "order": { "entity": { "id": created.provider_order_id.clone().unwrap() } }
        }
    })
    .to_string()
    .into_bytes();

    let ack = h
        .engine
        .handle_webhook(&payload, Some(&h.provider.sign_webhook(&payload)))
        .await;
    assert_eq!(ack, WebhookAck::Processed);
    assert!(h.engine.intent_status(created.order_id).await.unwrap().can_register);
}

#[tokio::test]
async fn test_bad_or_missing_signature_is_rejected_without_record() {
    let h = Harness::new().await;
    let created = paid_intent(&h, 1).await;
    let payload = payment_captured_payload(created.provider_order_id.as_deref().unwrap(), "pay_1");

    let forged = h.engine.handle_webhook(&payload, Some("deadbeef")).await;
    let unsigned = h.engine.handle_webhook(&payload, None).await;

    assert_eq!(forged, WebhookAck::Rejected);
    assert_eq!(unsigned, WebhookAck::Rejected);
    assert!(h.store.snapshot().await.webhook_events.is_empty());
    assert_eq!(
        h.engine.intent_status(created.order_id).await.unwrap().status,
        IntentStatus::Pending
    );
}

#[tokio::test]
async fn test_unhandled_event_type_is_ignored() {
    let h = Harness::new().await;
    let created = paid_intent(&h, 1).await;
    let payload = payment_event_payload("payment.failed", created.provider_order_id.as_deref().unwrap(), "pay_1");
    let signature = h.provider.sign_webhook(&payload);

    let ack = h.engine.handle_webhook(&payload, Some(&signature)).await;
    assert_eq!(ack, WebhookAck::Ignored);

    let event = h.store.snapshot().await.webhook_events[&fingerprint(&payload)].clone();
    assert_eq!(event.status, WebhookEventStatus::Received);
    assert_eq!(event.note.as_deref(), Some("ignored"));
    assert_eq!(
        h.engine.intent_status(created.order_id).await.unwrap().status,
        IntentStatus::Pending
    );

    // Not FAILED, so a redelivery is a duplicate, even past the claim lease
    let again = h.engine.handle_webhook(&payload, Some(&signature)).await;
    assert_eq!(again, WebhookAck::Duplicate);
    h.clock.advance(Duration::seconds(CLAIM_LEASE_SECS + 1));
    let later = h.engine.handle_webhook(&payload, Some(&signature)).await;
    assert_eq!(later, WebhookAck::Duplicate);
}

#[tokio::test]
async fn test_failed_delivery_is_reprocessed_on_retry() {
    let h = Harness::new().await;
    // The mock provider issues order_test_1 to the first intent
    let payload = payment_captured_payload("order_test_1", "pay_1");
    let signature = h.provider.sign_webhook(&payload);

    let early = h.engine.handle_webhook(&payload, Some(&signature)).await;
    assert!(matches!(early, WebhookAck::Failed(ref note) if note.contains("order_test_1")));
    let event = h.store.snapshot().await.webhook_events[&fingerprint(&payload)].clone();
    assert_eq!(event.status, WebhookEventStatus::Failed);

    let created = paid_intent(&h, 1).await;
    assert_eq!(created.provider_order_id.as_deref(), Some("order_test_1"));

    let retried = h.engine.handle_webhook(&payload, Some(&signature)).await;
    assert_eq!(retried, WebhookAck::Processed);

    let event = h.store.snapshot().await.webhook_events[&fingerprint(&payload)].clone();
    assert_eq!(event.status, WebhookEventStatus::Processed);
    assert_eq!(event.attempts, 2);
    assert_eq!(event.note, None);
    assert!(h.engine.intent_status(created.order_id).await.unwrap().can_register);
}

#[tokio::test]
async fn test_malformed_payload_is_recorded_as_failed() {
    let h = Harness::new().await;
    let payload = b"not json".to_vec();
    let signature = h.provider.sign_webhook(&payload);

    let ack = h.engine.handle_webhook(&payload, Some(&signature)).await;
    assert!(matches!(ack, WebhookAck::Failed(_)));
    let event = h.store.snapshot().await.webhook_events[&fingerprint(&payload)].clone();
    assert_eq!(event.status, WebhookEventStatus::Failed);
    assert_eq!(event.event_type, None);
}

#[tokio::test]
async fn test_webhook_for_sold_out_intent_is_processed_as_refund() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    let mut created = Vec::new();
    for n in 1..=2 {
        created.push(
            h.engine
                .create_intent(CreateIntent {
                    spec: h.national(&designation),
                    contact: contact(n),
                    team: None,
                })
                .await
                .unwrap(),
        );
    }

    for (n, intent) in created.iter().enumerate() {
        let payload = payment_captured_payload(intent.provider_order_id.as_deref().unwrap(), &format!("pay_{n}"));
        let ack = h
            .engine
            .handle_webhook(&payload, Some(&h.provider.sign_webhook(&payload)))
            .await;
        assert_eq!(ack, WebhookAck::Processed);
    }

    assert_eq!(
        h.engine.intent_status(created[0].order_id).await.unwrap().status,
        IntentStatus::Success
    );
    assert_eq!(
        h.engine.intent_status(created[1].order_id).await.unwrap().status,
        IntentStatus::RefundRequired
    );
}

#[tokio::test]
async fn test_claim_storage_error_is_acknowledged_as_failed() {
    let h = Harness::new().await;
    let created = paid_intent(&h, 1).await;
    let payload = payment_captured_payload(created.provider_order_id.as_deref().unwrap(), "pay_1");
    let signature = h.provider.sign_webhook(&payload);

    h.store.fail_next(StoreFault::WebhookClaim);
    let ack = h.engine.handle_webhook(&payload, Some(&signature)).await;

    assert!(matches!(ack, WebhookAck::Failed(ref note) if note.contains("ledger")));
    assert!(h.store.snapshot().await.webhook_events.is_empty());
    assert_eq!(
        h.engine.intent_status(created.order_id).await.unwrap().status,
        IntentStatus::Pending
    );

    // Nothing was recorded, so the provider's retry is processed normally
    let retried = h.engine.handle_webhook(&payload, Some(&signature)).await;
    assert_eq!(retried, WebhookAck::Processed);
}

#[tokio::test]
async fn test_begin_failure_is_acknowledged_as_failed() {
    let h = Harness::new().await;
    let payload = payment_captured_payload("order_test_1", "pay_1");
    let signature = h.provider.sign_webhook(&payload);

    h.store.fail_next(StoreFault::Begin);
    let ack = h.engine.handle_webhook(&payload, Some(&signature)).await;

    assert!(matches!(ack, WebhookAck::Failed(_)));
    assert!(h.store.snapshot().await.webhook_events.is_empty());
}

#[tokio::test]
async fn test_lost_outcome_write_is_reclaimed_after_lease() {
    let h = Harness::new().await;
    let created = paid_intent(&h, 1).await;
    let payload = payment_captured_payload(created.provider_order_id.as_deref().unwrap(), "pay_1");
    let signature = h.provider.sign_webhook(&payload);

    h.store.fail_next(StoreFault::WebhookUpdate);
    let ack = h.engine.handle_webhook(&payload, Some(&signature)).await;
    assert!(matches!(ack, WebhookAck::Failed(_)));

    // The claim committed but its outcome did not
    let event = h.store.snapshot().await.webhook_events[&fingerprint(&payload)].clone();
    assert_eq!(event.status, WebhookEventStatus::Received);
    assert_eq!(event.note, None);

    // Inside the lease the claim still belongs to the first delivery
    h.clock.advance(Duration::seconds(CLAIM_LEASE_SECS - 1));
    let early = h.engine.handle_webhook(&payload, Some(&signature)).await;
    assert_eq!(early, WebhookAck::Duplicate);

    h.clock.advance(Duration::seconds(2));
    let retried = h.engine.handle_webhook(&payload, Some(&signature)).await;
    assert_eq!(retried, WebhookAck::Processed);

    let event = h.store.snapshot().await.webhook_events[&fingerprint(&payload)].clone();
    assert_eq!(event.status, WebhookEventStatus::Processed);
    assert_eq!(event.attempts, 2);
    assert!(h.engine.intent_status(created.order_id).await.unwrap().can_register);
}
