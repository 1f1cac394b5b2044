//! Payment intents, confirmation and finalization against the in-memory store

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use seat_engine_core::SeatError;
use seat_engine_core::catalog::Designation;
use seat_engine_core::discount::DiscountStatus;
use seat_engine_core::engine::{ConfirmOutcome, ConfirmPayment, ConfirmStatus, CreateIntent, IntentCreated, NewDiscount};
use seat_engine_core::intent::IntentStatus;
use seat_engine_core::seat::{PaymentStatus, SeatStatus};
use seat_engine_core::settings::EngineConfig;
use seat_engine_core::types::{ContactNumber, Money};
use seat_engine_testing::provider::payment_captured_payload;
use seat_engine_testing::{Harness, contact};

async fn open_intent(h: &Harness, designation: &Designation, who: &ContactNumber) -> IntentCreated {
    h.engine
        .create_intent(CreateIntent {
            spec: h.national(designation),
            contact: who.clone(),
            team: None,
        })
        .await
        .unwrap()
}

fn signed_success(h: &Harness, created: &IntentCreated, payment_ref: &str) -> ConfirmPayment {
    let order = created.provider_order_id.clone().unwrap();
    ConfirmPayment {
        order_id: created.order_id,
        status: ConfirmStatus::Success,
        provider_payment_ref: Some(payment_ref.to_string()),
        provider_signature: Some(h.provider.sign_payment(&order, payment_ref)),
        reason: None,
    }
}

fn failure(created: &IntentCreated) -> ConfirmPayment {
    ConfirmPayment {
        order_id: created.order_id,
        status: ConfirmStatus::Failed,
        provider_payment_ref: None,
        provider_signature: None,
        reason: Some("user cancelled".to_string()),
    }
}

#[tokio::test]
async fn test_happy_path_allocates_active_seat() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    let who = contact(1);

    let created = open_intent(&h, &designation, &who).await;
    assert_eq!(created.amount, Money::from_minor(50_000));
    assert_eq!(created.provider_order_id.as_deref(), Some("order_test_1"));
    assert_eq!(h.provider.orders()[0].amount, Money::from_minor(50_000));

    let pending = h.engine.intent_status(created.order_id).await.unwrap();
    assert_eq!(pending.status, IntentStatus::Pending);
    assert!(!pending.can_register);

    let outcome = h.engine.confirm(signed_success(&h, &created, "pay_1")).await.unwrap();
    assert_eq!(outcome.status, IntentStatus::Success);
    let seat_id = outcome.seat_id.unwrap();

    let status = h.engine.intent_status(created.order_id).await.unwrap();
    assert!(status.can_register);
    assert_eq!(status.seat_id, Some(seat_id));

    let seat = h.engine.seat(seat_id).await.unwrap();
    assert_eq!(seat.status, SeatStatus::Active);
    assert_eq!(seat.payment_status, PaymentStatus::Success);
    assert_eq!(seat.amount_paid, Money::from_minor(50_000));
    assert_eq!(seat.intent, Some(created.order_id));
    assert_eq!(seat.user, h.identities.user_for(&who));
    assert!(seat.expires_at.is_some());

    let ledger = h.store.snapshot().await.seat_payments;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].status, PaymentStatus::Success);
    assert_eq!(ledger[0].provider_ref.as_deref(), Some("pay_1"));

    // Capacity 1 is now taken
    let err = h
        .engine
        .create_intent(CreateIntent {
            spec: h.national(&designation),
            contact: contact(2),
            team: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err, SeatError::SoldOut);
}

#[tokio::test]
async fn test_repeated_confirm_returns_same_seat() {
    let h = Harness::new().await;
    let designation = h.designation(3, 50_000).await;
    let created = open_intent(&h, &designation, &contact(1)).await;

    let first = h.engine.confirm(signed_success(&h, &created, "pay_1")).await.unwrap();
    let second = h.engine.confirm(signed_success(&h, &created, "pay_1")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.store.live_seats(&h.national(&designation).seat_bucket()).await.len(), 1);

    let finalized = h.engine.finalize(created.order_id, None).await.unwrap();
    assert_eq!(finalized.intent().seat, first.seat_id);
}

#[tokio::test]
async fn test_concurrent_confirm_and_webhook_allocate_once() {
    let h = Harness::new().await;
    let designation = h.designation(3, 50_000).await;
    let created = open_intent(&h, &designation, &contact(1)).await;
    let order = created.provider_order_id.clone().unwrap();

    let payload = payment_captured_payload(&order, "pay_1");
    let signature = h.provider.sign_webhook(&payload);

    let engine = h.engine.clone();
    let confirm = signed_success(&h, &created, "pay_1");
    let client = tokio::spawn(async move { engine.confirm(confirm).await });
    let engine = h.engine.clone();
    let webhook = tokio::spawn(async move { engine.handle_webhook(&payload, Some(&signature)).await });

    let confirmed = client.await.unwrap().unwrap();
    let ack = webhook.await.unwrap();

    assert_eq!(ack, seat_engine_core::engine::WebhookAck::Processed);
    assert_eq!(confirmed.status, IntentStatus::Success);
    let status = h.engine.intent_status(created.order_id).await.unwrap();
    assert_eq!(status.seat_id, confirmed.seat_id);
    assert_eq!(h.store.live_seats(&h.national(&designation).seat_bucket()).await.len(), 1);
    assert_eq!(h.identities.len(), 1);
}

#[tokio::test]
async fn test_sold_out_after_payment_requires_refund() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;

    // Both intents pass the early capacity check
    let first = open_intent(&h, &designation, &contact(1)).await;
    let second = open_intent(&h, &designation, &contact(2)).await;

    let won = h.engine.confirm(signed_success(&h, &first, "pay_1")).await.unwrap();
    assert_eq!(won.status, IntentStatus::Success);

    let lost = h.engine.confirm(signed_success(&h, &second, "pay_2")).await.unwrap();
    assert_eq!(
        lost,
        ConfirmOutcome {
            status: IntentStatus::RefundRequired,
            seat_id: None,
        }
    );

    let status = h.engine.intent_status(second.order_id).await.unwrap();
    assert_eq!(status.status, IntentStatus::RefundRequired);
    assert!(!status.can_register);

    // Stays refund-required on retry
    let retried = h.engine.confirm(signed_success(&h, &second, "pay_2")).await.unwrap();
    assert_eq!(retried.status, IntentStatus::RefundRequired);
    assert_eq!(h.store.live_seats(&h.national(&designation).seat_bucket()).await.len(), 1);
}

#[tokio::test]
async fn test_confirm_without_signature_is_refused() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    let created = open_intent(&h, &designation, &contact(1)).await;

    let mut request = signed_success(&h, &created, "pay_1");
    request.provider_signature = None;
    let err = h.engine.confirm(request).await.unwrap_err();
    assert_eq!(err, SeatError::MissingPgSignature);

    let status = h.engine.intent_status(created.order_id).await.unwrap();
    assert_eq!(status.status, IntentStatus::Pending);
}

#[tokio::test]
async fn test_confirm_without_signature_when_not_required() {
    let config = EngineConfig {
        require_payment_signature: false,
        ..EngineConfig::default()
    };
    let h = Harness::with_config(config).await;
    let designation = h.designation(1, 50_000).await;
    let created = open_intent(&h, &designation, &contact(1)).await;

    let mut request = signed_success(&h, &created, "pay_1");
    request.provider_signature = None;
    let outcome = h.engine.confirm(request).await.unwrap();
    assert_eq!(outcome.status, IntentStatus::Success);
}

#[tokio::test]
async fn test_tampered_signature_changes_nothing() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    let created = open_intent(&h, &designation, &contact(1)).await;

    let mut request = signed_success(&h, &created, "pay_1");
    request.provider_payment_ref = Some("pay_forged".to_string());
    let err = h.engine.confirm(request).await.unwrap_err();
    assert_eq!(err, SeatError::InvalidSignature);

    let status = h.engine.intent_status(created.order_id).await.unwrap();
    assert_eq!(status.status, IntentStatus::Pending);
    assert!(h.identities.is_empty());
}

#[tokio::test]
async fn test_failed_intent_cannot_succeed() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    let created = open_intent(&h, &designation, &contact(1)).await;

    let failed = h.engine.confirm(failure(&created)).await.unwrap();
    assert_eq!(failed.status, IntentStatus::Failed);
    // A repeated failure report is a no-op
    assert_eq!(h.engine.confirm(failure(&created)).await.unwrap(), failed);

    let err = h.engine.confirm(signed_success(&h, &created, "pay_1")).await.unwrap_err();
    assert!(matches!(err, SeatError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_late_failure_does_not_regress_success() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    let created = open_intent(&h, &designation, &contact(1)).await;

    let success = h.engine.confirm(signed_success(&h, &created, "pay_1")).await.unwrap();
    let late = h.engine.confirm(failure(&created)).await.unwrap();
    assert_eq!(late, success);
}

#[tokio::test]
async fn test_free_seat_skips_provider() {
    let h = Harness::new().await;
    let designation = h.designation(1, 0).await;
    let created = open_intent(&h, &designation, &contact(1)).await;

    assert!(created.amount.is_zero());
    assert_eq!(created.provider_order_id, None);
    assert!(h.provider.orders().is_empty());

    let outcome = h
        .engine
        .confirm(ConfirmPayment {
            order_id: created.order_id,
            status: ConfirmStatus::Success,
            provider_payment_ref: None,
            provider_signature: None,
            reason: None,
        })
        .await
        .unwrap();
    assert_eq!(outcome.status, IntentStatus::Success);
    assert!(h.store.snapshot().await.seat_payments.is_empty());
}

#[tokio::test]
async fn test_provider_outage_leaves_no_intent() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    h.provider.fail_orders(true);

    let err = h
        .engine
        .create_intent(CreateIntent {
            spec: h.national(&designation),
            contact: contact(1),
            team: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SeatError::Provider(_)));
    assert!(h.store.snapshot().await.intents.is_empty());
}

#[tokio::test]
async fn test_discount_is_reserved_then_redeemed() {
    let h = Harness::new().await;
    let designation = h.designation(2, 50_000).await;
    let who = contact(1);
    let discount = h
        .engine
        .create_discount(NewDiscount {
            contact: who.clone(),
            percent_off: 30,
            active_from: None,
            active_to: None,
        })
        .await
        .unwrap();

    let created = open_intent(&h, &designation, &who).await;
    assert_eq!(created.amount, Money::from_minor(35_000));
    let applied = created.quote.discount.clone().unwrap();
    assert_eq!(applied.discount_id, discount.id);
    assert_eq!(applied.discount_amount, Money::from_minor(15_000));
    assert_eq!(
        h.store.snapshot().await.discounts[&discount.id].status,
        DiscountStatus::Reserved
    );

    // A reserved discount is not offered to a second intent
    let again = open_intent(&h, &designation, &who).await;
    assert_eq!(again.amount, Money::from_minor(50_000));
    assert!(again.quote.discount.is_none());

    h.engine.confirm(signed_success(&h, &created, "pay_1")).await.unwrap();
    assert_eq!(
        h.store.snapshot().await.discounts[&discount.id].status,
        DiscountStatus::Redeemed
    );
    let seat = h.engine.seat(h.engine.intent_status(created.order_id).await.unwrap().seat_id.unwrap()).await.unwrap();
    assert_eq!(seat.amount_paid, Money::from_minor(35_000));
}

#[tokio::test]
async fn test_failed_intent_releases_discount() {
    let h = Harness::new().await;
    let designation = h.designation(2, 50_000).await;
    let who = contact(1);
    let discount = h
        .engine
        .create_discount(NewDiscount {
            contact: who.clone(),
            percent_off: 100,
            active_from: None,
            active_to: None,
        })
        .await
        .unwrap();

    let created = open_intent(&h, &designation, &who).await;
    assert!(created.amount.is_zero());
    h.engine.confirm(failure(&created)).await.unwrap();

    assert_eq!(
        h.store.snapshot().await.discounts[&discount.id].status,
        DiscountStatus::Active
    );
    let retry = open_intent(&h, &designation, &who).await;
    assert_eq!(retry.quote.discount.map(|d| d.discount_id), Some(discount.id));
}

#[tokio::test]
async fn test_refund_releases_discount() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    let who = contact(2);
    let discount = h
        .engine
        .create_discount(NewDiscount {
            contact: who.clone(),
            percent_off: 10,
            active_from: None,
            active_to: None,
        })
        .await
        .unwrap();

    let winner = open_intent(&h, &designation, &contact(1)).await;
    let loser = open_intent(&h, &designation, &who).await;
    h.engine.confirm(signed_success(&h, &winner, "pay_1")).await.unwrap();
    let lost = h.engine.confirm(signed_success(&h, &loser, "pay_2")).await.unwrap();

    assert_eq!(lost.status, IntentStatus::RefundRequired);
    assert_eq!(
        h.store.snapshot().await.discounts[&discount.id].status,
        DiscountStatus::Active
    );
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let h = Harness::new().await;
    let err = h
        .engine
        .intent_status(seat_engine_core::types::IntentId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SeatError::NotFound { resource: "PaymentIntent", .. }));
}
