//! Fee resolution, discounts and card eligibility against the in-memory store

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::Duration;
use seat_engine_core::SeatError;
use seat_engine_core::discount::DiscountStatus;
use seat_engine_core::engine::{ConfirmPayment, ConfirmStatus, CreateIntent, NewDiscount, NewFeeOverride};
use seat_engine_core::environment::Clock;
use seat_engine_core::fee::{FeeScope, FeeSource};
use seat_engine_core::pricing::QuoteRequest;
use seat_engine_core::spec::SeatSpec;
use seat_engine_core::types::{ContactNumber, Currency, Money, Purpose, TeamId, UserId};
use seat_engine_testing::{Harness, contact};

fn membership(spec: SeatSpec, team: Option<TeamId>, who: Option<ContactNumber>) -> QuoteRequest {
    QuoteRequest {
        purpose: Purpose::membership(),
        spec,
        team,
        contact: who,
    }
}

async fn fee_override(h: &Harness, scope: FeeScope, amount: u64) {
    h.engine
        .create_fee_override(NewFeeOverride {
            purpose: Purpose::membership(),
            scope,
            amount: Money::from_minor(amount),
            currency: Currency::inr(),
            renewal_interval_months: Some(12),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_designation_fee_without_overrides() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;

    let quote = h
        .engine
        .quote(&membership(h.national(&designation), None, None))
        .await
        .unwrap();

    assert_eq!(quote.amount, Money::from_minor(50_000));
    assert_eq!(quote.source, FeeSource::Designation);
    assert_eq!(quote.currency, Currency::inr());
    assert_eq!(quote.renewal_interval_months, Some(12));
    assert_eq!(quote.override_id, None);
}

#[tokio::test]
async fn test_designation_fee_uses_settings_currency() {
    let h = Harness::new().await;
    h.settings("USD", Some(6)).await;
    let designation = h.designation(1, 50_000).await;

    let quote = h
        .engine
        .quote(&membership(h.national(&designation), None, None))
        .await
        .unwrap();

    assert_eq!(quote.currency.as_str(), "USD");
    assert_eq!(quote.renewal_interval_months, Some(6));
}

#[tokio::test]
async fn test_most_specific_override_wins() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    let team = TeamId::new();
    fee_override(&h, FeeScope::Global, 40_000).await;
    fee_override(&h, FeeScope::State(h.state), 30_000).await;
    fee_override(&h, FeeScope::District(h.district), 20_000).await;
    fee_override(&h, FeeScope::Mandal(h.mandal), 10_000).await;
    fee_override(&h, FeeScope::Team(team), 5_000).await;

    let cases = [
        (h.mandal_spec(&designation), Some(team), 5_000, FeeSource::Team),
        (h.mandal_spec(&designation), None, 10_000, FeeSource::Mandal),
        (h.district_spec(&designation), None, 20_000, FeeSource::District),
        (h.state_spec(&designation), None, 30_000, FeeSource::State),
        (h.national(&designation), None, 40_000, FeeSource::Global),
        (h.national(&designation), Some(TeamId::new()), 40_000, FeeSource::Global),
    ];
    for (spec, team, amount, source) in cases {
        let quote = h.engine.quote(&membership(spec, team, None)).await.unwrap();
        assert_eq!(quote.amount, Money::from_minor(amount), "{source:?}");
        assert_eq!(quote.source, source);
        assert!(quote.override_id.is_some());
    }
}

#[tokio::test]
async fn test_overrides_are_scoped_by_purpose() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    h.engine
        .create_fee_override(NewFeeOverride {
            purpose: Purpose::parse("donation").unwrap(),
            scope: FeeScope::Global,
            amount: Money::from_minor(100),
            currency: Currency::inr(),
            renewal_interval_months: None,
        })
        .await
        .unwrap();

    let quote = h
        .engine
        .quote(&membership(h.national(&designation), None, None))
        .await
        .unwrap();
    assert_eq!(quote.source, FeeSource::Designation);
}

#[tokio::test]
async fn test_oldest_override_wins_within_a_tier() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    fee_override(&h, FeeScope::Global, 40_000).await;
    h.clock.advance(Duration::minutes(5));
    fee_override(&h, FeeScope::Global, 10_000).await;

    let quote = h
        .engine
        .quote(&membership(h.national(&designation), None, None))
        .await
        .unwrap();
    assert_eq!(quote.amount, Money::from_minor(40_000));
}

#[tokio::test]
async fn test_intent_charges_override_fee() {
    let h = Harness::new().await;
    let designation = h.designation(1, 50_000).await;
    fee_override(&h, FeeScope::State(h.state), 12_345).await;

    let created = h
        .engine
        .create_intent(CreateIntent {
            spec: h.mandal_spec(&designation),
            contact: contact(1),
            team: None,
        })
        .await
        .unwrap();
    assert_eq!(created.amount, Money::from_minor(12_345));
    assert_eq!(created.quote.source, FeeSource::State);
}

#[tokio::test]
async fn test_discount_floor_rounding() {
    let h = Harness::new().await;
    let designation = h.designation(1, 999).await;
    let who = contact(3);
    h.engine
        .create_discount(NewDiscount {
            contact: who.clone(),
            percent_off: 15,
            active_from: None,
            active_to: None,
        })
        .await
        .unwrap();

    let quote = h
        .engine
        .quote(&membership(h.national(&designation), None, Some(who)))
        .await
        .unwrap();
    let applied = quote.discount.unwrap();
    // floor(999 × 15 / 100) = 149
    assert_eq!(applied.discount_amount, Money::from_minor(149));
    assert_eq!(quote.amount, Money::from_minor(850));
    assert_eq!(quote.base_amount, Money::from_minor(999));
}

#[tokio::test]
async fn test_discount_outside_window_is_not_applied() {
    let h = Harness::new().await;
    let designation = h.designation(1, 10_000).await;
    let who = contact(4);
    let now = h.clock.now();
    h.engine
        .create_discount(NewDiscount {
            contact: who.clone(),
            percent_off: 50,
            active_from: Some(now + Duration::days(1)),
            active_to: Some(now + Duration::days(10)),
        })
        .await
        .unwrap();

    let request = membership(h.national(&designation), None, Some(who));
    assert!(h.engine.quote(&request).await.unwrap().discount.is_none());

    h.clock.advance(Duration::days(2));
    assert_eq!(
        h.engine.quote(&request).await.unwrap().amount,
        Money::from_minor(5_000)
    );

    h.clock.advance(Duration::days(30));
    assert!(h.engine.quote(&request).await.unwrap().discount.is_none());
}

#[tokio::test]
async fn test_one_held_discount_per_contact() {
    let h = Harness::new().await;
    let who = contact(5);
    let new = |pct| NewDiscount {
        contact: who.clone(),
        percent_off: pct,
        active_from: None,
        active_to: None,
    };

    let first = h.engine.create_discount(new(10)).await.unwrap();
    let err = h.engine.create_discount(new(20)).await.unwrap_err();
    assert!(matches!(err, SeatError::Conflict(_)));

    h.engine
        .update_discount_status(first.id, DiscountStatus::Cancelled)
        .await
        .unwrap();
    let second = h.engine.create_discount(new(20)).await.unwrap();

    // Re-activating the cancelled one would make two held discounts
    let err = h
        .engine
        .update_discount_status(first.id, DiscountStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, SeatError::Conflict(_)));
    assert_eq!(second.status, DiscountStatus::Active);
}

#[tokio::test]
async fn test_discount_validation() {
    let h = Harness::new().await;
    let now = h.clock.now();
    for pct in [0, 101] {
        let err = h
            .engine
            .create_discount(NewDiscount {
                contact: contact(6),
                percent_off: pct,
                active_from: None,
                active_to: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SeatError::Validation(_)));
    }

    let err = h
        .engine
        .create_discount(NewDiscount {
            contact: contact(6),
            percent_off: 10,
            active_from: Some(now),
            active_to: Some(now - Duration::days(1)),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SeatError::Validation(_)));
}

#[tokio::test]
async fn test_redeemed_discount_is_final() {
    let h = Harness::new().await;
    let discount = h
        .engine
        .create_discount(NewDiscount {
            contact: contact(7),
            percent_off: 10,
            active_from: None,
            active_to: None,
        })
        .await
        .unwrap();
    h.engine
        .update_discount_status(discount.id, DiscountStatus::Redeemed)
        .await
        .unwrap();

    let err = h
        .engine
        .update_discount_status(discount.id, DiscountStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, SeatError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_card_eligibility_needs_photo_and_active_seat() {
    let h = Harness::new().await;
    let designation = h.designation(1, 0).await;
    let who = contact(8);
    let created = h
        .engine
        .create_intent(CreateIntent {
            spec: h.national(&designation),
            contact: who.clone(),
            team: None,
        })
        .await
        .unwrap();
    let seat_id = h
        .engine
        .confirm(ConfirmPayment {
            order_id: created.order_id,
            status: ConfirmStatus::Success,
            provider_payment_ref: None,
            provider_signature: None,
            reason: None,
        })
        .await
        .unwrap()
        .seat_id
        .unwrap();
    let user = h.identities.user_for(&who).unwrap();

    let without_photo = h.engine.card_eligibility(user, seat_id).await.unwrap();
    assert!(without_photo.seat_active);
    assert!(!without_photo.has_photo);
    assert!(!without_photo.eligible);

    h.profiles.set_photo(user, true);
    assert!(h.engine.card_eligibility(user, seat_id).await.unwrap().eligible);

    h.engine.revoke_seat(seat_id).await.unwrap();
    let revoked = h.engine.card_eligibility(user, seat_id).await.unwrap();
    assert!(!revoked.seat_active);
    assert!(!revoked.eligible);

    let stranger = h.engine.card_eligibility(UserId::new(), seat_id).await.unwrap_err();
    assert!(matches!(stranger, SeatError::NotFound { .. }));
}
