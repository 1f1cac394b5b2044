//! Capacity, reservation and seat lifecycle against the in-memory store

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::panic)]

use chrono::Duration;
use futures::future::join_all;
use seat_engine_core::SeatError;
use seat_engine_core::capacity::RejectionReason;
use seat_engine_core::lifecycle::ReassignOutcome;
use seat_engine_core::reservation::ReservationOutcome;
use seat_engine_core::seat::{PaymentStatus, SeatStatus};
use seat_engine_core::spec::{GeoScope, OrgLevel};
use seat_engine_core::types::{Money, SeatId, UserId};
use seat_engine_testing::Harness;
use std::collections::BTreeSet;

fn accepted_sequence(outcome: &ReservationOutcome) -> u32 {
    match outcome {
        ReservationOutcome::Accepted { seat_sequence, .. } => *seat_sequence,
        ReservationOutcome::Rejected { reason } => panic!("expected a seat, got {reason:?}"),
    }
}

#[tokio::test]
async fn test_free_reservation_waits_for_approval() {
    let h = Harness::new().await;
    let designation = h.designation(3, 0).await;

    let outcome = h
        .engine
        .reserve_seat(Some(UserId::new()), h.state_spec(&designation), None)
        .await
        .unwrap();

    match outcome {
        ReservationOutcome::Accepted {
            seat_sequence,
            requires_payment,
            status,
            fee,
            ..
        } => {
            assert_eq!(seat_sequence, 1);
            assert!(!requires_payment);
            assert_eq!(status, SeatStatus::PendingApproval);
            assert_eq!(fee, Money::ZERO);
        }
        ReservationOutcome::Rejected { reason } => panic!("unexpected rejection {reason:?}"),
    }
    assert!(h.store.snapshot().await.seat_payments.is_empty());
}

#[tokio::test]
async fn test_paid_reservation_opens_pending_ledger_row() {
    let h = Harness::new().await;
    let designation = h.designation(3, 25_000).await;

    let outcome = h
        .engine
        .reserve_seat(None, h.national(&designation), None)
        .await
        .unwrap();

    let seat = h.engine.seat(outcome.seat_id().unwrap()).await.unwrap();
    assert_eq!(seat.status, SeatStatus::PendingPayment);
    assert_eq!(seat.payment_status, PaymentStatus::Pending);
    assert_eq!(seat.amount_paid, Money::ZERO);

    let ledger = h.store.snapshot().await.seat_payments;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].amount, Money::from_minor(25_000));
    assert_eq!(ledger[0].status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_full_designation_rejects() {
    let h = Harness::new().await;
    let designation = h.designation(2, 0).await;
    let spec = h.mandal_spec(&designation);

    for _ in 0..2 {
        h.engine.reserve_seat(None, spec.clone(), None).await.unwrap();
    }
    let outcome = h.engine.reserve_seat(None, spec.clone(), None).await.unwrap();

    assert_eq!(
        outcome,
        ReservationOutcome::Rejected {
            reason: RejectionReason::NoSeatsDesignation
        }
    );
    let report = h.engine.availability(&spec).await.unwrap();
    assert_eq!(report.designation.used, 2);
    assert_eq!(report.designation.remaining, 0);
}

#[tokio::test]
async fn test_buckets_are_independent_per_location() {
    let h = Harness::new().await;
    let designation = h.designation(1, 0).await;

    h.engine
        .reserve_seat(None, h.zone(&designation, "SOUTH"), None)
        .await
        .unwrap();
    let other_zone = h
        .engine
        .reserve_seat(None, h.zone(&designation, "NORTH"), None)
        .await
        .unwrap();
    let other_level = h
        .engine
        .reserve_seat(None, h.state_spec(&designation), None)
        .await
        .unwrap();

    assert_eq!(accepted_sequence(&other_zone), 1);
    assert_eq!(accepted_sequence(&other_level), 1);
}

#[tokio::test]
async fn test_aggregate_cap_spans_designations() {
    let h = Harness::new().await;
    let secretary = h.designation(5, 0).await;
    let treasurer = h.designation(5, 0).await;
    h.aggregate_cap(&h.district_spec(&secretary), 3).await;

    h.engine
        .reserve_seat(None, h.district_spec(&secretary), None)
        .await
        .unwrap();
    h.engine
        .reserve_seat(None, h.district_spec(&secretary), None)
        .await
        .unwrap();
    h.engine
        .reserve_seat(None, h.district_spec(&treasurer), None)
        .await
        .unwrap();

    let outcome = h
        .engine
        .reserve_seat(None, h.district_spec(&secretary), None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReservationOutcome::Rejected {
            reason: RejectionReason::NoSeatsLevelAggregate
        }
    );

    let report = h.engine.availability(&h.district_spec(&treasurer)).await.unwrap();
    assert_eq!(report.designation.remaining, 4);
    let aggregate = report.aggregate.unwrap();
    assert_eq!(aggregate.used, 3);
    assert_eq!(aggregate.remaining, 0);
    assert_eq!(report.rejection(), Some(RejectionReason::NoSeatsLevelAggregate));
}

#[tokio::test]
async fn test_concurrent_reservations_never_oversell() {
    let h = Harness::new().await;
    let designation = h.designation(5, 0).await;
    let spec = h.state_spec(&designation);

    let tasks = (0..25).map(|_| {
        let engine = h.engine.clone();
        let spec = spec.clone();
        tokio::spawn(async move { engine.reserve_seat(None, spec, None).await })
    });
    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let sequences: BTreeSet<u32> = outcomes
        .iter()
        .filter(|o| o.seat_id().is_some())
        .map(accepted_sequence)
        .collect();
    assert_eq!(sequences, (1..=5).collect());
    assert_eq!(outcomes.iter().filter(|o| o.seat_id().is_none()).count(), 20);
    assert_eq!(h.store.live_seats(&spec.seat_bucket()).await.len(), 5);
}

#[tokio::test]
async fn test_revoked_sequence_is_reused() {
    let h = Harness::new().await;
    let designation = h.designation(3, 0).await;
    let spec = h.national(&designation);

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            h.engine
                .reserve_seat(None, spec.clone(), None)
                .await
                .unwrap()
                .seat_id()
                .unwrap(),
        );
    }
    let revoked = h.engine.revoke_seat(ids[1]).await.unwrap();
    assert_eq!(revoked.status, SeatStatus::Revoked);

    let outcome = h.engine.reserve_seat(None, spec, None).await.unwrap();
    assert_eq!(accepted_sequence(&outcome), 2);
}

#[tokio::test]
async fn test_revoking_twice_is_invalid() {
    let h = Harness::new().await;
    let designation = h.designation(1, 10_000).await;
    let id = h
        .engine
        .reserve_seat(None, h.national(&designation), None)
        .await
        .unwrap()
        .seat_id()
        .unwrap();

    let revoked = h.engine.revoke_seat(id).await.unwrap();
    assert_eq!(revoked.payment_status, PaymentStatus::Failed);

    let err = h.engine.revoke_seat(id).await.unwrap_err();
    assert!(matches!(err, SeatError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_approve_then_expire_frees_capacity() {
    let h = Harness::new().await;
    let designation = h.designation_with_validity(1, 0, 30).await;
    let spec = h.national(&designation);

    let id = h
        .engine
        .reserve_seat(None, spec.clone(), None)
        .await
        .unwrap()
        .seat_id()
        .unwrap();
    let seat = h.engine.approve_seat(id).await.unwrap();
    assert_eq!(seat.status, SeatStatus::Active);
    assert_eq!(seat.expires_at, Some(seat.activated_at.unwrap() + Duration::days(30)));

    let again = h.engine.approve_seat(id).await.unwrap_err();
    assert!(matches!(again, SeatError::InvalidTransition { .. }));

    assert!(h.engine.expire_due().await.unwrap().is_empty());
    h.clock.advance(Duration::days(30));
    assert_eq!(h.engine.expire_due().await.unwrap(), vec![id]);
    assert_eq!(h.engine.seat(id).await.unwrap().status, SeatStatus::Expired);

    let outcome = h.engine.reserve_seat(None, spec, None).await.unwrap();
    assert_eq!(accepted_sequence(&outcome), 1);
}

#[tokio::test]
async fn test_reassign_charges_the_difference() {
    let h = Harness::new().await;
    let member = h.designation(2, 10_000).await;
    let leader = h.designation(1, 30_000).await;

    let id = h
        .engine
        .reserve_seat(None, h.national(&member), None)
        .await
        .unwrap()
        .seat_id()
        .unwrap();

    let outcome = h
        .engine
        .reassign_seat(id, h.national(&leader), None)
        .await
        .unwrap();
    let ReassignOutcome::Accepted { seat, delta_due } = outcome else {
        panic!("expected the reassignment to succeed");
    };
    assert_eq!(seat.spec.designation, leader.id);
    assert_eq!(seat.seat_sequence, 1);
    assert_eq!(seat.fee, Money::from_minor(30_000));
    assert_eq!(delta_due, Money::from_minor(30_000));
    assert_eq!(seat.payment_status, PaymentStatus::Pending);

    // The source bucket is free again
    let report = h.engine.availability(&h.national(&member)).await.unwrap();
    assert_eq!(report.designation.used, 0);

    let other = h
        .engine
        .reserve_seat(None, h.national(&member), None)
        .await
        .unwrap()
        .seat_id()
        .unwrap();
    let rejected = h
        .engine
        .reassign_seat(other, h.national(&leader), None)
        .await
        .unwrap();
    assert_eq!(
        rejected,
        ReassignOutcome::Rejected {
            reason: RejectionReason::NoSeatsDesignation
        }
    );
}

async fn pending_amounts(h: &Harness, seat: SeatId) -> Vec<u64> {
    h.store
        .snapshot()
        .await
        .seat_payments
        .iter()
        .filter(|p| p.seat == seat && p.status == PaymentStatus::Pending)
        .map(|p| p.amount.minor())
        .collect()
}

#[tokio::test]
async fn test_reassign_supersedes_the_open_charge() {
    let h = Harness::new().await;
    let member = h.designation(2, 10_000).await;
    let leader = h.designation(1, 30_000).await;
    let free = h.designation(1, 0).await;

    let id = h
        .engine
        .reserve_seat(None, h.national(&member), None)
        .await
        .unwrap()
        .seat_id()
        .unwrap();
    assert_eq!(pending_amounts(&h, id).await, vec![10_000]);

    let outcome = h.engine.reassign_seat(id, h.national(&leader), None).await.unwrap();
    assert!(matches!(outcome, ReassignOutcome::Accepted { .. }));
    assert_eq!(pending_amounts(&h, id).await, vec![30_000]);

    let ReassignOutcome::Accepted { seat, delta_due } =
        h.engine.reassign_seat(id, h.national(&free), None).await.unwrap()
    else {
        panic!("expected the move to the free designation to succeed");
    };
    assert_eq!(delta_due, Money::ZERO);
    assert_eq!(seat.fee, Money::ZERO);
    assert_eq!(seat.status, SeatStatus::PendingApproval);
    assert_eq!(seat.payment_status, PaymentStatus::NotRequired);
    assert!(pending_amounts(&h, id).await.is_empty());

    let failed = h
        .store
        .snapshot()
        .await
        .seat_payments
        .iter()
        .filter(|p| p.seat == id && p.status == PaymentStatus::Failed)
        .count();
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn test_reassign_free_seat_to_paid_waits_for_payment() {
    let h = Harness::new().await;
    let free = h.designation(1, 0).await;
    let member = h.designation(1, 10_000).await;

    let id = h
        .engine
        .reserve_seat(None, h.national(&free), None)
        .await
        .unwrap()
        .seat_id()
        .unwrap();

    let ReassignOutcome::Accepted { seat, delta_due } =
        h.engine.reassign_seat(id, h.national(&member), None).await.unwrap()
    else {
        panic!("expected the reassignment to succeed");
    };
    assert_eq!(delta_due, Money::from_minor(10_000));
    assert_eq!(seat.status, SeatStatus::PendingPayment);
    assert_eq!(seat.payment_status, PaymentStatus::Pending);
    assert_eq!(pending_amounts(&h, id).await, vec![10_000]);
}

#[tokio::test]
async fn test_revoke_closes_the_open_charge() {
    let h = Harness::new().await;
    let designation = h.designation(1, 10_000).await;
    let id = h
        .engine
        .reserve_seat(None, h.national(&designation), None)
        .await
        .unwrap()
        .seat_id()
        .unwrap();

    let revoked = h.engine.revoke_seat(id).await.unwrap();

    assert_eq!(revoked.payment_status, PaymentStatus::Failed);
    assert!(pending_amounts(&h, id).await.is_empty());
}

#[tokio::test]
async fn test_reassign_within_same_level_ignores_own_aggregate_slot() {
    let h = Harness::new().await;
    let member = h.designation(2, 0).await;
    let leader = h.designation(1, 0).await;
    h.aggregate_cap(&h.state_spec(&member), 1).await;

    let id = h
        .engine
        .reserve_seat(None, h.state_spec(&member), None)
        .await
        .unwrap()
        .seat_id()
        .unwrap();

    let outcome = h
        .engine
        .reassign_seat(id, h.state_spec(&leader), None)
        .await
        .unwrap();
    assert!(matches!(outcome, ReassignOutcome::Accepted { delta_due, .. } if delta_due.is_zero()));
}

#[tokio::test]
async fn test_reassign_to_own_bucket_is_rejected() {
    let h = Harness::new().await;
    let designation = h.designation(2, 0).await;
    let id = h
        .engine
        .reserve_seat(None, h.national(&designation), None)
        .await
        .unwrap()
        .seat_id()
        .unwrap();

    let err = h
        .engine
        .reassign_seat(id, h.national(&designation), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SeatError::Validation(_)));
}

#[tokio::test]
async fn test_unknown_designation_is_not_found() {
    let h = Harness::new().await;
    let designation = h.designation(1, 0).await;
    let mut spec = h.national(&designation);
    spec.designation = seat_engine_core::types::DesignationId::new();

    let err = h.engine.availability(&spec).await.unwrap_err();
    assert!(matches!(err, SeatError::NotFound { resource: "Designation", .. }));
}

#[tokio::test]
async fn test_unknown_location_is_not_found() {
    let h = Harness::new().await;
    let designation = h.designation(1, 0).await;
    let mut spec = h.at_level(&designation, OrgLevel::Mandal);
    spec.scope = GeoScope::Mandal {
        mandal: seat_engine_core::types::MandalId::new(),
    };

    let err = h.engine.reserve_seat(None, spec, None).await.unwrap_err();
    assert!(matches!(err, SeatError::NotFound { .. }));
}
