//! Seat reservation.
//!
//! A reservation takes the level bucket lock, re-reads both counts and
//! inserts the seat in the same transaction. Counts decide admission; the
//! sequence number is only a display label and is allocated afterwards.

use crate::capacity::{self, RejectionReason};
use crate::error::Result;
use crate::seat::{PaymentStatus, Seat, SeatPayment, SeatStatus};
use crate::spec::SeatSpec;
use crate::store::SeatTransaction;
use crate::types::{IntentId, Money, SeatId, SeatPaymentId, UserId};
use chrono::{DateTime, Utc};

/// How the reserved seat should start out
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationMode {
    /// Provisional seat: PENDING_PAYMENT, or PENDING_APPROVAL when free
    Provisional,
    /// Already paid through an intent: ACTIVE with payment SUCCESS
    Paid {
        /// Intent that paid
        intent: IntentId,
        /// Provider payment reference
        payment_ref: Option<String>,
    },
}

/// Input to [`reserve_in_tx`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservationRequest {
    /// Holder, if the identity already exists
    pub user: Option<UserId>,
    /// Bucket to reserve in
    pub spec: SeatSpec,
    /// Fee the seat carries
    pub fee: Money,
    /// Starting state
    pub mode: ReservationMode,
}

/// Result of a reservation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// Seat created
    Accepted {
        /// New seat
        seat_id: SeatId,
        /// Display number in the bucket
        seat_sequence: u32,
        /// Whether the fee is still owed
        requires_payment: bool,
        /// Fee
        fee: Money,
        /// Starting status
        status: SeatStatus,
    },
    /// Bucket full
    Rejected {
        /// Which cap was hit
        reason: RejectionReason,
    },
}

impl ReservationOutcome {
    /// Seat id, if accepted
    #[must_use]
    pub const fn seat_id(&self) -> Option<SeatId> {
        match self {
            Self::Accepted { seat_id, .. } => Some(*seat_id),
            Self::Rejected { .. } => None,
        }
    }
}

/// Smallest positive integer not in `taken`.
///
/// When the count check passed, fewer than `capacity` live seats exist, so
/// the result is at most `capacity`.
#[must_use]
pub fn next_free_sequence(taken: &[u32]) -> u32 {
    let mut taken = taken.to_vec();
    taken.sort_unstable();
    taken.dedup();
    let mut candidate = 1;
    for seq in taken {
        if seq == candidate {
            candidate += 1;
        } else if seq > candidate {
            break;
        }
    }
    candidate
}

/// Reserves a seat inside `tx`.
///
/// Takes the level bucket lock before counting.
///
/// # Errors
///
/// [`crate::SeatError::NotFound`] for an unknown cell or designation, or
/// storage failures. A full bucket is not an error but a
/// [`ReservationOutcome::Rejected`].
pub async fn reserve_in_tx<T: SeatTransaction>(
    tx: &mut T,
    request: ReservationRequest,
    now: DateTime<Utc>,
) -> Result<ReservationOutcome> {
    let spec = &request.spec;
    let level_bucket = spec.level_bucket();
    tx.lock_bucket(&level_bucket).await?;

    let report = capacity::resolve(tx, spec).await?;
    if let Some(reason) = report.rejection() {
        tracing::warn!(
            bucket = %level_bucket.lock_key(),
            designation = %spec.designation,
            reason = reason.as_str(),
            "Reservation rejected"
        );
        return Ok(ReservationOutcome::Rejected { reason });
    }

    let seat_bucket = spec.seat_bucket();
    let seat_sequence = next_free_sequence(&tx.live_sequences(&seat_bucket).await?);
    if seat_sequence > report.designation.capacity {
        // Only reachable if live seats exceed capacity after a capacity cut
        tracing::warn!(
            designation = %spec.designation,
            seat_sequence,
            capacity = report.designation.capacity,
            "Seat sequence beyond designation capacity"
        );
    }

    let (status, payment_status, amount_paid, intent, activated) = match &request.mode {
        ReservationMode::Provisional if request.fee.is_zero() => {
            (SeatStatus::PendingApproval, PaymentStatus::NotRequired, Money::ZERO, None, false)
        }
        ReservationMode::Provisional => {
            (SeatStatus::PendingPayment, PaymentStatus::Pending, Money::ZERO, None, false)
        }
        ReservationMode::Paid { intent, .. } => {
            (SeatStatus::Active, PaymentStatus::Success, request.fee, Some(*intent), true)
        }
    };

    let mut seat = Seat {
        id: SeatId::new(),
        user: request.user,
        spec: request.spec.clone(),
        status,
        payment_status,
        seat_sequence,
        fee: request.fee,
        amount_paid,
        intent,
        created_at: now,
        activated_at: None,
        expires_at: None,
        updated_at: now,
    };
    if activated {
        seat.activate(report.validity_days, now);
    }
    tx.insert_seat(&seat).await?;

    if !request.fee.is_zero() {
        let (status, provider_ref) = match request.mode {
            ReservationMode::Provisional => (PaymentStatus::Pending, None),
            ReservationMode::Paid { payment_ref, .. } => (PaymentStatus::Success, payment_ref),
        };
        tx.insert_seat_payment(&SeatPayment {
            id: SeatPaymentId::new(),
            seat: seat.id,
            intent,
            amount: request.fee,
            status,
            provider_ref,
            created_at: now,
        })
        .await?;
    }

    tracing::info!(
        seat_id = %seat.id,
        bucket = %level_bucket.lock_key(),
        designation = %spec.designation,
        seat_sequence,
        status = %seat.status,
        "Seat reserved"
    );

    Ok(ReservationOutcome::Accepted {
        seat_id: seat.id,
        seat_sequence,
        requires_payment: seat.payment_status == PaymentStatus::Pending,
        fee: request.fee,
        status: seat.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_sequence_is_one() {
        assert_eq!(next_free_sequence(&[]), 1);
    }

    #[test]
    fn test_gap_is_reused() {
        assert_eq!(next_free_sequence(&[1, 3]), 2);
        assert_eq!(next_free_sequence(&[3, 1, 2]), 4);
        assert_eq!(next_free_sequence(&[2, 3]), 1);
    }

    #[test]
    fn test_duplicates_are_ignored() {
        assert_eq!(next_free_sequence(&[1, 1, 2]), 3);
    }

    proptest! {
        #[test]
        fn prop_sequence_is_smallest_unused(taken in proptest::collection::vec(1u32..50, 0..40)) {
            let next = next_free_sequence(&taken);
            prop_assert!(next >= 1);
            prop_assert!(!taken.contains(&next));
            prop_assert!((1..next).all(|n| taken.contains(&n)));
        }

        #[test]
        fn prop_sequence_within_capacity_when_count_passes(
            capacity in 1u32..30,
            taken in proptest::collection::hash_set(1u32..60, 0..29),
        ) {
            prop_assume!((taken.len() as u32) < capacity);
            let taken: Vec<u32> = taken.into_iter().collect();
            let next = next_free_sequence(&taken);
            // Pigeonhole: fewer than `capacity` numbers cannot cover 1..=capacity
            prop_assert!(next <= capacity);
        }
    }
}
