//! Seat lifecycle administration: approval, revocation, expiry and
//! reassignment to another bucket.

use crate::capacity::{self, BucketUsage, RejectionReason};
use crate::catalog;
use crate::error::{Result, SeatError};
use crate::reservation::next_free_sequence;
use crate::seat::{PaymentStatus, Seat, SeatPayment, SeatStatus};
use crate::spec::SeatSpec;
use crate::store::SeatTransaction;
use crate::types::{Money, SeatId, SeatPaymentId};
use chrono::{DateTime, Utc};

/// Result of moving a seat to another spec
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReassignOutcome {
    /// Seat moved
    Accepted {
        /// Seat after the move
        seat: Seat,
        /// `max(0, new fee − amount paid)`
        delta_due: Money,
    },
    /// Target bucket full; seat untouched
    Rejected {
        /// Which cap was hit
        reason: RejectionReason,
    },
}

async fn load_live_seat<T: SeatTransaction>(tx: &mut T, id: SeatId) -> Result<Seat> {
    let seat = tx
        .load_seat_for_update(id)
        .await?
        .ok_or_else(|| SeatError::not_found("Seat", id))?;
    if !seat.is_live() {
        return Err(SeatError::invalid_transition(seat.status, "a live status"));
    }
    Ok(seat)
}

/// Admin override: activates a pending seat.
///
/// # Errors
///
/// [`SeatError::NotFound`] or [`SeatError::InvalidTransition`] unless the
/// seat is PENDING_PAYMENT or PENDING_APPROVAL.
pub async fn approve_in_tx<T: SeatTransaction>(tx: &mut T, id: SeatId, now: DateTime<Utc>) -> Result<Seat> {
    let mut seat = load_live_seat(tx, id).await?;
    if seat.status == SeatStatus::Active {
        return Err(SeatError::invalid_transition(seat.status, SeatStatus::Active));
    }
    let designation = catalog::load_designation(tx, &seat.spec).await?;
    seat.activate(designation.validity_days, now);
    tx.update_seat(&seat).await?;
    tracing::info!(seat_id = %seat.id, payment_status = %seat.payment_status, "Seat approved");
    Ok(seat)
}

/// Revokes a live seat, freeing its slot and sequence.
///
/// # Errors
///
/// [`SeatError::NotFound`] or [`SeatError::InvalidTransition`] for a seat
/// that is already EXPIRED or REVOKED.
pub async fn revoke_in_tx<T: SeatTransaction>(tx: &mut T, id: SeatId, now: DateTime<Utc>) -> Result<Seat> {
    let mut seat = load_live_seat(tx, id).await?;
    seat.status = SeatStatus::Revoked;
    if seat.payment_status == PaymentStatus::Pending {
        seat.payment_status = PaymentStatus::Failed;
    }
    seat.updated_at = now;
    let closed = tx.fail_pending_seat_payments(seat.id).await?;
    tx.update_seat(&seat).await?;
    tracing::info!(seat_id = %seat.id, closed_payments = closed, "Seat revoked");
    Ok(seat)
}

/// Expires every ACTIVE seat whose validity ended at or before `now`.
///
/// Returns the expired seat ids.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn expire_due_in_tx<T: SeatTransaction>(tx: &mut T, now: DateTime<Utc>) -> Result<Vec<SeatId>> {
    let due = tx.seats_due_for_expiry(now).await?;
    let mut expired = Vec::with_capacity(due.len());
    for mut seat in due {
        seat.status = SeatStatus::Expired;
        seat.updated_at = now;
        tx.update_seat(&seat).await?;
        expired.push(seat.id);
    }
    if !expired.is_empty() {
        tracing::info!(count = expired.len(), "Seats expired");
    }
    Ok(expired)
}

/// Recomputes seat and payment status after the fee changed.
///
/// An ACTIVE seat stays ACTIVE and only its payment status moves. A pending
/// seat waits for payment while money is owed, and for approval otherwise.
fn settle_statuses(seat: &mut Seat, delta_due: Money) {
    if delta_due.is_zero() {
        seat.payment_status = if seat.amount_paid.is_zero() {
            PaymentStatus::NotRequired
        } else {
            PaymentStatus::Success
        };
        if seat.status == SeatStatus::PendingPayment {
            seat.status = SeatStatus::PendingApproval;
        }
    } else {
        seat.payment_status = PaymentStatus::Pending;
        if seat.status == SeatStatus::PendingApproval {
            seat.status = SeatStatus::PendingPayment;
        }
    }
}

/// Moves a live seat to `target`, charging `new_fee`.
///
/// Both level buckets are locked in key order. Capacity is checked in the
/// target only, without counting the seat itself. Open ledger rows for
/// the old fee are failed; a positive delta opens a new pending row.
///
/// # Errors
///
/// [`SeatError::NotFound`], [`SeatError::InvalidTransition`] for a dead
/// seat, or [`SeatError::Validation`] if `target` is the seat's own bucket.
pub async fn reassign_in_tx<T: SeatTransaction>(
    tx: &mut T,
    id: SeatId,
    target: SeatSpec,
    new_fee: Money,
    now: DateTime<Utc>,
) -> Result<ReassignOutcome> {
    let mut seat = load_live_seat(tx, id).await?;
    if seat.spec.seat_bucket() == target.seat_bucket() {
        return Err(SeatError::Validation("seat already occupies the target bucket".to_string()));
    }

    let mut buckets = [seat.spec.level_bucket(), target.level_bucket()];
    buckets.sort();
    tx.lock_bucket(&buckets[0]).await?;
    if buckets[1] != buckets[0] {
        tx.lock_bucket(&buckets[1]).await?;
    }

    let mut report = capacity::resolve(tx, &target).await?;
    if buckets[0] == buckets[1] {
        // The seat already counts toward this aggregate
        report.aggregate = report
            .aggregate
            .map(|agg| BucketUsage::new(agg.capacity, agg.used.saturating_sub(1)));
    }
    if let Some(reason) = report.rejection() {
        tracing::warn!(seat_id = %id, reason = reason.as_str(), "Reassignment rejected");
        return Ok(ReassignOutcome::Rejected { reason });
    }

    let seat_sequence = next_free_sequence(&tx.live_sequences(&target.seat_bucket()).await?);
    let delta_due = new_fee.saturating_sub(seat.amount_paid);

    seat.spec = target;
    seat.seat_sequence = seat_sequence;
    seat.fee = new_fee;
    seat.updated_at = now;

    // The old fee's open charge is superseded by the delta
    tx.fail_pending_seat_payments(seat.id).await?;
    settle_statuses(&mut seat, delta_due);
    if !delta_due.is_zero() {
        tx.insert_seat_payment(&SeatPayment {
            id: SeatPaymentId::new(),
            seat: seat.id,
            intent: None,
            amount: delta_due,
            status: PaymentStatus::Pending,
            provider_ref: None,
            created_at: now,
        })
        .await?;
    }
    tx.update_seat(&seat).await?;

    tracing::info!(
        seat_id = %seat.id,
        bucket = %seat.spec.level_bucket().lock_key(),
        seat_sequence,
        delta_due = delta_due.minor(),
        "Seat reassigned"
    );
    Ok(ReassignOutcome::Accepted { seat, delta_due })
}
