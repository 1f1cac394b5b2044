//! Registration finalizer.
//!
//! The single entry point that turns a paid intent into an active seat. Both
//! the synchronous confirm path and the webhook reconciler end up here, and
//! the intent row lock plus the seat link make it a check-and-set: whichever
//! caller commits first allocates the seat, every later caller observes the
//! link and returns the same seat.

use crate::discount::{self, DiscountStatus};
use crate::error::{Result, SeatError};
use crate::intent::{IntentStatus, IntentTransition, PaymentIntent};
use crate::reservation::{self, ReservationMode, ReservationOutcome, ReservationRequest};
use crate::store::SeatTransaction;
use crate::types::{IntentId, SeatId, UserId};
use chrono::{DateTime, Utc};

/// Result of finalizing an intent
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Seat allocated and linked
    Registered {
        /// Intent after finalization
        intent: PaymentIntent,
        /// Linked seat
        seat_id: SeatId,
        /// `true` if an earlier call already did the work
        already_finalized: bool,
    },
    /// Paid but sold out; money must go back
    RefundRequired {
        /// Intent after finalization
        intent: PaymentIntent,
    },
}

impl FinalizeOutcome {
    /// Intent after finalization
    #[must_use]
    pub const fn intent(&self) -> &PaymentIntent {
        match self {
            Self::Registered { intent, .. } | Self::RefundRequired { intent } => intent,
        }
    }
}

/// Finalizes `intent_id` inside `tx` for identity `user`.
///
/// The caller resolves `user` before opening `tx` and commits afterwards.
///
/// # Errors
///
/// - [`SeatError::NotFound`] for an unknown intent
/// - [`SeatError::InvalidTransition`] for a FAILED intent
/// - storage failures
pub async fn finalize_in_tx<T: SeatTransaction>(
    tx: &mut T,
    intent_id: IntentId,
    user: UserId,
    payment_ref: Option<String>,
    now: DateTime<Utc>,
) -> Result<FinalizeOutcome> {
    let mut intent = tx
        .load_intent_for_update(intent_id)
        .await?
        .ok_or_else(|| SeatError::not_found("PaymentIntent", intent_id))?;

    match (intent.status, intent.seat) {
        (IntentStatus::Success, Some(seat_id)) => {
            tracing::debug!(intent_id = %intent_id, seat_id = %seat_id, "Intent already finalized");
            return Ok(FinalizeOutcome::Registered {
                intent,
                seat_id,
                already_finalized: true,
            });
        }
        (IntentStatus::RefundRequired, _) => return Ok(FinalizeOutcome::RefundRequired { intent }),
        (IntentStatus::Failed, _) => {
            return Err(SeatError::invalid_transition(IntentStatus::Failed, IntentStatus::Success));
        }
        (IntentStatus::Pending, _) => intent.apply(IntentTransition::Succeed { payment_ref }, now)?,
        // Paid but unlinked only exists inside a rolled-back transaction
        (IntentStatus::Success, None) => {}
    }

    let outcome = reservation::reserve_in_tx(
        tx,
        ReservationRequest {
            user: Some(user),
            spec: intent.spec.clone(),
            fee: intent.amount,
            mode: ReservationMode::Paid {
                intent: intent.id,
                payment_ref: intent.provider_payment_ref.clone(),
            },
        },
        now,
    )
    .await?;

    match outcome {
        ReservationOutcome::Accepted { seat_id, .. } => {
            intent.apply(IntentTransition::LinkSeat { seat: seat_id, user }, now)?;
            tx.update_intent(&intent).await?;
            if let Some(applied) = &intent.discount {
                discount::settle_reserved(tx, applied.discount_id, DiscountStatus::Redeemed, now).await?;
            }
            tracing::info!(intent_id = %intent.id, seat_id = %seat_id, user_id = %user, "Intent finalized");
            Ok(FinalizeOutcome::Registered {
                intent,
                seat_id,
                already_finalized: false,
            })
        }
        ReservationOutcome::Rejected { reason } => {
            intent.apply(IntentTransition::RequireRefund, now)?;
            tx.update_intent(&intent).await?;
            if let Some(applied) = &intent.discount {
                discount::settle_reserved(tx, applied.discount_id, DiscountStatus::Active, now).await?;
            }
            tracing::warn!(
                intent_id = %intent.id,
                reason = reason.as_str(),
                payment_ref = ?intent.provider_payment_ref,
                "Seat sold out after payment; refund required"
            );
            Ok(FinalizeOutcome::RefundRequired { intent })
        }
    }
}
