//! Payment intent state machine.
//!
//! ```text
//! PENDING ──► SUCCESS ──► REFUND_REQUIRED
//!    │           │
//!    ▼           ▼ (seat linked)
//! FAILED      terminal
//! ```
//!
//! Transitions are applied through [`PaymentIntent::apply`], which validates
//! before it mutates so a rejected transition leaves the intent untouched.

use crate::discount::AppliedDiscount;
use crate::error::{Result, SeatError};
use crate::spec::SeatSpec;
use crate::types::{ContactNumber, Currency, IntentId, Money, Purpose, SeatId, TeamId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a payment intent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    /// Waiting for the provider outcome
    Pending,
    /// Paid
    Success,
    /// Payment failed or was abandoned
    Failed,
    /// Paid, but the seat sold out before it could be allocated
    RefundRequired,
}

impl IntentStatus {
    /// Storage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::RefundRequired => "REFUND_REQUIRED",
        }
    }

    /// Parses the storage name.
    ///
    /// # Errors
    ///
    /// [`SeatError::Storage`] for unknown values.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "REFUND_REQUIRED" => Ok(Self::RefundRequired),
            other => Err(SeatError::Storage(format!("unknown intent status '{other}'"))),
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition requested on an intent
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntentTransition {
    /// Provider reported success
    Succeed {
        /// Provider payment reference
        payment_ref: Option<String>,
    },
    /// Provider or client reported failure
    Fail {
        /// Failure reason kept for support
        reason: Option<String>,
    },
    /// Capacity was gone when the finalizer ran
    RequireRefund,
    /// Finalizer allocated the seat
    LinkSeat {
        /// Seat created
        seat: SeatId,
        /// Identity the seat belongs to
        user: UserId,
    },
}

impl IntentTransition {
    const fn target(&self) -> &'static str {
        match self {
            Self::Succeed { .. } | Self::LinkSeat { .. } => "SUCCESS",
            Self::Fail { .. } => "FAILED",
            Self::RequireRefund => "REFUND_REQUIRED",
        }
    }
}

/// Payment intent created before identity and seat exist
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Identifier; the client-facing order id
    pub id: IntentId,
    /// Contact paying
    pub contact: ContactNumber,
    /// Purpose charged
    pub purpose: Purpose,
    /// Seat spec frozen at creation
    pub spec: SeatSpec,
    /// Team used for fee scoping
    pub team: Option<TeamId>,
    /// Fee before discount
    pub base_amount: Money,
    /// Discount held by the intent
    pub discount: Option<AppliedDiscount>,
    /// Amount charged
    pub amount: Money,
    /// Currency
    pub currency: Currency,
    /// Status
    pub status: IntentStatus,
    /// Provider order reference
    pub provider_order_id: Option<String>,
    /// Provider payment reference
    pub provider_payment_ref: Option<String>,
    /// Failure reason
    pub failure_reason: Option<String>,
    /// Identity, once finalized
    pub user: Option<UserId>,
    /// Seat, once finalized
    pub seat: Option<SeatId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
    /// When the intent reached a terminal state
    pub finalized_at: Option<DateTime<Utc>>,
}

impl PaymentIntent {
    /// Returns `true` if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        match self.status {
            IntentStatus::Pending => false,
            IntentStatus::Success => self.seat.is_some(),
            IntentStatus::Failed | IntentStatus::RefundRequired => true,
        }
    }

    /// Returns `true` once the intent is paid and linked to a seat.
    #[must_use]
    pub const fn can_register(&self) -> bool {
        matches!(self.status, IntentStatus::Success)
    }

    /// Validates and applies `transition`.
    ///
    /// # Errors
    ///
    /// [`SeatError::InvalidTransition`] if the transition is not allowed from
    /// the current state. The intent is unchanged in that case.
    pub fn apply(&mut self, transition: IntentTransition, now: DateTime<Utc>) -> Result<()> {
        self.validate(&transition)?;

        match transition {
            IntentTransition::Succeed { payment_ref } => {
                self.status = IntentStatus::Success;
                if payment_ref.is_some() {
                    self.provider_payment_ref = payment_ref;
                }
            }
            IntentTransition::Fail { reason } => {
                self.status = IntentStatus::Failed;
                self.failure_reason = reason;
                self.finalized_at = Some(now);
            }
            IntentTransition::RequireRefund => {
                self.status = IntentStatus::RefundRequired;
                self.finalized_at = Some(now);
            }
            IntentTransition::LinkSeat { seat, user } => {
                self.seat = Some(seat);
                self.user = Some(user);
                self.finalized_at = Some(now);
            }
        }
        self.updated_at = now;
        Ok(())
    }

    fn validate(&self, transition: &IntentTransition) -> Result<()> {
        let allowed = match transition {
            IntentTransition::Succeed { .. } | IntentTransition::Fail { .. } => {
                self.status == IntentStatus::Pending
            }
            IntentTransition::RequireRefund | IntentTransition::LinkSeat { .. } => {
                self.status == IntentStatus::Success && self.seat.is_none()
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(SeatError::invalid_transition(self.status, transition.target()))
        }
    }
}
