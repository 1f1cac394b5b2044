//! Seat (membership) records and their payment ledger.

use crate::error::{Result, SeatError};
use crate::spec::SeatSpec;
use crate::types::{IntentId, Money, SeatId, SeatPaymentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a seat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    /// Reserved, waiting for the fee
    PendingPayment,
    /// Reserved free of charge, waiting for an admin
    PendingApproval,
    /// Occupied
    Active,
    /// Validity ran out
    Expired,
    /// Withdrawn by an admin
    Revoked,
}

impl SeatStatus {
    /// Live seats count against capacity and hold their sequence number.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::PendingPayment | Self::PendingApproval | Self::Active)
    }

    /// Storage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
        }
    }

    /// Parses the storage name.
    ///
    /// # Errors
    ///
    /// [`SeatError::Storage`] for unknown values.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "PENDING_PAYMENT" => Ok(Self::PendingPayment),
            "PENDING_APPROVAL" => Ok(Self::PendingApproval),
            "ACTIVE" => Ok(Self::Active),
            "EXPIRED" => Ok(Self::Expired),
            "REVOKED" => Ok(Self::Revoked),
            other => Err(SeatError::Storage(format!("unknown seat status '{other}'"))),
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of a seat, also used by ledger rows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Free seat
    NotRequired,
    /// Awaiting payment
    Pending,
    /// Paid
    Success,
    /// Payment failed
    Failed,
    /// Money returned
    Refunded,
}

impl PaymentStatus {
    /// Storage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRequired => "NOT_REQUIRED",
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        }
    }

    /// Parses the storage name.
    ///
    /// # Errors
    ///
    /// [`SeatError::Storage`] for unknown values.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "NOT_REQUIRED" => Ok(Self::NotRequired),
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "REFUNDED" => Ok(Self::Refunded),
            other => Err(SeatError::Storage(format!("unknown payment status '{other}'"))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seat occupying one slot of a designation bucket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Identifier
    pub id: SeatId,
    /// Holder; absent while reserved ahead of identity creation
    pub user: Option<UserId>,
    /// Bucket the seat occupies
    pub spec: SeatSpec,
    /// Lifecycle status
    pub status: SeatStatus,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// Display number inside the bucket, unique among live seats
    pub seat_sequence: u32,
    /// Fee charged for the current spec
    pub fee: Money,
    /// Total paid so far
    pub amount_paid: Money,
    /// Intent that paid for the seat, if any
    pub intent: Option<IntentId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// When the seat became active
    pub activated_at: Option<DateTime<Utc>>,
    /// When an active seat lapses
    pub expires_at: Option<DateTime<Utc>>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
}

impl Seat {
    /// Returns `true` if the seat counts against capacity.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Activates the seat for `validity_days` starting at `now`.
    pub fn activate(&mut self, validity_days: u32, now: DateTime<Utc>) {
        self.status = SeatStatus::Active;
        self.activated_at = Some(now);
        self.expires_at = Some(now + chrono::Duration::days(i64::from(validity_days)));
        self.updated_at = now;
    }
}

/// Ledger row recording money expected or received for a seat
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatPayment {
    /// Identifier
    pub id: SeatPaymentId,
    /// Seat charged
    pub seat: SeatId,
    /// Intent the payment came through, if any
    pub intent: Option<IntentId>,
    /// Amount
    pub amount: Money,
    /// Status
    pub status: PaymentStatus,
    /// Provider payment reference
    pub provider_ref: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}
