//! Contact-scoped discounts.
//!
//! At most one discount per contact may be ACTIVE or RESERVED at a time.
//! The rule is checked at write time under a per-contact lock (see
//! [`SeatTransaction::lock_contact`](crate::store::SeatTransaction::lock_contact)),
//! so the resolver can assume there is never more than one candidate and
//! still picks deterministically if legacy data says otherwise.

use crate::error::{Result, SeatError};
use crate::store::SeatTransaction;
use crate::types::{ContactNumber, DiscountId, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discount status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountStatus {
    /// Available for the next quote
    Active,
    /// Held by a pending payment intent
    Reserved,
    /// Consumed by a finalized registration
    Redeemed,
    /// Withdrawn
    Cancelled,
}

impl DiscountStatus {
    /// Statuses covered by the one-per-contact rule.
    #[must_use]
    pub const fn is_held(self) -> bool {
        matches!(self, Self::Active | Self::Reserved)
    }

    /// Storage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Reserved => "RESERVED",
            Self::Redeemed => "REDEEMED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parses the storage name.
    ///
    /// # Errors
    ///
    /// [`SeatError::Validation`] for unknown values.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "ACTIVE" => Ok(Self::Active),
            "RESERVED" => Ok(Self::Reserved),
            "REDEEMED" => Ok(Self::Redeemed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(SeatError::Validation(format!("unknown discount status '{other}'"))),
        }
    }
}

impl fmt::Display for DiscountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a discount
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountValue {
    /// Percentage off, 1 to 100
    Percent(u8),
    /// Fixed amount off. Stored for older records; never applied.
    Amount(Money),
}

/// Discount granted to a contact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    /// Identifier
    pub id: DiscountId,
    /// Contact the discount belongs to
    pub contact: ContactNumber,
    /// Shape
    pub value: DiscountValue,
    /// Status
    pub status: DiscountStatus,
    /// Window start, inclusive
    pub active_from: Option<DateTime<Utc>>,
    /// Window end, inclusive
    pub active_to: Option<DateTime<Utc>>,
    /// Creation time; most recent wins
    pub created_at: DateTime<Utc>,
    /// Last modification
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    /// Returns `true` if `now` falls inside the optional window.
    #[must_use]
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.active_from.is_none_or(|from| from <= now) && self.active_to.is_none_or(|to| now <= to)
    }

    /// Percentage, if this is a percent discount
    #[must_use]
    pub const fn percent_off(&self) -> Option<u8> {
        match self.value {
            DiscountValue::Percent(pct) => Some(pct),
            DiscountValue::Amount(_) => None,
        }
    }

    /// Moves to `to`.
    ///
    /// # Errors
    ///
    /// [`SeatError::InvalidTransition`] out of REDEEMED.
    pub fn transition(&mut self, to: DiscountStatus, now: DateTime<Utc>) -> Result<()> {
        if self.status == DiscountStatus::Redeemed && to != DiscountStatus::Redeemed {
            return Err(SeatError::invalid_transition(self.status, to));
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

/// Validates a percentage for a new discount.
///
/// # Errors
///
/// [`SeatError::Validation`] outside 1..=100.
pub fn validate_percent(percent: u8) -> Result<()> {
    if (1..=100).contains(&percent) {
        Ok(())
    } else {
        Err(SeatError::Validation(format!(
            "percentOff must be between 1 and 100, got {percent}"
        )))
    }
}

/// Enforces the one-held-discount-per-contact rule for `candidate`.
///
/// `existing` holds every discount of the candidate's contact; the candidate
/// itself may be among them.
///
/// # Errors
///
/// [`SeatError::Conflict`] if `candidate` is held and another held one exists.
pub fn ensure_unique_held(existing: &[Discount], candidate: &Discount) -> Result<()> {
    if !candidate.status.is_held() {
        return Ok(());
    }
    match existing
        .iter()
        .find(|d| d.id != candidate.id && d.status.is_held())
    {
        Some(other) => Err(SeatError::Conflict(format!(
            "contact already has {} discount {}",
            other.status, other.id
        ))),
        None => Ok(()),
    }
}

/// Picks the discount to apply at `now`.
///
/// Most recently created ACTIVE percent discount whose window contains `now`.
#[must_use]
pub fn select_discount(discounts: &[Discount], now: DateTime<Utc>) -> Option<&Discount> {
    discounts
        .iter()
        .filter(|d| d.status == DiscountStatus::Active && d.percent_off().is_some() && d.in_window(now))
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
}

/// Discount applied to a fee
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    /// Discount used
    pub discount_id: DiscountId,
    /// Percentage off
    pub percent_off: u8,
    /// `floor(base × percentOff / 100)`
    pub discount_amount: Money,
}

/// Applies `discount` to `base`, returning the applied discount and final amount.
///
/// Returns `None` for non-percent discounts.
#[must_use]
pub fn apply_discount(base: Money, discount: &Discount) -> Option<(AppliedDiscount, Money)> {
    let percent_off = discount.percent_off()?;
    let discount_amount = base.percent_of(percent_off);
    let final_amount = base.saturating_sub(discount_amount);
    Some((
        AppliedDiscount {
            discount_id: discount.id,
            percent_off,
            discount_amount,
        },
        final_amount,
    ))
}

/// Moves a discount held by an intent out of RESERVED.
///
/// `to` is REDEEMED when the intent registered a seat and ACTIVE when the
/// intent failed or needs a refund. A discount that is no longer RESERVED,
/// for instance cancelled by an admin meanwhile, is left alone.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn settle_reserved<T: SeatTransaction>(
    tx: &mut T,
    id: DiscountId,
    to: DiscountStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(mut discount) = tx.load_discount_for_update(id).await? else {
        tracing::warn!(discount_id = %id, "Held discount disappeared");
        return Ok(());
    };
    if discount.status != DiscountStatus::Reserved {
        return Ok(());
    }
    // RESERVED → ACTIVE keeps the contact's single held slot, no recheck needed
    discount.transition(to, now)?;
    tx.update_discount(&discount).await?;
    tracing::debug!(discount_id = %id, status = %to, "Discount settled");
    Ok(())
}
