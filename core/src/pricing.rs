//! Quotes: fee resolution with designation fallback and contact discount.

use crate::catalog;
use crate::discount::{self, AppliedDiscount};
use crate::error::Result;
use crate::fee::{self, FeeQuery, FeeSource, ResolvedFee};
use crate::settings::{self, EngineConfig};
use crate::spec::SeatSpec;
use crate::store::SeatTransaction;
use crate::types::{ContactNumber, Currency, FeeOverrideId, Money, Purpose, TeamId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What to price
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuoteRequest {
    /// Fee purpose
    pub purpose: Purpose,
    /// Seat spec
    pub spec: SeatSpec,
    /// Team for team-scoped overrides
    pub team: Option<TeamId>,
    /// Contact for discount lookup
    pub contact: Option<ContactNumber>,
}

/// Priced seat
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Fee before discount
    pub base_amount: Money,
    /// Discount applied, if any
    pub discount: Option<AppliedDiscount>,
    /// Amount to charge
    pub amount: Money,
    /// Currency
    pub currency: Currency,
    /// Renewal cadence
    pub renewal_interval_months: Option<u32>,
    /// Where the base fee came from
    pub source: FeeSource,
    /// Override used
    pub override_id: Option<FeeOverrideId>,
}

/// Prices `request` inside `tx`.
///
/// # Errors
///
/// [`crate::SeatError::NotFound`] for an unknown cell, designation or
/// location reference.
pub async fn quote_in_tx<T: SeatTransaction>(
    tx: &mut T,
    request: &QuoteRequest,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<Quote> {
    let designation = catalog::load_designation(tx, &request.spec).await?;
    let chain = catalog::resolve_locations(tx, &request.spec.scope).await?;

    let overrides = tx.fee_overrides(&request.purpose).await?;
    let resolved = match fee::resolve_override(&overrides, &FeeQuery::new(request.team, chain)) {
        Some(resolved) => resolved,
        None => {
            let settings = settings::effective_settings(tx, config).await?;
            ResolvedFee {
                amount: designation.fee,
                currency: settings.currency,
                renewal_interval_months: settings.renewal_interval_months,
                source: FeeSource::Designation,
                override_id: None,
            }
        }
    };

    let (discount, amount) = match &request.contact {
        Some(contact) => {
            let discounts = tx.discounts_for_contact(contact).await?;
            match discount::select_discount(&discounts, now).and_then(|d| discount::apply_discount(resolved.amount, d)) {
                Some((applied, amount)) => (Some(applied), amount),
                None => (None, resolved.amount),
            }
        }
        None => (None, resolved.amount),
    };

    tracing::debug!(
        purpose = %request.purpose,
        source = ?resolved.source,
        base = resolved.amount.minor(),
        amount = amount.minor(),
        discounted = discount.is_some(),
        "Quote resolved"
    );

    Ok(Quote {
        base_amount: resolved.amount,
        discount,
        amount,
        currency: resolved.currency,
        renewal_interval_months: resolved.renewal_interval_months,
        source: resolved.source,
        override_id: resolved.override_id,
    })
}
