//! Registration settings and engine configuration.

use crate::error::Result;
use crate::store::SeatTransaction;
use crate::types::{Currency, Purpose, SettingsId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `registration_settings` table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSettings {
    /// Identifier
    pub id: SettingsId,
    /// Currency used for designation fees
    pub currency: Currency,
    /// Renewal cadence used for designation fees
    pub renewal_interval_months: Option<u32>,
    /// Whether this row is the active one
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Static engine configuration
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Purpose quoted for seat registration
    pub membership_purpose: Purpose,
    /// Currency when no settings row exists
    pub default_currency: Currency,
    /// Renewal cadence when no settings row exists
    pub default_renewal_interval_months: Option<u32>,
    /// Reject synchronous SUCCESS confirms without a provider signature
    pub require_payment_signature: bool,
    /// Webhook event types that mean "payment succeeded"
    pub success_event_types: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            membership_purpose: Purpose::membership(),
            default_currency: Currency::inr(),
            default_renewal_interval_months: Some(12),
            require_payment_signature: true,
            success_event_types: vec!["payment.captured".to_string(), "order.paid".to_string()],
        }
    }
}

/// Settings in force for a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectiveSettings {
    /// Currency for designation fees
    pub currency: Currency,
    /// Renewal cadence for designation fees
    pub renewal_interval_months: Option<u32>,
}

/// Reads the settings in force.
///
/// Uses the active row, else the most recent row, else `config` defaults.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn effective_settings<T: SeatTransaction>(
    tx: &mut T,
    config: &EngineConfig,
) -> Result<EffectiveSettings> {
    Ok(match tx.current_settings().await? {
        Some(row) => EffectiveSettings {
            currency: row.currency,
            renewal_interval_months: row.renewal_interval_months,
        },
        None => EffectiveSettings {
            currency: config.default_currency.clone(),
            renewal_interval_months: config.default_renewal_interval_months,
        },
    })
}
