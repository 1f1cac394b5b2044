//! Row types and conversions between SQL columns and domain types.

use chrono::{DateTime, Utc};
use seat_engine_core::catalog::{AggregateCapacity, Cell, Designation, District, Mandal, State};
use seat_engine_core::discount::{AppliedDiscount, Discount, DiscountStatus, DiscountValue};
use seat_engine_core::fee::{FeeOverride, FeeScope};
use seat_engine_core::intent::{IntentStatus, PaymentIntent};
use seat_engine_core::seat::{PaymentStatus, Seat, SeatStatus};
use seat_engine_core::settings::RegistrationSettings;
use seat_engine_core::spec::{LevelBucket, OrgLevel, SeatSpec, SeatSpecRequest};
use seat_engine_core::types::{
    CellId, ContactNumber, CountryId, Currency, DesignationId, DiscountId, DistrictId, FeeOverrideId, IntentId,
    MandalId, Money, Purpose, SeatId, SettingsId, StateId, TeamId, UserId, WebhookEventId,
};
use seat_engine_core::webhook::{WebhookEvent, WebhookEventStatus};
use seat_engine_core::{Result, SeatError};
use uuid::Uuid;

fn corrupt(what: &str, e: impl std::fmt::Display) -> SeatError {
    SeatError::Storage(format!("Corrupt {what} row: {e}"))
}

pub(crate) fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|e| SeatError::Storage(format!("{value} out of range: {e}")))
}

pub(crate) fn to_u32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|e| SeatError::Storage(format!("{value} out of range: {e}")))
}

pub(crate) fn to_u32_count(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|e| SeatError::Storage(format!("{value} out of range: {e}")))
}

fn money(what: &str, value: i64) -> Result<Money> {
    Money::try_from_i64(value).map_err(|e| corrupt(what, e))
}

// ═══════════════════════════════════════════════════════════
// Seat spec columns
// ═══════════════════════════════════════════════════════════

/// Spec flattened to the columns shared by `seats` and `payment_intents`
pub(crate) struct SpecColumns {
    pub cell: Uuid,
    pub designation: Uuid,
    pub level: &'static str,
    pub geo_key: String,
    pub zone: Option<String>,
    pub country: Option<Uuid>,
    pub state: Option<Uuid>,
    pub district: Option<Uuid>,
    pub mandal: Option<Uuid>,
}

impl From<&SeatSpec> for SpecColumns {
    fn from(spec: &SeatSpec) -> Self {
        let request = SeatSpecRequest::from(spec);
        Self {
            cell: *spec.cell.as_uuid(),
            designation: *spec.designation.as_uuid(),
            level: spec.level().as_str(),
            geo_key: spec.scope.geo_key(),
            zone: request.zone,
            country: request.country_ref.map(|id| *id.as_uuid()),
            state: request.state_ref.map(|id| *id.as_uuid()),
            district: request.district_ref.map(|id| *id.as_uuid()),
            mandal: request.mandal_ref.map(|id| *id.as_uuid()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spec_from_columns(
    what: &str,
    cell: Uuid,
    designation: Uuid,
    level: &str,
    zone: Option<String>,
    country: Option<Uuid>,
    state: Option<Uuid>,
    district: Option<Uuid>,
    mandal: Option<Uuid>,
) -> Result<SeatSpec> {
    SeatSpecRequest {
        cell_ref: Some(CellId::from_uuid(cell)),
        designation_ref: Some(DesignationId::from_uuid(designation)),
        level: Some(OrgLevel::parse(level).map_err(|e| corrupt(what, e))?),
        zone,
        country_ref: country.map(CountryId::from_uuid),
        state_ref: state.map(StateId::from_uuid),
        district_ref: district.map(DistrictId::from_uuid),
        mandal_ref: mandal.map(MandalId::from_uuid),
    }
    .into_spec()
    .map_err(|e| corrupt(what, e))
}

// ═══════════════════════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════════════════════

#[derive(sqlx::FromRow)]
pub(crate) struct CellRow {
    id: Uuid,
    name: String,
}

impl From<CellRow> for Cell {
    fn from(row: CellRow) -> Self {
        Self {
            id: CellId::from_uuid(row.id),
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DesignationRow {
    id: Uuid,
    cell_id: Uuid,
    name: String,
    capacity: i32,
    fee: i64,
    validity_days: i32,
}

impl TryFrom<DesignationRow> for Designation {
    type Error = SeatError;

    fn try_from(row: DesignationRow) -> Result<Self> {
        Ok(Self {
            id: DesignationId::from_uuid(row.id),
            cell: CellId::from_uuid(row.cell_id),
            name: row.name,
            capacity: to_u32(row.capacity)?,
            fee: money("designation", row.fee)?,
            validity_days: to_u32(row.validity_days)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct LevelCapacityRow {
    cell_id: Uuid,
    level: String,
    geo_key: String,
    capacity: i32,
}

impl TryFrom<LevelCapacityRow> for AggregateCapacity {
    type Error = SeatError;

    fn try_from(row: LevelCapacityRow) -> Result<Self> {
        Ok(Self {
            bucket: LevelBucket {
                cell: CellId::from_uuid(row.cell_id),
                level: OrgLevel::parse(&row.level).map_err(|e| corrupt("level capacity", e))?,
                geo_key: row.geo_key,
            },
            capacity: to_u32(row.capacity)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct StateRow {
    id: Uuid,
    name: String,
}

impl From<StateRow> for State {
    fn from(row: StateRow) -> Self {
        Self {
            id: StateId::from_uuid(row.id),
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DistrictRow {
    id: Uuid,
    state_id: Uuid,
    name: String,
}

impl From<DistrictRow> for District {
    fn from(row: DistrictRow) -> Self {
        Self {
            id: DistrictId::from_uuid(row.id),
            state: StateId::from_uuid(row.state_id),
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct MandalRow {
    id: Uuid,
    district_id: Uuid,
    name: String,
}

impl From<MandalRow> for Mandal {
    fn from(row: MandalRow) -> Self {
        Self {
            id: MandalId::from_uuid(row.id),
            district: DistrictId::from_uuid(row.district_id),
            name: row.name,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Seats
// ═══════════════════════════════════════════════════════════

pub(crate) const SEAT_COLUMNS: &str = "id, user_id, cell_id, designation_id, level, zone, country_id, state_id, \
     district_id, mandal_id, status, payment_status, seat_sequence, fee, amount_paid, intent_id, created_at, \
     activated_at, expires_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct SeatRow {
    id: Uuid,
    user_id: Option<Uuid>,
    cell_id: Uuid,
    designation_id: Uuid,
    level: String,
    zone: Option<String>,
    country_id: Option<Uuid>,
    state_id: Option<Uuid>,
    district_id: Option<Uuid>,
    mandal_id: Option<Uuid>,
    status: String,
    payment_status: String,
    seat_sequence: i32,
    fee: i64,
    amount_paid: i64,
    intent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SeatRow> for Seat {
    type Error = SeatError;

    fn try_from(row: SeatRow) -> Result<Self> {
        Ok(Self {
            id: SeatId::from_uuid(row.id),
            user: row.user_id.map(UserId::from_uuid),
            spec: spec_from_columns(
                "seat",
                row.cell_id,
                row.designation_id,
                &row.level,
                row.zone,
                row.country_id,
                row.state_id,
                row.district_id,
                row.mandal_id,
            )?,
            status: SeatStatus::parse(&row.status).map_err(|e| corrupt("seat", e))?,
            payment_status: PaymentStatus::parse(&row.payment_status).map_err(|e| corrupt("seat", e))?,
            seat_sequence: to_u32(row.seat_sequence)?,
            fee: money("seat", row.fee)?,
            amount_paid: money("seat", row.amount_paid)?,
            intent: row.intent_id.map(IntentId::from_uuid),
            created_at: row.created_at,
            activated_at: row.activated_at,
            expires_at: row.expires_at,
            updated_at: row.updated_at,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Fees and Discounts
// ═══════════════════════════════════════════════════════════

/// Scope flattened to `(scope_kind, team, mandal, district, state)`
pub(crate) fn scope_columns(scope: FeeScope) -> (&'static str, [Option<Uuid>; 4]) {
    match scope {
        FeeScope::Team(id) => ("TEAM", [Some(*id.as_uuid()), None, None, None]),
        FeeScope::Mandal(id) => ("MANDAL", [None, Some(*id.as_uuid()), None, None]),
        FeeScope::District(id) => ("DISTRICT", [None, None, Some(*id.as_uuid()), None]),
        FeeScope::State(id) => ("STATE", [None, None, None, Some(*id.as_uuid())]),
        FeeScope::Global => ("GLOBAL", [None; 4]),
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FeeOverrideRow {
    id: Uuid,
    purpose: String,
    scope_kind: String,
    team_id: Option<Uuid>,
    mandal_id: Option<Uuid>,
    district_id: Option<Uuid>,
    state_id: Option<Uuid>,
    amount: i64,
    currency: String,
    renewal_interval_months: Option<i32>,
    created_at: DateTime<Utc>,
}

impl TryFrom<FeeOverrideRow> for FeeOverride {
    type Error = SeatError;

    fn try_from(row: FeeOverrideRow) -> Result<Self> {
        let missing = || corrupt("fee override", format!("{} scope without reference", row.scope_kind));
        let scope = match row.scope_kind.as_str() {
            "TEAM" => FeeScope::Team(TeamId::from_uuid(row.team_id.ok_or_else(missing)?)),
            "MANDAL" => FeeScope::Mandal(MandalId::from_uuid(row.mandal_id.ok_or_else(missing)?)),
            "DISTRICT" => FeeScope::District(DistrictId::from_uuid(row.district_id.ok_or_else(missing)?)),
            "STATE" => FeeScope::State(StateId::from_uuid(row.state_id.ok_or_else(missing)?)),
            "GLOBAL" => FeeScope::Global,
            other => return Err(corrupt("fee override", format!("unknown scope {other}"))),
        };
        Ok(Self {
            id: FeeOverrideId::from_uuid(row.id),
            purpose: Purpose::parse(&row.purpose).map_err(|e| corrupt("fee override", e))?,
            scope,
            amount: money("fee override", row.amount)?,
            currency: Currency::parse(&row.currency).map_err(|e| corrupt("fee override", e))?,
            renewal_interval_months: row.renewal_interval_months.map(to_u32).transpose()?,
            created_at: row.created_at,
        })
    }
}

/// Discount value flattened to `(kind, percent_off, amount)`
pub(crate) fn discount_value_columns(value: DiscountValue) -> Result<(&'static str, Option<i16>, Option<i64>)> {
    Ok(match value {
        DiscountValue::Percent(pct) => ("PERCENT", Some(i16::from(pct)), None),
        DiscountValue::Amount(amount) => ("AMOUNT", None, Some(amount.to_i64()?)),
    })
}

#[derive(sqlx::FromRow)]
pub(crate) struct DiscountRow {
    id: Uuid,
    contact: String,
    kind: String,
    percent_off: Option<i16>,
    amount: Option<i64>,
    status: String,
    active_from: Option<DateTime<Utc>>,
    active_to: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DiscountRow> for Discount {
    type Error = SeatError;

    fn try_from(row: DiscountRow) -> Result<Self> {
        let value = match (row.kind.as_str(), row.percent_off, row.amount) {
            ("PERCENT", Some(pct), _) => {
                DiscountValue::Percent(u8::try_from(pct).map_err(|e| corrupt("discount", e))?)
            }
            ("AMOUNT", _, Some(amount)) => DiscountValue::Amount(money("discount", amount)?),
            (kind, ..) => return Err(corrupt("discount", format!("malformed {kind} value"))),
        };
        Ok(Self {
            id: DiscountId::from_uuid(row.id),
            contact: ContactNumber::parse(&row.contact).map_err(|e| corrupt("discount", e))?,
            value,
            status: DiscountStatus::parse(&row.status).map_err(|e| corrupt("discount", e))?,
            active_from: row.active_from,
            active_to: row.active_to,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Payment Intents
// ═══════════════════════════════════════════════════════════

pub(crate) const INTENT_COLUMNS: &str = "id, contact, purpose, cell_id, designation_id, level, zone, country_id, \
     state_id, district_id, mandal_id, team_id, base_amount, discount_id, discount_percent, discount_amount, amount, \
     currency, status, provider_order_id, provider_payment_ref, failure_reason, user_id, seat_id, created_at, \
     updated_at, finalized_at";

#[derive(sqlx::FromRow)]
pub(crate) struct IntentRow {
    id: Uuid,
    contact: String,
    purpose: String,
    cell_id: Uuid,
    designation_id: Uuid,
    level: String,
    zone: Option<String>,
    country_id: Option<Uuid>,
    state_id: Option<Uuid>,
    district_id: Option<Uuid>,
    mandal_id: Option<Uuid>,
    team_id: Option<Uuid>,
    base_amount: i64,
    discount_id: Option<Uuid>,
    discount_percent: Option<i16>,
    discount_amount: Option<i64>,
    amount: i64,
    currency: String,
    status: String,
    provider_order_id: Option<String>,
    provider_payment_ref: Option<String>,
    failure_reason: Option<String>,
    user_id: Option<Uuid>,
    seat_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
}

impl TryFrom<IntentRow> for PaymentIntent {
    type Error = SeatError;

    fn try_from(row: IntentRow) -> Result<Self> {
        let discount = match (row.discount_id, row.discount_percent, row.discount_amount) {
            (Some(id), Some(pct), Some(amount)) => Some(AppliedDiscount {
                discount_id: DiscountId::from_uuid(id),
                percent_off: u8::try_from(pct).map_err(|e| corrupt("payment intent", e))?,
                discount_amount: money("payment intent", amount)?,
            }),
            (None, _, _) => None,
            _ => return Err(corrupt("payment intent", "partial discount columns")),
        };
        Ok(Self {
            id: IntentId::from_uuid(row.id),
            contact: ContactNumber::parse(&row.contact).map_err(|e| corrupt("payment intent", e))?,
            purpose: Purpose::parse(&row.purpose).map_err(|e| corrupt("payment intent", e))?,
            spec: spec_from_columns(
                "payment intent",
                row.cell_id,
                row.designation_id,
                &row.level,
                row.zone,
                row.country_id,
                row.state_id,
                row.district_id,
                row.mandal_id,
            )?,
            team: row.team_id.map(TeamId::from_uuid),
            base_amount: money("payment intent", row.base_amount)?,
            discount,
            amount: money("payment intent", row.amount)?,
            currency: Currency::parse(&row.currency).map_err(|e| corrupt("payment intent", e))?,
            status: IntentStatus::parse(&row.status).map_err(|e| corrupt("payment intent", e))?,
            provider_order_id: row.provider_order_id,
            provider_payment_ref: row.provider_payment_ref,
            failure_reason: row.failure_reason,
            user: row.user_id.map(UserId::from_uuid),
            seat: row.seat_id.map(SeatId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
            finalized_at: row.finalized_at,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Webhooks and Settings
// ═══════════════════════════════════════════════════════════

pub(crate) const WEBHOOK_COLUMNS: &str = "id, fingerprint, event_type, status, note, attempts, received_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct WebhookEventRow {
    id: Uuid,
    fingerprint: String,
    event_type: Option<String>,
    status: String,
    note: Option<String>,
    attempts: i32,
    received_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventRow> for WebhookEvent {
    type Error = SeatError;

    fn try_from(row: WebhookEventRow) -> Result<Self> {
        Ok(Self {
            id: WebhookEventId::from_uuid(row.id),
            fingerprint: row.fingerprint,
            event_type: row.event_type,
            status: WebhookEventStatus::parse(&row.status).map_err(|e| corrupt("webhook event", e))?,
            note: row.note,
            attempts: to_u32(row.attempts)?,
            received_at: row.received_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SettingsRow {
    id: Uuid,
    currency: String,
    renewal_interval_months: Option<i32>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<SettingsRow> for RegistrationSettings {
    type Error = SeatError;

    fn try_from(row: SettingsRow) -> Result<Self> {
        Ok(Self {
            id: SettingsId::from_uuid(row.id),
            currency: Currency::parse(&row.currency).map_err(|e| corrupt("settings", e))?,
            renewal_interval_months: row.renewal_interval_months.map(to_u32).transpose()?,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use seat_engine_core::spec::GeoScope;

    #[test]
    fn test_spec_columns_roundtrip_through_request() {
        let spec = SeatSpec {
            cell: CellId::new(),
            designation: DesignationId::new(),
            scope: GeoScope::Zone {
                zone: "SOUTH".to_string(),
                country: Some(CountryId::new()),
            },
        };
        let cols = SpecColumns::from(&spec);
        assert_eq!(cols.level, "ZONE");
        assert_eq!(cols.geo_key, "SOUTH");

        let back = spec_from_columns(
            "seat",
            cols.cell,
            cols.designation,
            cols.level,
            cols.zone,
            cols.country,
            cols.state,
            cols.district,
            cols.mandal,
        )
        .unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_corrupt_level_is_storage_error() {
        let err = spec_from_columns(
            "seat",
            Uuid::new_v4(),
            Uuid::new_v4(),
            "GALAXY",
            None,
            None,
            None,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SeatError::Storage(_)));
    }

    #[test]
    fn test_scope_columns_place_reference() {
        let state = StateId::new();
        let (kind, refs) = scope_columns(FeeScope::State(state));
        assert_eq!(kind, "STATE");
        assert_eq!(refs, [None, None, None, Some(*state.as_uuid())]);
        assert_eq!(scope_columns(FeeScope::Global), ("GLOBAL", [None; 4]));
    }
}
