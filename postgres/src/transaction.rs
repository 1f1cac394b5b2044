//! [`SeatTransaction`] over a sqlx transaction.

use crate::rows::{
    CellRow, DesignationRow, DiscountRow, DistrictRow, FeeOverrideRow, INTENT_COLUMNS, IntentRow, LevelCapacityRow,
    MandalRow, SEAT_COLUMNS, SeatRow, SettingsRow, SpecColumns, StateRow, WEBHOOK_COLUMNS, WebhookEventRow,
    discount_value_columns, scope_columns, to_i32, to_u32, to_u32_count,
};
use chrono::{DateTime, Utc};
use seat_engine_core::catalog::{AggregateCapacity, Cell, Designation, District, Mandal, State};
use seat_engine_core::discount::Discount;
use seat_engine_core::fee::FeeOverride;
use seat_engine_core::intent::PaymentIntent;
use seat_engine_core::seat::{Seat, SeatPayment};
use seat_engine_core::settings::RegistrationSettings;
use seat_engine_core::spec::{LevelBucket, SeatBucket};
use seat_engine_core::store::SeatTransaction;
use seat_engine_core::types::{
    CellId, ContactNumber, DesignationId, DiscountId, DistrictId, IntentId, MandalId, Purpose, SeatId, StateId,
};
use seat_engine_core::webhook::{WebhookClaim, WebhookEvent, WebhookEventStatus};
use seat_engine_core::{Result, SeatError};
use sqlx::{Postgres, Transaction};
use std::time::Instant;

const LIVE: &str = "status IN ('PENDING_PAYMENT', 'PENDING_APPROVAL', 'ACTIVE')";

fn db(action: &'static str) -> impl FnOnce(sqlx::Error) -> SeatError {
    move |e| SeatError::Storage(format!("Failed to {action}: {e}"))
}

fn unique_or_db(action: &'static str, conflict: &'static str) -> impl FnOnce(sqlx::Error) -> SeatError {
    move |e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => SeatError::Conflict(conflict.to_string()),
        _ => SeatError::Storage(format!("Failed to {action}: {e}")),
    }
}

/// Open database transaction
///
/// Dropping it without [`SeatTransaction::commit`] rolls back.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
    opened: Instant,
}

impl PgTransaction {
    pub(crate) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx,
            opened: Instant::now(),
        }
    }

    async fn advisory_lock(&mut self, key: &str) -> Result<()> {
        let started = Instant::now();
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key)
            .execute(&mut *self.tx)
            .await
            .map_err(db("take advisory lock"))?;
        metrics::histogram!("seat_engine_lock_wait_seconds").record(started.elapsed().as_secs_f64());
        Ok(())
    }
}

impl SeatTransaction for PgTransaction {
    // ═══════════════════════════════════════════════════════════
    // Catalog
    // ═══════════════════════════════════════════════════════════

    async fn load_cell(&mut self, id: CellId) -> Result<Option<Cell>> {
        let row: Option<CellRow> = sqlx::query_as("SELECT id, name FROM cells WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load cell"))?;
        Ok(row.map(Cell::from))
    }

    async fn load_designation(&mut self, id: DesignationId) -> Result<Option<Designation>> {
        let row: Option<DesignationRow> = sqlx::query_as(
            "SELECT id, cell_id, name, capacity, fee, validity_days FROM designations WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load designation"))?;
        row.map(Designation::try_from).transpose()
    }

    async fn load_aggregate_capacity(&mut self, bucket: &LevelBucket) -> Result<Option<AggregateCapacity>> {
        let row: Option<LevelCapacityRow> = sqlx::query_as(
            r"
            SELECT cell_id, level, geo_key, capacity
            FROM level_capacities
            WHERE cell_id = $1 AND level = $2 AND geo_key = $3
            ",
        )
        .bind(bucket.cell.as_uuid())
        .bind(bucket.level.as_str())
        .bind(&bucket.geo_key)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load level capacity"))?;
        row.map(AggregateCapacity::try_from).transpose()
    }

    async fn load_state(&mut self, id: StateId) -> Result<Option<State>> {
        let row: Option<StateRow> = sqlx::query_as("SELECT id, name FROM states WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load state"))?;
        Ok(row.map(State::from))
    }

    async fn load_district(&mut self, id: DistrictId) -> Result<Option<District>> {
        let row: Option<DistrictRow> = sqlx::query_as("SELECT id, state_id, name FROM districts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load district"))?;
        Ok(row.map(District::from))
    }

    async fn load_mandal(&mut self, id: MandalId) -> Result<Option<Mandal>> {
        let row: Option<MandalRow> = sqlx::query_as("SELECT id, district_id, name FROM mandals WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load mandal"))?;
        Ok(row.map(Mandal::from))
    }

    // ═══════════════════════════════════════════════════════════
    // Seats
    // ═══════════════════════════════════════════════════════════

    async fn lock_bucket(&mut self, bucket: &LevelBucket) -> Result<()> {
        self.advisory_lock(&bucket.lock_key()).await
    }

    async fn count_live_seats(&mut self, bucket: &SeatBucket) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM seats \
             WHERE cell_id = $1 AND level = $2 AND geo_key = $3 AND designation_id = $4 AND {LIVE}"
        ))
        .bind(bucket.level.cell.as_uuid())
        .bind(bucket.level.level.as_str())
        .bind(&bucket.level.geo_key)
        .bind(bucket.designation.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db("count live seats"))?;
        to_u32_count(count)
    }

    async fn count_live_seats_in_level(&mut self, bucket: &LevelBucket) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM seats WHERE cell_id = $1 AND level = $2 AND geo_key = $3 AND {LIVE}"
        ))
        .bind(bucket.cell.as_uuid())
        .bind(bucket.level.as_str())
        .bind(&bucket.geo_key)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db("count live seats in level"))?;
        to_u32_count(count)
    }

    async fn live_sequences(&mut self, bucket: &SeatBucket) -> Result<Vec<u32>> {
        let sequences: Vec<i32> = sqlx::query_scalar(&format!(
            "SELECT seat_sequence FROM seats \
             WHERE cell_id = $1 AND level = $2 AND geo_key = $3 AND designation_id = $4 AND {LIVE} \
             ORDER BY seat_sequence"
        ))
        .bind(bucket.level.cell.as_uuid())
        .bind(bucket.level.level.as_str())
        .bind(&bucket.level.geo_key)
        .bind(bucket.designation.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db("load live sequences"))?;
        sequences.into_iter().map(to_u32).collect()
    }

    async fn insert_seat(&mut self, seat: &Seat) -> Result<()> {
        let spec = SpecColumns::from(&seat.spec);
        sqlx::query(
            r"
            INSERT INTO seats (
                id, user_id, cell_id, designation_id, level, geo_key, zone, country_id, state_id,
                district_id, mandal_id, status, payment_status, seat_sequence, fee, amount_paid,
                intent_id, created_at, activated_at, expires_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            ",
        )
        .bind(seat.id.as_uuid())
        .bind(seat.user.map(|u| *u.as_uuid()))
        .bind(spec.cell)
        .bind(spec.designation)
        .bind(spec.level)
        .bind(&spec.geo_key)
        .bind(&spec.zone)
        .bind(spec.country)
        .bind(spec.state)
        .bind(spec.district)
        .bind(spec.mandal)
        .bind(seat.status.as_str())
        .bind(seat.payment_status.as_str())
        .bind(to_i32(seat.seat_sequence)?)
        .bind(seat.fee.to_i64()?)
        .bind(seat.amount_paid.to_i64()?)
        .bind(seat.intent.map(|i| *i.as_uuid()))
        .bind(seat.created_at)
        .bind(seat.activated_at)
        .bind(seat.expires_at)
        .bind(seat.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_or_db("insert seat", "seat sequence already taken"))?;
        Ok(())
    }

    async fn load_seat(&mut self, id: SeatId) -> Result<Option<Seat>> {
        let row: Option<SeatRow> = sqlx::query_as(&format!("SELECT {SEAT_COLUMNS} FROM seats WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db("load seat"))?;
        row.map(Seat::try_from).transpose()
    }

    async fn load_seat_for_update(&mut self, id: SeatId) -> Result<Option<Seat>> {
        let row: Option<SeatRow> =
            sqlx::query_as(&format!("SELECT {SEAT_COLUMNS} FROM seats WHERE id = $1 FOR UPDATE"))
                .bind(id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db("lock seat"))?;
        row.map(Seat::try_from).transpose()
    }

    async fn update_seat(&mut self, seat: &Seat) -> Result<()> {
        let spec = SpecColumns::from(&seat.spec);
        let result = sqlx::query(
            r"
            UPDATE seats
            SET user_id = $2, cell_id = $3, designation_id = $4, level = $5, geo_key = $6, zone = $7,
                country_id = $8, state_id = $9, district_id = $10, mandal_id = $11, status = $12,
                payment_status = $13, seat_sequence = $14, fee = $15, amount_paid = $16, intent_id = $17,
                activated_at = $18, expires_at = $19, updated_at = $20
            WHERE id = $1
            ",
        )
        .bind(seat.id.as_uuid())
        .bind(seat.user.map(|u| *u.as_uuid()))
        .bind(spec.cell)
        .bind(spec.designation)
        .bind(spec.level)
        .bind(&spec.geo_key)
        .bind(&spec.zone)
        .bind(spec.country)
        .bind(spec.state)
        .bind(spec.district)
        .bind(spec.mandal)
        .bind(seat.status.as_str())
        .bind(seat.payment_status.as_str())
        .bind(to_i32(seat.seat_sequence)?)
        .bind(seat.fee.to_i64()?)
        .bind(seat.amount_paid.to_i64()?)
        .bind(seat.intent.map(|i| *i.as_uuid()))
        .bind(seat.activated_at)
        .bind(seat.expires_at)
        .bind(seat.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_or_db("update seat", "seat sequence already taken"))?;
        if result.rows_affected() == 0 {
            return Err(SeatError::not_found("Seat", seat.id));
        }
        Ok(())
    }

    async fn seats_due_for_expiry(&mut self, now: DateTime<Utc>) -> Result<Vec<Seat>> {
        let rows: Vec<SeatRow> = sqlx::query_as(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats \
             WHERE status = 'ACTIVE' AND expires_at <= $1 ORDER BY expires_at FOR UPDATE SKIP LOCKED"
        ))
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db("load expiring seats"))?;
        rows.into_iter().map(Seat::try_from).collect()
    }

    async fn insert_seat_payment(&mut self, payment: &SeatPayment) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO seat_payments (id, seat_id, intent_id, amount, status, provider_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.seat.as_uuid())
        .bind(payment.intent.map(|i| *i.as_uuid()))
        .bind(payment.amount.to_i64()?)
        .bind(payment.status.as_str())
        .bind(&payment.provider_ref)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("insert seat payment"))?;
        Ok(())
    }

    async fn fail_pending_seat_payments(&mut self, seat: SeatId) -> Result<u32> {
        let result = sqlx::query("UPDATE seat_payments SET status = 'FAILED' WHERE seat_id = $1 AND status = 'PENDING'")
            .bind(seat.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(db("fail pending seat payments"))?;
        u32::try_from(result.rows_affected())
            .map_err(|_| SeatError::Storage("Too many pending seat payments".to_string()))
    }

    // ═══════════════════════════════════════════════════════════
    // Fees and Discounts
    // ═══════════════════════════════════════════════════════════

    async fn fee_overrides(&mut self, purpose: &Purpose) -> Result<Vec<FeeOverride>> {
        let rows: Vec<FeeOverrideRow> = sqlx::query_as(
            r"
            SELECT id, purpose, scope_kind, team_id, mandal_id, district_id, state_id, amount, currency,
                   renewal_interval_months, created_at
            FROM fee_overrides
            WHERE purpose = $1
            ORDER BY created_at, id
            ",
        )
        .bind(purpose.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db("load fee overrides"))?;
        rows.into_iter().map(FeeOverride::try_from).collect()
    }

    async fn insert_fee_override(&mut self, fee: &FeeOverride) -> Result<()> {
        let (kind, [team, mandal, district, state]) = scope_columns(fee.scope);
        sqlx::query(
            r"
            INSERT INTO fee_overrides (
                id, purpose, scope_kind, team_id, mandal_id, district_id, state_id, amount, currency,
                renewal_interval_months, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(fee.id.as_uuid())
        .bind(fee.purpose.as_str())
        .bind(kind)
        .bind(team)
        .bind(mandal)
        .bind(district)
        .bind(state)
        .bind(fee.amount.to_i64()?)
        .bind(fee.currency.as_str())
        .bind(fee.renewal_interval_months.map(to_i32).transpose()?)
        .bind(fee.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("insert fee override"))?;
        Ok(())
    }

    async fn lock_contact(&mut self, contact: &ContactNumber) -> Result<()> {
        self.advisory_lock(&format!("discount-contact:{}", contact.as_str()))
            .await
    }

    async fn discounts_for_contact(&mut self, contact: &ContactNumber) -> Result<Vec<Discount>> {
        let rows: Vec<DiscountRow> = sqlx::query_as(
            r"
            SELECT id, contact, kind, percent_off, amount, status, active_from, active_to, created_at, updated_at
            FROM discounts
            WHERE contact = $1
            ORDER BY created_at
            ",
        )
        .bind(contact.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db("load discounts"))?;
        rows.into_iter().map(Discount::try_from).collect()
    }

    async fn load_discount(&mut self, id: DiscountId) -> Result<Option<Discount>> {
        let row: Option<DiscountRow> = sqlx::query_as(
            r"
            SELECT id, contact, kind, percent_off, amount, status, active_from, active_to, created_at, updated_at
            FROM discounts
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load discount"))?;
        row.map(Discount::try_from).transpose()
    }

    async fn load_discount_for_update(&mut self, id: DiscountId) -> Result<Option<Discount>> {
        let row: Option<DiscountRow> = sqlx::query_as(
            r"
            SELECT id, contact, kind, percent_off, amount, status, active_from, active_to, created_at, updated_at
            FROM discounts
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("lock discount"))?;
        row.map(Discount::try_from).transpose()
    }

    async fn insert_discount(&mut self, discount: &Discount) -> Result<()> {
        let (kind, percent_off, amount) = discount_value_columns(discount.value)?;
        sqlx::query(
            r"
            INSERT INTO discounts (
                id, contact, kind, percent_off, amount, status, active_from, active_to, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(discount.id.as_uuid())
        .bind(discount.contact.as_str())
        .bind(kind)
        .bind(percent_off)
        .bind(amount)
        .bind(discount.status.as_str())
        .bind(discount.active_from)
        .bind(discount.active_to)
        .bind(discount.created_at)
        .bind(discount.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_or_db("insert discount", "contact already holds a discount"))?;
        Ok(())
    }

    async fn update_discount(&mut self, discount: &Discount) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE discounts
            SET status = $2, active_from = $3, active_to = $4, updated_at = $5
            WHERE id = $1
            ",
        )
        .bind(discount.id.as_uuid())
        .bind(discount.status.as_str())
        .bind(discount.active_from)
        .bind(discount.active_to)
        .bind(discount.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_or_db("update discount", "contact already holds a discount"))?;
        if result.rows_affected() == 0 {
            return Err(SeatError::not_found("Discount", discount.id));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Payment Intents
    // ═══════════════════════════════════════════════════════════

    async fn insert_intent(&mut self, intent: &PaymentIntent) -> Result<()> {
        let spec = SpecColumns::from(&intent.spec);
        sqlx::query(
            r"
            INSERT INTO payment_intents (
                id, contact, purpose, cell_id, designation_id, level, zone, country_id, state_id,
                district_id, mandal_id, team_id, base_amount, discount_id, discount_percent,
                discount_amount, amount, currency, status, provider_order_id, provider_payment_ref,
                failure_reason, user_id, seat_id, created_at, updated_at, finalized_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19,
                $20, $21, $22, $23, $24, $25, $26, $27
            )
            ",
        )
        .bind(intent.id.as_uuid())
        .bind(intent.contact.as_str())
        .bind(intent.purpose.as_str())
        .bind(spec.cell)
        .bind(spec.designation)
        .bind(spec.level)
        .bind(&spec.zone)
        .bind(spec.country)
        .bind(spec.state)
        .bind(spec.district)
        .bind(spec.mandal)
        .bind(intent.team.map(|t| *t.as_uuid()))
        .bind(intent.base_amount.to_i64()?)
        .bind(intent.discount.as_ref().map(|d| *d.discount_id.as_uuid()))
        .bind(intent.discount.as_ref().map(|d| i16::from(d.percent_off)))
        .bind(intent.discount.as_ref().map(|d| d.discount_amount.to_i64()).transpose()?)
        .bind(intent.amount.to_i64()?)
        .bind(intent.currency.as_str())
        .bind(intent.status.as_str())
        .bind(&intent.provider_order_id)
        .bind(&intent.provider_payment_ref)
        .bind(&intent.failure_reason)
        .bind(intent.user.map(|u| *u.as_uuid()))
        .bind(intent.seat.map(|s| *s.as_uuid()))
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .bind(intent.finalized_at)
        .execute(&mut *self.tx)
        .await
        .map_err(unique_or_db("insert payment intent", "provider order already used"))?;
        Ok(())
    }

    async fn load_intent(&mut self, id: IntentId) -> Result<Option<PaymentIntent>> {
        let row: Option<IntentRow> =
            sqlx::query_as(&format!("SELECT {INTENT_COLUMNS} FROM payment_intents WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db("load payment intent"))?;
        row.map(PaymentIntent::try_from).transpose()
    }

    async fn load_intent_for_update(&mut self, id: IntentId) -> Result<Option<PaymentIntent>> {
        let row: Option<IntentRow> = sqlx::query_as(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("lock payment intent"))?;
        row.map(PaymentIntent::try_from).transpose()
    }

    async fn find_intent_by_provider_order(&mut self, order_id: &str) -> Result<Option<PaymentIntent>> {
        let row: Option<IntentRow> = sqlx::query_as(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE provider_order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("find payment intent"))?;
        row.map(PaymentIntent::try_from).transpose()
    }

    async fn update_intent(&mut self, intent: &PaymentIntent) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE payment_intents
            SET status = $2, provider_payment_ref = $3, failure_reason = $4, user_id = $5, seat_id = $6,
                updated_at = $7, finalized_at = $8
            WHERE id = $1
            ",
        )
        .bind(intent.id.as_uuid())
        .bind(intent.status.as_str())
        .bind(&intent.provider_payment_ref)
        .bind(&intent.failure_reason)
        .bind(intent.user.map(|u| *u.as_uuid()))
        .bind(intent.seat.map(|s| *s.as_uuid()))
        .bind(intent.updated_at)
        .bind(intent.finalized_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("update payment intent"))?;
        if result.rows_affected() == 0 {
            return Err(SeatError::not_found("PaymentIntent", intent.id));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Webhooks
    // ═══════════════════════════════════════════════════════════

    async fn claim_webhook_event(&mut self, event: &WebhookEvent, stale_before: DateTime<Utc>) -> Result<WebhookClaim> {
        let claimed: Option<WebhookEventRow> = sqlx::query_as(&format!(
            r"
            INSERT INTO webhook_events (id, fingerprint, event_type, status, note, attempts, received_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (fingerprint) DO UPDATE
            SET status = 'RECEIVED',
                attempts = webhook_events.attempts + 1,
                note = NULL,
                updated_at = EXCLUDED.updated_at
            WHERE webhook_events.status = 'FAILED'
               OR (webhook_events.status = 'RECEIVED'
                   AND webhook_events.note IS NULL
                   AND webhook_events.updated_at <= $9)
            RETURNING {WEBHOOK_COLUMNS}
            "
        ))
        .bind(event.id.as_uuid())
        .bind(&event.fingerprint)
        .bind(&event.event_type)
        .bind(event.status.as_str())
        .bind(&event.note)
        .bind(to_i32(event.attempts)?)
        .bind(event.received_at)
        .bind(event.updated_at)
        .bind(stale_before)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("claim webhook event"))?;

        if let Some(row) = claimed {
            return Ok(WebhookClaim::Claimed(WebhookEvent::try_from(row)?));
        }

        let status: String = sqlx::query_scalar("SELECT status FROM webhook_events WHERE fingerprint = $1")
            .bind(&event.fingerprint)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db("load webhook status"))?;
        let status = WebhookEventStatus::parse(&status)
            .map_err(|e| SeatError::Storage(format!("Corrupt webhook event row: {e}")))?;
        Ok(WebhookClaim::Duplicate(status))
    }

    async fn update_webhook_event(&mut self, event: &WebhookEvent) -> Result<()> {
        sqlx::query(
            r"
            UPDATE webhook_events
            SET event_type = $2, status = $3, note = $4, attempts = $5, updated_at = $6
            WHERE fingerprint = $1
            ",
        )
        .bind(&event.fingerprint)
        .bind(&event.event_type)
        .bind(event.status.as_str())
        .bind(&event.note)
        .bind(to_i32(event.attempts)?)
        .bind(event.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db("update webhook event"))?;
        Ok(())
    }

    async fn load_webhook_event(&mut self, fingerprint: &str) -> Result<Option<WebhookEvent>> {
        let row: Option<WebhookEventRow> = sqlx::query_as(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhook_events WHERE fingerprint = $1"
        ))
        .bind(fingerprint)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load webhook event"))?;
        row.map(WebhookEvent::try_from).transpose()
    }

    // ═══════════════════════════════════════════════════════════
    // Settings
    // ═══════════════════════════════════════════════════════════

    async fn current_settings(&mut self) -> Result<Option<RegistrationSettings>> {
        let row: Option<SettingsRow> = sqlx::query_as(
            r"
            SELECT id, currency, renewal_interval_months, is_active, created_at
            FROM registration_settings
            ORDER BY is_active DESC, created_at DESC
            LIMIT 1
            ",
        )
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db("load registration settings"))?;
        row.map(RegistrationSettings::try_from).transpose()
    }

    // ═══════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════

    async fn commit(self) -> Result<()> {
        let held = self.opened.elapsed();
        self.tx.commit().await.map_err(db("commit"))?;
        metrics::histogram!("seat_engine_transaction_seconds").record(held.as_secs_f64());
        Ok(())
    }
}
