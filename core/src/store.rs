//! Storage traits.
//!
//! Every engine operation runs inside one [`SeatTransaction`]. Dropping a
//! transaction without calling [`SeatTransaction::commit`] rolls it back.
//!
//! # Implementation Notes
//!
//! - `lock_bucket` must serialize all transactions touching the same
//!   [`LevelBucket`] until commit or rollback. Capacity counts read after the
//!   lock must observe every committed seat.
//! - `lock_contact` gives the same guarantee per contact for discounts.
//! - `load_*_for_update` must lock the row for the rest of the transaction.
//! - `claim_webhook_event` must be atomic against concurrent deliveries of
//!   the same fingerprint.

use crate::catalog::{AggregateCapacity, Cell, Designation, District, Mandal, State};
use crate::discount::Discount;
use crate::error::Result;
use crate::fee::FeeOverride;
use crate::intent::PaymentIntent;
use crate::seat::{Seat, SeatPayment};
use crate::settings::RegistrationSettings;
use crate::spec::{LevelBucket, SeatBucket};
use crate::types::{
    CellId, ContactNumber, DesignationId, DiscountId, DistrictId, IntentId, MandalId, Purpose, SeatId, StateId,
};
use crate::webhook::{WebhookClaim, WebhookEvent};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Opens transactions.
pub trait SeatStore: Send + Sync {
    /// Transaction handle
    type Tx: SeatTransaction;

    /// Begins a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SeatError::Storage`] if no connection is available.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send;
}

/// Operations available inside a transaction.
///
/// All methods return [`crate::SeatError::Storage`] on backend failure.
#[allow(clippy::missing_errors_doc)]
pub trait SeatTransaction: Send {
    // ═══════════════════════════════════════════════════════════
    // Catalog
    // ═══════════════════════════════════════════════════════════

    /// Load a cell.
    fn load_cell(&mut self, id: CellId) -> impl Future<Output = Result<Option<Cell>>> + Send;

    /// Load a designation.
    fn load_designation(&mut self, id: DesignationId) -> impl Future<Output = Result<Option<Designation>>> + Send;

    /// Load the aggregate cap of a level bucket, if one is configured.
    fn load_aggregate_capacity(
        &mut self,
        bucket: &LevelBucket,
    ) -> impl Future<Output = Result<Option<AggregateCapacity>>> + Send;

    /// Load a state.
    fn load_state(&mut self, id: StateId) -> impl Future<Output = Result<Option<State>>> + Send;

    /// Load a district.
    fn load_district(&mut self, id: DistrictId) -> impl Future<Output = Result<Option<District>>> + Send;

    /// Load a mandal.
    fn load_mandal(&mut self, id: MandalId) -> impl Future<Output = Result<Option<Mandal>>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Seats
    // ═══════════════════════════════════════════════════════════

    /// Serialize with every other transaction on `bucket` until commit.
    fn lock_bucket(&mut self, bucket: &LevelBucket) -> impl Future<Output = Result<()>> + Send;

    /// Count live seats in a designation bucket.
    fn count_live_seats(&mut self, bucket: &SeatBucket) -> impl Future<Output = Result<u32>> + Send;

    /// Count live seats across all designations of a level bucket.
    fn count_live_seats_in_level(&mut self, bucket: &LevelBucket) -> impl Future<Output = Result<u32>> + Send;

    /// Sequence numbers held by live seats in a designation bucket.
    fn live_sequences(&mut self, bucket: &SeatBucket) -> impl Future<Output = Result<Vec<u32>>> + Send;

    /// Insert a seat.
    fn insert_seat(&mut self, seat: &Seat) -> impl Future<Output = Result<()>> + Send;

    /// Load a seat without locking.
    fn load_seat(&mut self, id: SeatId) -> impl Future<Output = Result<Option<Seat>>> + Send;

    /// Load and lock a seat.
    fn load_seat_for_update(&mut self, id: SeatId) -> impl Future<Output = Result<Option<Seat>>> + Send;

    /// Overwrite a seat.
    fn update_seat(&mut self, seat: &Seat) -> impl Future<Output = Result<()>> + Send;

    /// Active seats with `expires_at <= now`.
    fn seats_due_for_expiry(&mut self, now: DateTime<Utc>) -> impl Future<Output = Result<Vec<Seat>>> + Send;

    /// Append a payment ledger row.
    fn insert_seat_payment(&mut self, payment: &SeatPayment) -> impl Future<Output = Result<()>> + Send;

    /// Mark every PENDING ledger row of `seat` FAILED. Returns the rows changed.
    fn fail_pending_seat_payments(&mut self, seat: SeatId) -> impl Future<Output = Result<u32>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Fees and Discounts
    // ═══════════════════════════════════════════════════════════

    /// All fee overrides for a purpose.
    fn fee_overrides(&mut self, purpose: &Purpose) -> impl Future<Output = Result<Vec<FeeOverride>>> + Send;

    /// Insert a fee override.
    fn insert_fee_override(&mut self, fee: &FeeOverride) -> impl Future<Output = Result<()>> + Send;

    /// Serialize with every other transaction on `contact` until commit.
    fn lock_contact(&mut self, contact: &ContactNumber) -> impl Future<Output = Result<()>> + Send;

    /// All discounts of a contact.
    fn discounts_for_contact(
        &mut self,
        contact: &ContactNumber,
    ) -> impl Future<Output = Result<Vec<Discount>>> + Send;

    /// Load a discount without locking.
    fn load_discount(&mut self, id: DiscountId) -> impl Future<Output = Result<Option<Discount>>> + Send;

    /// Load and lock a discount.
    fn load_discount_for_update(&mut self, id: DiscountId)
    -> impl Future<Output = Result<Option<Discount>>> + Send;

    /// Insert a discount.
    fn insert_discount(&mut self, discount: &Discount) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite a discount.
    fn update_discount(&mut self, discount: &Discount) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Payment Intents
    // ═══════════════════════════════════════════════════════════

    /// Insert an intent.
    fn insert_intent(&mut self, intent: &PaymentIntent) -> impl Future<Output = Result<()>> + Send;

    /// Load an intent without locking.
    fn load_intent(&mut self, id: IntentId) -> impl Future<Output = Result<Option<PaymentIntent>>> + Send;

    /// Load and lock an intent.
    fn load_intent_for_update(
        &mut self,
        id: IntentId,
    ) -> impl Future<Output = Result<Option<PaymentIntent>>> + Send;

    /// Find an intent by provider order reference.
    fn find_intent_by_provider_order(
        &mut self,
        order_id: &str,
    ) -> impl Future<Output = Result<Option<PaymentIntent>>> + Send;

    /// Overwrite an intent.
    fn update_intent(&mut self, intent: &PaymentIntent) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Webhooks
    // ═══════════════════════════════════════════════════════════

    /// Claim `event.fingerprint`.
    ///
    /// Inserts `event` if the fingerprint is new, or takes over an entry that
    /// [`WebhookEvent::is_reclaimable`] allows for `stale_before`
    /// (incrementing its attempts). Otherwise reports the existing status.
    fn claim_webhook_event(
        &mut self,
        event: &WebhookEvent,
        stale_before: DateTime<Utc>,
    ) -> impl Future<Output = Result<WebhookClaim>> + Send;

    /// Overwrite a ledger entry.
    fn update_webhook_event(&mut self, event: &WebhookEvent) -> impl Future<Output = Result<()>> + Send;

    /// Look up a ledger entry.
    fn load_webhook_event(
        &mut self,
        fingerprint: &str,
    ) -> impl Future<Output = Result<Option<WebhookEvent>>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Settings
    // ═══════════════════════════════════════════════════════════

    /// Active settings row, else the most recent one.
    fn current_settings(&mut self) -> impl Future<Output = Result<Option<RegistrationSettings>>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Commit.
    fn commit(self) -> impl Future<Output = Result<()>> + Send;
}
