//! In-memory [`SeatStore`].
//!
//! One async mutex guards the whole dataset. A transaction holds the lock
//! from `begin` until it is committed or dropped and works on a private copy,
//! so commits are atomic, rollbacks are free, and concurrent transactions run
//! strictly one after another. That is stronger than the per-bucket locking
//! the PostgreSQL store provides, which is fine for tests.
//!
//! [`InMemorySeatStore::fail_next`] arms a one-shot storage error so tests
//! can drive the paths that only a real database outage reaches.

use seat_engine_core::catalog::{AggregateCapacity, Cell, Designation, District, Mandal, State};
use seat_engine_core::discount::Discount;
use seat_engine_core::fee::FeeOverride;
use seat_engine_core::intent::PaymentIntent;
use seat_engine_core::seat::{PaymentStatus, Seat, SeatPayment, SeatStatus};
use seat_engine_core::settings::RegistrationSettings;
use seat_engine_core::spec::{LevelBucket, SeatBucket};
use seat_engine_core::store::{SeatStore, SeatTransaction};
use seat_engine_core::types::{
    CellId, ContactNumber, DesignationId, DiscountId, DistrictId, IntentId, MandalId, Purpose, SeatId, StateId,
};
use seat_engine_core::webhook::{WebhookClaim, WebhookEvent, WebhookEventStatus};
use seat_engine_core::{Result, SeatError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Dataset behind the store
#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    /// Cells
    pub cells: HashMap<CellId, Cell>,
    /// Designations
    pub designations: HashMap<DesignationId, Designation>,
    /// Aggregate caps
    pub aggregates: HashMap<LevelBucket, AggregateCapacity>,
    /// States
    pub states: HashMap<StateId, State>,
    /// Districts
    pub districts: HashMap<DistrictId, District>,
    /// Mandals
    pub mandals: HashMap<MandalId, Mandal>,
    /// Seats
    pub seats: HashMap<SeatId, Seat>,
    /// Payment ledger in insertion order
    pub seat_payments: Vec<SeatPayment>,
    /// Fee overrides in insertion order
    pub fee_overrides: Vec<FeeOverride>,
    /// Discounts
    pub discounts: HashMap<DiscountId, Discount>,
    /// Payment intents
    pub intents: HashMap<IntentId, PaymentIntent>,
    /// Webhook ledger by fingerprint
    pub webhook_events: HashMap<String, WebhookEvent>,
    /// Settings rows
    pub settings: Vec<RegistrationSettings>,
}

impl MemoryState {
    fn live_in(&self, bucket: &SeatBucket) -> impl Iterator<Item = &Seat> {
        self.seats
            .values()
            .filter(move |s| s.is_live() && s.spec.seat_bucket() == *bucket)
    }
}

/// Storage call that [`InMemorySeatStore::fail_next`] can break
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreFault {
    /// Opening a transaction
    Begin,
    /// `claim_webhook_event`
    WebhookClaim,
    /// `update_webhook_event`
    WebhookUpdate,
}

#[derive(Debug, Default)]
struct Faults {
    begin: AtomicBool,
    webhook_claim: AtomicBool,
    webhook_update: AtomicBool,
}

impl Faults {
    const fn flag(&self, fault: StoreFault) -> &AtomicBool {
        match fault {
            StoreFault::Begin => &self.begin,
            StoreFault::WebhookClaim => &self.webhook_claim,
            StoreFault::WebhookUpdate => &self.webhook_update,
        }
    }

    fn trip(&self, fault: StoreFault) -> Result<()> {
        if self.flag(fault).swap(false, Ordering::SeqCst) {
            return Err(SeatError::Storage(format!("injected {fault:?} failure")));
        }
        Ok(())
    }
}

/// In-memory store
#[derive(Clone, Default)]
pub struct InMemorySeatStore {
    state: Arc<Mutex<MemoryState>>,
    commits: Arc<AtomicUsize>,
    faults: Arc<Faults>,
}

impl InMemorySeatStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutates the committed dataset directly, outside any transaction.
    pub async fn seed<F>(&self, f: F)
    where
        F: FnOnce(&mut MemoryState),
    {
        f(&mut *self.state.lock().await);
    }

    /// Snapshot of the committed dataset.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Number of committed transactions.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Makes the next call of `fault` fail with [`SeatError::Storage`].
    ///
    /// Shared by every clone of the store. The fault disarms once it fires.
    pub fn fail_next(&self, fault: StoreFault) {
        self.faults.flag(fault).store(true, Ordering::SeqCst);
    }

    /// Live seats of a designation bucket.
    pub async fn live_seats(&self, bucket: &SeatBucket) -> Vec<Seat> {
        self.state.lock().await.live_in(bucket).cloned().collect()
    }
}

impl SeatStore for InMemorySeatStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        self.faults.trip(StoreFault::Begin)?;
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            commits: Arc::clone(&self.commits),
            faults: Arc::clone(&self.faults),
        })
    }
}

/// Transaction over a private copy of the dataset
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    commits: Arc<AtomicUsize>,
    faults: Arc<Faults>,
}

fn conflict(what: &str, id: impl std::fmt::Display) -> SeatError {
    SeatError::Storage(format!("duplicate {what} {id}"))
}

impl SeatTransaction for InMemoryTransaction {
    async fn load_cell(&mut self, id: CellId) -> Result<Option<Cell>> {
        Ok(self.working.cells.get(&id).cloned())
    }

    async fn load_designation(&mut self, id: DesignationId) -> Result<Option<Designation>> {
        Ok(self.working.designations.get(&id).cloned())
    }

    async fn load_aggregate_capacity(&mut self, bucket: &LevelBucket) -> Result<Option<AggregateCapacity>> {
        Ok(self.working.aggregates.get(bucket).cloned())
    }

    async fn load_state(&mut self, id: StateId) -> Result<Option<State>> {
        Ok(self.working.states.get(&id).cloned())
    }

    async fn load_district(&mut self, id: DistrictId) -> Result<Option<District>> {
        Ok(self.working.districts.get(&id).cloned())
    }

    async fn load_mandal(&mut self, id: MandalId) -> Result<Option<Mandal>> {
        Ok(self.working.mandals.get(&id).cloned())
    }

    async fn lock_bucket(&mut self, _bucket: &LevelBucket) -> Result<()> {
        // The store-wide mutex is already held
        Ok(())
    }

    async fn count_live_seats(&mut self, bucket: &SeatBucket) -> Result<u32> {
        let count = self.working.live_in(bucket).count();
        u32::try_from(count).map_err(|e| SeatError::Storage(e.to_string()))
    }

    async fn count_live_seats_in_level(&mut self, bucket: &LevelBucket) -> Result<u32> {
        let count = self
            .working
            .seats
            .values()
            .filter(|s| s.is_live() && s.spec.level_bucket() == *bucket)
            .count();
        u32::try_from(count).map_err(|e| SeatError::Storage(e.to_string()))
    }

    async fn live_sequences(&mut self, bucket: &SeatBucket) -> Result<Vec<u32>> {
        Ok(self.working.live_in(bucket).map(|s| s.seat_sequence).collect())
    }

    async fn insert_seat(&mut self, seat: &Seat) -> Result<()> {
        if seat.is_live()
            && self
                .working
                .live_in(&seat.spec.seat_bucket())
                .any(|s| s.seat_sequence == seat.seat_sequence)
        {
            return Err(conflict("seat sequence", seat.seat_sequence));
        }
        if self.working.seats.insert(seat.id, seat.clone()).is_some() {
            return Err(conflict("seat", seat.id));
        }
        Ok(())
    }

    async fn load_seat(&mut self, id: SeatId) -> Result<Option<Seat>> {
        Ok(self.working.seats.get(&id).cloned())
    }

    async fn load_seat_for_update(&mut self, id: SeatId) -> Result<Option<Seat>> {
        Ok(self.working.seats.get(&id).cloned())
    }

    async fn update_seat(&mut self, seat: &Seat) -> Result<()> {
        match self.working.seats.get_mut(&seat.id) {
            Some(existing) => {
                *existing = seat.clone();
                Ok(())
            }
            None => Err(SeatError::not_found("Seat", seat.id)),
        }
    }

    async fn seats_due_for_expiry(&mut self, now: DateTime<Utc>) -> Result<Vec<Seat>> {
        Ok(self
            .working
            .seats
            .values()
            .filter(|s| s.status == SeatStatus::Active && s.expires_at.is_some_and(|at| at <= now))
            .cloned()
            .collect())
    }

    async fn insert_seat_payment(&mut self, payment: &SeatPayment) -> Result<()> {
        self.working.seat_payments.push(payment.clone());
        Ok(())
    }

    async fn fail_pending_seat_payments(&mut self, seat: SeatId) -> Result<u32> {
        let mut changed = 0;
        for payment in &mut self.working.seat_payments {
            if payment.seat == seat && payment.status == PaymentStatus::Pending {
                payment.status = PaymentStatus::Failed;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn fee_overrides(&mut self, purpose: &Purpose) -> Result<Vec<FeeOverride>> {
        Ok(self
            .working
            .fee_overrides
            .iter()
            .filter(|f| f.purpose == *purpose)
            .cloned()
            .collect())
    }

    async fn insert_fee_override(&mut self, fee: &FeeOverride) -> Result<()> {
        self.working.fee_overrides.push(fee.clone());
        Ok(())
    }

    async fn lock_contact(&mut self, _contact: &ContactNumber) -> Result<()> {
        Ok(())
    }

    async fn discounts_for_contact(&mut self, contact: &ContactNumber) -> Result<Vec<Discount>> {
        Ok(self
            .working
            .discounts
            .values()
            .filter(|d| d.contact == *contact)
            .cloned()
            .collect())
    }

    async fn load_discount(&mut self, id: DiscountId) -> Result<Option<Discount>> {
        Ok(self.working.discounts.get(&id).cloned())
    }

    async fn load_discount_for_update(&mut self, id: DiscountId) -> Result<Option<Discount>> {
        Ok(self.working.discounts.get(&id).cloned())
    }

    async fn insert_discount(&mut self, discount: &Discount) -> Result<()> {
        if self.working.discounts.insert(discount.id, discount.clone()).is_some() {
            return Err(conflict("discount", discount.id));
        }
        Ok(())
    }

    async fn update_discount(&mut self, discount: &Discount) -> Result<()> {
        match self.working.discounts.get_mut(&discount.id) {
            Some(existing) => {
                *existing = discount.clone();
                Ok(())
            }
            None => Err(SeatError::not_found("Discount", discount.id)),
        }
    }

    async fn insert_intent(&mut self, intent: &PaymentIntent) -> Result<()> {
        if self.working.intents.insert(intent.id, intent.clone()).is_some() {
            return Err(conflict("intent", intent.id));
        }
        Ok(())
    }

    async fn load_intent(&mut self, id: IntentId) -> Result<Option<PaymentIntent>> {
        Ok(self.working.intents.get(&id).cloned())
    }

    async fn load_intent_for_update(&mut self, id: IntentId) -> Result<Option<PaymentIntent>> {
        Ok(self.working.intents.get(&id).cloned())
    }

    async fn find_intent_by_provider_order(&mut self, order_id: &str) -> Result<Option<PaymentIntent>> {
        Ok(self
            .working
            .intents
            .values()
            .find(|i| i.provider_order_id.as_deref() == Some(order_id))
            .cloned())
    }

    async fn update_intent(&mut self, intent: &PaymentIntent) -> Result<()> {
        match self.working.intents.get_mut(&intent.id) {
            Some(existing) => {
                *existing = intent.clone();
                Ok(())
            }
            None => Err(SeatError::not_found("PaymentIntent", intent.id)),
        }
    }

    async fn claim_webhook_event(&mut self, event: &WebhookEvent, stale_before: DateTime<Utc>) -> Result<WebhookClaim> {
        self.faults.trip(StoreFault::WebhookClaim)?;
        match self.working.webhook_events.get_mut(&event.fingerprint) {
            None => {
                self.working
                    .webhook_events
                    .insert(event.fingerprint.clone(), event.clone());
                Ok(WebhookClaim::Claimed(event.clone()))
            }
            Some(existing) if existing.is_reclaimable(stale_before) => {
                existing.status = WebhookEventStatus::Received;
                existing.attempts += 1;
                existing.note = None;
                existing.updated_at = event.received_at;
                Ok(WebhookClaim::Claimed(existing.clone()))
            }
            Some(existing) => Ok(WebhookClaim::Duplicate(existing.status)),
        }
    }

    async fn update_webhook_event(&mut self, event: &WebhookEvent) -> Result<()> {
        self.faults.trip(StoreFault::WebhookUpdate)?;
        self.working
            .webhook_events
            .insert(event.fingerprint.clone(), event.clone());
        Ok(())
    }

    async fn load_webhook_event(&mut self, fingerprint: &str) -> Result<Option<WebhookEvent>> {
        Ok(self.working.webhook_events.get(fingerprint).cloned())
    }

    async fn current_settings(&mut self) -> Result<Option<RegistrationSettings>> {
        Ok(self
            .working
            .settings
            .iter()
            .max_by_key(|s| (s.is_active, s.created_at))
            .cloned())
    }

    async fn commit(self) -> Result<()> {
        let Self {
            mut guard,
            working,
            commits,
            ..
        } = self;
        *guard = working;
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
