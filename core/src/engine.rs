//! Registration engine facade.
//!
//! Owns the collaborators and runs every operation in its own transaction.
//! Provider and identity calls happen outside database transactions so no
//! lock is held across a network round-trip to a third party.

use crate::capacity::{self, CapacityReport};
use crate::discount::{self, Discount, DiscountStatus, DiscountValue};
use crate::environment::{Clock, IdentityStore, ProfileStore};
use crate::error::{Result, SeatError};
use crate::fee::{FeeOverride, FeeScope};
use crate::finalizer::{self, FinalizeOutcome};
use crate::intent::{IntentStatus, IntentTransition, PaymentIntent};
use crate::lifecycle::{self, ReassignOutcome};
use crate::pricing::{self, Quote, QuoteRequest};
use crate::provider::{OrderRequest, PaymentProvider};
use crate::reservation::{self, ReservationMode, ReservationOutcome, ReservationRequest};
use crate::seat::{Seat, SeatStatus};
use crate::settings::EngineConfig;
use crate::spec::SeatSpec;
use crate::store::{SeatStore, SeatTransaction};
use crate::types::{
    ContactNumber, Currency, DiscountId, FeeOverrideId, IntentId, Money, Purpose, SeatId, TeamId, UserId,
};
use crate::webhook::{self, ProviderEvent, WebhookClaim, WebhookEvent, WebhookEventStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Input to [`RegistrationEngine::create_intent`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateIntent {
    /// Seat to pay for
    pub spec: SeatSpec,
    /// Paying contact
    pub contact: ContactNumber,
    /// Team for fee scoping
    pub team: Option<TeamId>,
}

/// Intent created and ready for checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentCreated {
    /// Client-facing order id
    pub order_id: IntentId,
    /// Amount to pay
    pub amount: Money,
    /// Currency
    pub currency: Currency,
    /// Provider order for checkout; absent for free seats
    pub provider_order_id: Option<String>,
    /// Price breakdown
    pub quote: Quote,
}

/// Outcome reported by the client after checkout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmStatus {
    /// Checkout succeeded
    Success,
    /// Checkout failed or was abandoned
    Failed,
}

/// Input to [`RegistrationEngine::confirm`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmPayment {
    /// Order id returned by `create_intent`
    pub order_id: IntentId,
    /// Reported outcome
    pub status: ConfirmStatus,
    /// Provider payment reference
    pub provider_payment_ref: Option<String>,
    /// Provider checkout signature
    pub provider_signature: Option<String>,
    /// Failure reason for FAILED
    pub reason: Option<String>,
}

/// Result of a confirm call
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOutcome {
    /// Intent status after the call
    pub status: IntentStatus,
    /// Allocated seat
    pub seat_id: Option<SeatId>,
}

/// Read model for `GET /status/{orderId}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentStatusView {
    /// Order id
    pub order_id: IntentId,
    /// Status
    pub status: IntentStatus,
    /// Amount
    pub amount: Money,
    /// Currency
    pub currency: Currency,
    /// Whether the client may proceed to registration
    pub can_register: bool,
    /// Allocated seat
    pub seat_id: Option<SeatId>,
}

/// Acknowledgment for a webhook delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookAck {
    /// Signature missing or invalid; provider should retry
    Rejected,
    /// Fingerprint already handled
    Duplicate,
    /// Event type not acted on
    Ignored,
    /// Drove the intent to a terminal state
    Processed,
    /// Processing failed, or the ledger could not be written
    Failed(String),
}

impl WebhookAck {
    /// Metric label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
            Self::Processed => "processed",
            Self::Failed(_) => "failed",
        }
    }
}

/// Input to [`RegistrationEngine::create_discount`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDiscount {
    /// Contact
    pub contact: ContactNumber,
    /// Percentage off
    pub percent_off: u8,
    /// Window start
    pub active_from: Option<DateTime<Utc>>,
    /// Window end
    pub active_to: Option<DateTime<Utc>>,
}

/// Input to [`RegistrationEngine::create_fee_override`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewFeeOverride {
    /// Purpose
    pub purpose: Purpose,
    /// Scope
    pub scope: FeeScope,
    /// Amount
    pub amount: Money,
    /// Currency
    pub currency: Currency,
    /// Renewal cadence
    pub renewal_interval_months: Option<u32>,
}

/// Whether downstream artifacts (ID card) may be issued for a seat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardEligibility {
    /// Both conditions hold
    pub eligible: bool,
    /// Profile has a photo
    pub has_photo: bool,
    /// Seat is ACTIVE
    pub seat_active: bool,
}

/// Seat allocation and payment-gated registration engine
pub struct RegistrationEngine<S, P, I, R> {
    store: Arc<S>,
    provider: Arc<P>,
    identities: Arc<I>,
    profiles: Arc<R>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<S, P, I, R> Clone for RegistrationEngine<S, P, I, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            provider: Arc::clone(&self.provider),
            identities: Arc::clone(&self.identities),
            profiles: Arc::clone(&self.profiles),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<S, P, I, R> RegistrationEngine<S, P, I, R>
where
    S: SeatStore,
    P: PaymentProvider,
    I: IdentityStore,
    R: ProfileStore,
{
    /// Creates an engine.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        provider: Arc<P>,
        identities: Arc<I>,
        profiles: Arc<R>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            provider,
            identities,
            profiles,
            clock,
            config,
        }
    }

    /// Engine configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ═══════════════════════════════════════════════════════════
    // Capacity and Quotes
    // ═══════════════════════════════════════════════════════════

    /// Capacity report for a seat spec. No side effects.
    ///
    /// # Errors
    ///
    /// [`SeatError::NotFound`] for an unknown cell or designation.
    pub async fn availability(&self, spec: &SeatSpec) -> Result<CapacityReport> {
        let mut tx = self.store.begin().await?;
        let report = capacity::resolve(&mut tx, spec).await?;
        tx.commit().await?;
        Ok(report)
    }

    /// Prices a seat.
    ///
    /// # Errors
    ///
    /// [`SeatError::NotFound`] for unknown references.
    #[tracing::instrument(skip(self, request), fields(purpose = %request.purpose))]
    pub async fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        let mut tx = self.store.begin().await?;
        let quote = pricing::quote_in_tx(&mut tx, request, &self.config, self.now()).await?;
        tx.commit().await?;
        Ok(quote)
    }

    fn membership_quote(&self, spec: SeatSpec, team: Option<TeamId>, contact: Option<ContactNumber>) -> QuoteRequest {
        QuoteRequest {
            purpose: self.config.membership_purpose.clone(),
            spec,
            team,
            contact,
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Direct Reservation
    // ═══════════════════════════════════════════════════════════

    /// Reserves a provisional seat for an existing or future identity.
    ///
    /// The seat carries the membership fee without contact discounts.
    ///
    /// # Errors
    ///
    /// [`SeatError::NotFound`] for unknown references. A full bucket is
    /// reported as [`ReservationOutcome::Rejected`].
    #[tracing::instrument(skip(self, spec), fields(designation = %spec.designation))]
    pub async fn reserve_seat(
        &self,
        user: Option<UserId>,
        spec: SeatSpec,
        team: Option<TeamId>,
    ) -> Result<ReservationOutcome> {
        let now = self.now();
        let mut tx = self.store.begin().await?;
        let quote = pricing::quote_in_tx(&mut tx, &self.membership_quote(spec.clone(), team, None), &self.config, now)
            .await?;
        let outcome = reservation::reserve_in_tx(
            &mut tx,
            ReservationRequest {
                user,
                spec,
                fee: quote.amount,
                mode: ReservationMode::Provisional,
            },
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(outcome)
    }

    // ═══════════════════════════════════════════════════════════
    // Payment Intents
    // ═══════════════════════════════════════════════════════════

    /// Prices the seat, opens a provider order and persists a PENDING intent.
    ///
    /// A discount applied to the quote is moved to RESERVED so no other
    /// intent can use it.
    ///
    /// # Errors
    ///
    /// - [`SeatError::NotFound`] for unknown references
    /// - [`SeatError::SoldOut`] if the bucket is already full
    /// - [`SeatError::Conflict`] if the quoted discount was taken meanwhile
    /// - [`SeatError::Provider`] if the order cannot be created
    #[tracing::instrument(skip(self, request), fields(designation = %request.spec.designation))]
    pub async fn create_intent(&self, request: CreateIntent) -> Result<IntentCreated> {
        let now = self.now();
        let quote_request = self.membership_quote(request.spec.clone(), request.team, Some(request.contact.clone()));

        let mut tx = self.store.begin().await?;
        let quote = pricing::quote_in_tx(&mut tx, &quote_request, &self.config, now).await?;
        let report = capacity::resolve(&mut tx, &request.spec).await?;
        tx.commit().await?;
        if let Some(reason) = report.rejection() {
            tracing::warn!(reason = reason.as_str(), "Intent refused, bucket full");
            return Err(SeatError::SoldOut);
        }

        let id = IntentId::new();
        let provider_order_id = if quote.amount.is_zero() {
            None
        } else {
            let order = self
                .provider
                .create_order(OrderRequest {
                    intent: id,
                    amount: quote.amount,
                    currency: quote.currency.clone(),
                })
                .await?;
            Some(order.order_id)
        };

        let intent = PaymentIntent {
            id,
            contact: request.contact,
            purpose: quote_request.purpose,
            spec: request.spec,
            team: request.team,
            base_amount: quote.base_amount,
            discount: quote.discount.clone(),
            amount: quote.amount,
            currency: quote.currency.clone(),
            status: IntentStatus::Pending,
            provider_order_id: provider_order_id.clone(),
            provider_payment_ref: None,
            failure_reason: None,
            user: None,
            seat: None,
            created_at: now,
            updated_at: now,
            finalized_at: None,
        };

        let mut tx = self.store.begin().await?;
        if let Some(applied) = &intent.discount {
            tx.lock_contact(&intent.contact).await?;
            let mut held = tx
                .load_discount_for_update(applied.discount_id)
                .await?
                .filter(|d| d.status == DiscountStatus::Active)
                .ok_or_else(|| SeatError::Conflict("discount is no longer available; quote again".to_string()))?;
            held.transition(DiscountStatus::Reserved, now)?;
            tx.update_discount(&held).await?;
        }
        tx.insert_intent(&intent).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %intent.id,
            amount = intent.amount.minor(),
            provider_order_id = ?provider_order_id,
            "Payment intent created"
        );

        Ok(IntentCreated {
            order_id: intent.id,
            amount: intent.amount,
            currency: intent.currency,
            provider_order_id,
            quote,
        })
    }

    /// Applies the client-reported checkout outcome.
    ///
    /// FAILED marks a pending intent failed and releases its discount.
    /// SUCCESS verifies the signature and finalizes. Repeating a call after
    /// the intent settled returns the settled result.
    ///
    /// # Errors
    ///
    /// - [`SeatError::NotFound`] for an unknown order
    /// - [`SeatError::MissingPgSignature`] when a paid intent is confirmed
    ///   without signature and signatures are required
    /// - [`SeatError::InvalidSignature`] on mismatch; nothing changes
    /// - [`SeatError::InvalidTransition`] for SUCCESS on a FAILED intent
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, status = ?request.status))]
    pub async fn confirm(&self, request: ConfirmPayment) -> Result<ConfirmOutcome> {
        match request.status {
            ConfirmStatus::Failed => self.fail_intent(request.order_id, request.reason).await,
            ConfirmStatus::Success => self.confirm_success(request).await,
        }
    }

    async fn fail_intent(&self, id: IntentId, reason: Option<String>) -> Result<ConfirmOutcome> {
        let now = self.now();
        let mut tx = self.store.begin().await?;
        let mut intent = tx
            .load_intent_for_update(id)
            .await?
            .ok_or_else(|| SeatError::not_found("PaymentIntent", id))?;

        if intent.status != IntentStatus::Pending {
            // Already settled; a late failure report never regresses it
            return Ok(ConfirmOutcome {
                status: intent.status,
                seat_id: intent.seat,
            });
        }

        intent.apply(IntentTransition::Fail { reason }, now)?;
        tx.update_intent(&intent).await?;
        if let Some(applied) = &intent.discount {
            discount::settle_reserved(&mut tx, applied.discount_id, DiscountStatus::Active, now).await?;
        }
        tx.commit().await?;

        tracing::info!(order_id = %id, reason = ?intent.failure_reason, "Payment intent failed");
        Ok(ConfirmOutcome {
            status: IntentStatus::Failed,
            seat_id: None,
        })
    }

    async fn confirm_success(&self, request: ConfirmPayment) -> Result<ConfirmOutcome> {
        let intent = self.load_intent(request.order_id).await?;

        if let Some(order_id) = &intent.provider_order_id {
            match (&request.provider_payment_ref, &request.provider_signature) {
                (Some(payment_ref), Some(signature)) => {
                    if let Err(e) = self
                        .provider
                        .verify_payment_signature(order_id, payment_ref, signature)
                        .await
                    {
                        tracing::warn!(order_id = %intent.id, error = %e, "Payment signature rejected");
                        return Err(e);
                    }
                }
                (None, Some(_)) => {
                    return Err(SeatError::Validation(
                        "providerPaymentRef is required with providerSignature".to_string(),
                    ));
                }
                (_, None) if self.config.require_payment_signature => {
                    return Err(SeatError::MissingPgSignature);
                }
                (_, None) => {}
            }
        }

        match intent.status {
            IntentStatus::Failed => Err(SeatError::invalid_transition(IntentStatus::Failed, IntentStatus::Success)),
            _ => {
                let outcome = self.finalize(intent.id, request.provider_payment_ref).await?;
                Ok(Self::confirm_outcome(&outcome))
            }
        }
    }

    fn confirm_outcome(outcome: &FinalizeOutcome) -> ConfirmOutcome {
        match outcome {
            FinalizeOutcome::Registered { seat_id, .. } => ConfirmOutcome {
                status: IntentStatus::Success,
                seat_id: Some(*seat_id),
            },
            FinalizeOutcome::RefundRequired { .. } => ConfirmOutcome {
                status: IntentStatus::RefundRequired,
                seat_id: None,
            },
        }
    }

    /// Finalizes a paid intent: resolves the identity, re-checks capacity,
    /// allocates and activates the seat and links it to the intent.
    ///
    /// Idempotent. Concurrent and repeated calls return the same seat.
    ///
    /// # Errors
    ///
    /// [`SeatError::NotFound`], [`SeatError::InvalidTransition`] for a FAILED
    /// intent, or storage and identity failures.
    #[tracing::instrument(skip(self, payment_ref))]
    pub async fn finalize(&self, intent_id: IntentId, payment_ref: Option<String>) -> Result<FinalizeOutcome> {
        let intent = self.load_intent(intent_id).await?;
        if let (IntentStatus::Success, Some(seat_id)) = (intent.status, intent.seat) {
            return Ok(FinalizeOutcome::Registered {
                intent,
                seat_id,
                already_finalized: true,
            });
        }

        let user = self.identities.find_or_create_by_contact(&intent.contact).await?;

        let mut tx = self.store.begin().await?;
        let outcome = finalizer::finalize_in_tx(&mut tx, intent_id, user, payment_ref, self.now()).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn load_intent(&self, id: IntentId) -> Result<PaymentIntent> {
        let mut tx = self.store.begin().await?;
        let intent = tx
            .load_intent(id)
            .await?
            .ok_or_else(|| SeatError::not_found("PaymentIntent", id))?;
        tx.commit().await?;
        Ok(intent)
    }

    /// Status of an intent for polling clients.
    ///
    /// # Errors
    ///
    /// [`SeatError::NotFound`] for an unknown order.
    pub async fn intent_status(&self, id: IntentId) -> Result<IntentStatusView> {
        let intent = self.load_intent(id).await?;
        Ok(IntentStatusView {
            order_id: intent.id,
            status: intent.status,
            amount: intent.amount,
            currency: intent.currency.clone(),
            can_register: intent.can_register(),
            seat_id: intent.seat,
        })
    }

    // ═══════════════════════════════════════════════════════════
    // Webhooks
    // ═══════════════════════════════════════════════════════════

    /// Reconciles a provider webhook delivery.
    ///
    /// Processing failures are recorded on the ledger entry and reported as
    /// [`WebhookAck::Failed`], which still acknowledges the delivery. Ledger
    /// write failures are logged, counted in
    /// `seat_engine_webhook_ledger_errors_total`, and also answered with
    /// [`WebhookAck::Failed`]. A claim left RECEIVED by a lost outcome write
    /// is taken over by a redelivery after [`webhook::CLAIM_LEASE_SECS`].
    #[tracing::instrument(skip_all, fields(bytes = payload.len()))]
    pub async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> WebhookAck {
        let Some(signature) = signature else {
            tracing::warn!("Webhook without signature rejected");
            return WebhookAck::Rejected;
        };
        if let Err(e) = self.provider.verify_webhook_signature(payload, signature).await {
            tracing::warn!(error = %e, "Webhook signature rejected");
            return WebhookAck::Rejected;
        }

        let now = self.now();
        let fingerprint = webhook::fingerprint(payload);
        let stale_before = now - chrono::Duration::seconds(webhook::CLAIM_LEASE_SECS);
        let claim = match self
            .claim_webhook(&WebhookEvent::received(fingerprint.clone(), now), stale_before)
            .await
        {
            Ok(claim) => claim,
            Err(e) => return ledger_failure("claim", &fingerprint, &e),
        };

        let mut event = match claim {
            WebhookClaim::Claimed(event) => event,
            WebhookClaim::Duplicate(status) => {
                tracing::debug!(fingerprint = %fingerprint, status = %status, "Duplicate webhook");
                return WebhookAck::Duplicate;
            }
        };

        let (ack, event_type) = match ProviderEvent::parse(payload) {
            Ok(parsed) => {
                let event_type = parsed.event_type.clone();
                (self.process_webhook(parsed).await, Some(event_type))
            }
            Err(e) => (WebhookAck::Failed(e.to_string()), None),
        };

        event.event_type = event_type;
        event.updated_at = self.now();
        match &ack {
            WebhookAck::Processed => {
                event.status = WebhookEventStatus::Processed;
                event.note = None;
            }
            WebhookAck::Ignored => {
                event.status = WebhookEventStatus::Received;
                event.note = Some("ignored".to_string());
            }
            WebhookAck::Failed(note) => {
                event.status = WebhookEventStatus::Failed;
                event.note = Some(note.clone());
            }
            WebhookAck::Rejected | WebhookAck::Duplicate => {}
        }

        if let Err(e) = self.record_webhook_outcome(&event).await {
            return ledger_failure("outcome", &fingerprint, &e);
        }

        match &ack {
            WebhookAck::Failed(note) => {
                tracing::warn!(fingerprint = %fingerprint, event_type = ?event.event_type, note = %note, "Webhook processing failed");
            }
            _ => {
                tracing::info!(fingerprint = %fingerprint, event_type = ?event.event_type, outcome = ack.as_str(), "Webhook handled");
            }
        }
        ack
    }

    async fn claim_webhook(&self, event: &WebhookEvent, stale_before: DateTime<Utc>) -> Result<WebhookClaim> {
        let mut tx = self.store.begin().await?;
        let claim = tx.claim_webhook_event(event, stale_before).await?;
        tx.commit().await?;
        Ok(claim)
    }

    async fn record_webhook_outcome(&self, event: &WebhookEvent) -> Result<()> {
        let mut tx = self.store.begin().await?;
        tx.update_webhook_event(event).await?;
        tx.commit().await
    }

    async fn process_webhook(&self, event: ProviderEvent) -> WebhookAck {
        if !self.config.success_event_types.iter().any(|t| *t == event.event_type) {
            return WebhookAck::Ignored;
        }
        let Some(order_id) = event.order_id else {
            return WebhookAck::Failed("payment event without order reference".to_string());
        };

        let intent = match self.find_intent_by_order(&order_id).await {
            Ok(Some(intent)) => intent,
            Ok(None) => return WebhookAck::Failed(format!("no payment intent for order {order_id}")),
            Err(e) => return WebhookAck::Failed(e.to_string()),
        };

        match self.finalize(intent.id, event.payment_id).await {
            Ok(FinalizeOutcome::Registered { .. }) => WebhookAck::Processed,
            Ok(FinalizeOutcome::RefundRequired { intent }) => {
                tracing::warn!(order_id = %intent.id, "Webhook payment needs refund");
                WebhookAck::Processed
            }
            Err(e) => WebhookAck::Failed(e.to_string()),
        }
    }

    async fn find_intent_by_order(&self, order_id: &str) -> Result<Option<PaymentIntent>> {
        let mut tx = self.store.begin().await?;
        let intent = tx.find_intent_by_provider_order(order_id).await?;
        tx.commit().await?;
        Ok(intent)
    }

    // ═══════════════════════════════════════════════════════════
    // Discount and Fee Administration
    // ═══════════════════════════════════════════════════════════

    /// Creates an ACTIVE percent discount for a contact.
    ///
    /// # Errors
    ///
    /// - [`SeatError::Validation`] for a bad percentage or window
    /// - [`SeatError::Conflict`] if the contact already holds a discount
    pub async fn create_discount(&self, request: NewDiscount) -> Result<Discount> {
        discount::validate_percent(request.percent_off)?;
        if let (Some(from), Some(to)) = (request.active_from, request.active_to) {
            if from > to {
                return Err(SeatError::Validation("activeFrom must not be after activeTo".to_string()));
            }
        }

        let now = self.now();
        let discount = Discount {
            id: DiscountId::new(),
            contact: request.contact,
            value: DiscountValue::Percent(request.percent_off),
            status: DiscountStatus::Active,
            active_from: request.active_from,
            active_to: request.active_to,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.lock_contact(&discount.contact).await?;
        let existing = tx.discounts_for_contact(&discount.contact).await?;
        discount::ensure_unique_held(&existing, &discount)?;
        tx.insert_discount(&discount).await?;
        tx.commit().await?;

        tracing::info!(discount_id = %discount.id, percent_off = request.percent_off, "Discount created");
        Ok(discount)
    }

    /// Moves a discount to `status`.
    ///
    /// # Errors
    ///
    /// - [`SeatError::NotFound`] for an unknown discount
    /// - [`SeatError::Conflict`] if `status` is held and another held
    ///   discount exists for the contact
    /// - [`SeatError::InvalidTransition`] out of REDEEMED
    pub async fn update_discount_status(&self, id: DiscountId, status: DiscountStatus) -> Result<Discount> {
        let now = self.now();
        let mut tx = self.store.begin().await?;
        let contact = tx
            .load_discount(id)
            .await?
            .ok_or_else(|| SeatError::not_found("Discount", id))?
            .contact;

        tx.lock_contact(&contact).await?;
        let mut discount = tx
            .load_discount_for_update(id)
            .await?
            .ok_or_else(|| SeatError::not_found("Discount", id))?;
        discount.transition(status, now)?;
        discount::ensure_unique_held(&tx.discounts_for_contact(&contact).await?, &discount)?;
        tx.update_discount(&discount).await?;
        tx.commit().await?;

        tracing::info!(discount_id = %id, status = %status, "Discount status changed");
        Ok(discount)
    }

    /// Creates a fee override.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn create_fee_override(&self, request: NewFeeOverride) -> Result<FeeOverride> {
        let fee = FeeOverride {
            id: FeeOverrideId::new(),
            purpose: request.purpose,
            scope: request.scope,
            amount: request.amount,
            currency: request.currency,
            renewal_interval_months: request.renewal_interval_months,
            created_at: self.now(),
        };
        let mut tx = self.store.begin().await?;
        tx.insert_fee_override(&fee).await?;
        tx.commit().await?;
        tracing::info!(override_id = %fee.id, purpose = %fee.purpose, scope = ?fee.scope, "Fee override created");
        Ok(fee)
    }

    // ═══════════════════════════════════════════════════════════
    // Seat Lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Loads a seat.
    ///
    /// # Errors
    ///
    /// [`SeatError::NotFound`] for an unknown seat.
    pub async fn seat(&self, id: SeatId) -> Result<Seat> {
        let mut tx = self.store.begin().await?;
        let seat = tx.load_seat(id).await?.ok_or_else(|| SeatError::not_found("Seat", id))?;
        tx.commit().await?;
        Ok(seat)
    }

    /// Admin override activating a pending seat.
    ///
    /// # Errors
    ///
    /// See [`lifecycle::approve_in_tx`].
    pub async fn approve_seat(&self, id: SeatId) -> Result<Seat> {
        let mut tx = self.store.begin().await?;
        let seat = lifecycle::approve_in_tx(&mut tx, id, self.now()).await?;
        tx.commit().await?;
        Ok(seat)
    }

    /// Revokes a live seat.
    ///
    /// # Errors
    ///
    /// See [`lifecycle::revoke_in_tx`].
    pub async fn revoke_seat(&self, id: SeatId) -> Result<Seat> {
        let mut tx = self.store.begin().await?;
        let seat = lifecycle::revoke_in_tx(&mut tx, id, self.now()).await?;
        tx.commit().await?;
        Ok(seat)
    }

    /// Expires every active seat past its validity.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn expire_due(&self) -> Result<Vec<SeatId>> {
        let mut tx = self.store.begin().await?;
        let expired = lifecycle::expire_due_in_tx(&mut tx, self.now()).await?;
        tx.commit().await?;
        Ok(expired)
    }

    /// Moves a seat to `target`, recomputing the membership fee.
    ///
    /// # Errors
    ///
    /// See [`lifecycle::reassign_in_tx`].
    pub async fn reassign_seat(&self, id: SeatId, target: SeatSpec, team: Option<TeamId>) -> Result<ReassignOutcome> {
        let now = self.now();
        let mut tx = self.store.begin().await?;
        let quote = pricing::quote_in_tx(&mut tx, &self.membership_quote(target.clone(), team, None), &self.config, now)
            .await?;
        let outcome = lifecycle::reassign_in_tx(&mut tx, id, target, quote.amount, now).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Checks whether an ID card may be issued for `seat_id` held by `user`.
    ///
    /// # Errors
    ///
    /// [`SeatError::NotFound`] if the seat does not exist or belongs to
    /// someone else.
    pub async fn card_eligibility(&self, user: UserId, seat_id: SeatId) -> Result<CardEligibility> {
        let seat = self.seat(seat_id).await?;
        if seat.user != Some(user) {
            return Err(SeatError::not_found("Seat", seat_id));
        }
        let has_photo = self.profiles.has_photo(user).await?;
        let seat_active = seat.status == SeatStatus::Active;
        Ok(CardEligibility {
            eligible: has_photo && seat_active,
            has_photo,
            seat_active,
        })
    }
}

fn ledger_failure(stage: &'static str, fingerprint: &str, error: &SeatError) -> WebhookAck {
    tracing::error!(stage, fingerprint = %fingerprint, error = %error, "Webhook ledger write failed");
    metrics::counter!("seat_engine_webhook_ledger_errors_total", "stage" => stage).increment(1);
    WebhookAck::Failed(format!("webhook ledger unavailable: {error}"))
}
