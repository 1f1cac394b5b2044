//! Webhook dedup ledger and provider event parsing.

use crate::error::{Result, SeatError};
use crate::types::WebhookEventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// How long a RECEIVED claim may sit without an outcome before a redelivery
/// takes it over. Covers a handler that died between claim and outcome.
pub const CLAIM_LEASE_SECS: i64 = 300;

/// Status of a ledger entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookEventStatus {
    /// Claimed for processing, or recorded and ignored
    Received,
    /// Processed successfully
    Processed,
    /// Processing failed; a later delivery may reclaim it
    Failed,
}

impl WebhookEventStatus {
    /// Storage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Processed => "PROCESSED",
            Self::Failed => "FAILED",
        }
    }

    /// Parses the storage name.
    ///
    /// # Errors
    ///
    /// [`SeatError::Storage`] for unknown values.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "RECEIVED" => Ok(Self::Received),
            "PROCESSED" => Ok(Self::Processed),
            "FAILED" => Ok(Self::Failed),
            other => Err(SeatError::Storage(format!("unknown webhook status '{other}'"))),
        }
    }
}

impl fmt::Display for WebhookEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry in the webhook dedup ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Identifier
    pub id: WebhookEventId,
    /// SHA-256 of the raw payload, lowercase hex
    pub fingerprint: String,
    /// Provider event type, once parsed
    pub event_type: Option<String>,
    /// Status
    pub status: WebhookEventStatus,
    /// Error or ignore note
    pub note: Option<String>,
    /// Deliveries seen
    pub attempts: u32,
    /// First delivery
    pub received_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Fresh ledger entry for a delivery.
    #[must_use]
    pub fn received(fingerprint: String, now: DateTime<Utc>) -> Self {
        Self {
            id: WebhookEventId::new(),
            fingerprint,
            event_type: None,
            status: WebhookEventStatus::Received,
            note: None,
            attempts: 1,
            received_at: now,
            updated_at: now,
        }
    }

    /// Whether a redelivery may take this entry over.
    ///
    /// FAILED entries always may. A RECEIVED entry with no note is an
    /// abandoned claim once its last change is at or before `stale_before`;
    /// RECEIVED with a note was recorded as ignored and stays put.
    #[must_use]
    pub fn is_reclaimable(&self, stale_before: DateTime<Utc>) -> bool {
        match self.status {
            WebhookEventStatus::Failed => true,
            WebhookEventStatus::Received => self.note.is_none() && self.updated_at <= stale_before,
            WebhookEventStatus::Processed => false,
        }
    }
}

/// Result of claiming a fingerprint
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookClaim {
    /// This delivery owns processing; new, reclaimed from FAILED, or taken
    /// over from an abandoned claim
    Claimed(WebhookEvent),
    /// Already seen and not reclaimable; nothing to do
    Duplicate(WebhookEventStatus),
}

/// SHA-256 fingerprint of a raw payload.
#[must_use]
pub fn fingerprint(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Fields of a provider delivery the engine acts on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEvent {
    /// Event type such as `payment.captured`
    pub event_type: String,
    /// Provider order reference
    pub order_id: Option<String>,
    /// Provider payment reference
    pub payment_id: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    payload: RawPayload,
}

#[derive(Deserialize, Default)]
struct RawPayload {
    payment: Option<Entity<RawPayment>>,
    order: Option<Entity<RawOrder>>,
}

#[derive(Deserialize)]
struct Entity<T> {
    entity: T,
}

#[derive(Deserialize)]
struct RawPayment {
    id: String,
    order_id: Option<String>,
}

#[derive(Deserialize)]
struct RawOrder {
    id: String,
}

impl ProviderEvent {
    /// Parses a delivery of the form
    /// `{"event": "...", "payload": {"payment": {"entity": {...}}, "order": {"entity": {...}}}}`.
    ///
    /// # Errors
    ///
    /// [`SeatError::Validation`] if the body is not such a document.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| SeatError::Validation(format!("Malformed webhook payload: {e}")))?;

        let (payment_id, payment_order) = raw
            .payload
            .payment
            .map_or((None, None), |p| (Some(p.entity.id), p.entity.order_id));
        let order_id = raw.payload.order.map(|o| o.entity.id).or(payment_order);

        Ok(Self {
            event_type: raw.event,
            order_id,
            payment_id,
        })
    }
}
