//! Payment provider test double.

use seat_engine_core::provider::{HmacSigner, OrderRequest, PaymentProvider, ProviderOrder};
use seat_engine_core::{Result, SeatError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Checkout signing secret of the mock provider
pub const TEST_KEY_SECRET: &str = "test_key_secret";

/// Webhook signing secret of the mock provider
pub const TEST_WEBHOOK_SECRET: &str = "test_webhook_secret";

/// Provider that issues sequential order ids and signs with fixed secrets
#[derive(Debug)]
pub struct MockPaymentProvider {
    key: HmacSigner,
    webhook: HmacSigner,
    next_order: AtomicU64,
    orders: Mutex<Vec<OrderRequest>>,
    fail_orders: AtomicBool,
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentProvider {
    /// Creates a provider using [`TEST_KEY_SECRET`] and [`TEST_WEBHOOK_SECRET`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: HmacSigner::new(TEST_KEY_SECRET),
            webhook: HmacSigner::new(TEST_WEBHOOK_SECRET),
            next_order: AtomicU64::new(1),
            orders: Mutex::new(Vec::new()),
            fail_orders: AtomicBool::new(false),
        }
    }

    /// Makes subsequent `create_order` calls fail.
    pub fn fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    /// Orders created so far.
    #[must_use]
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Checkout signature the client would receive.
    #[must_use]
    pub fn sign_payment(&self, order_id: &str, payment_id: &str) -> String {
        self.key.sign_payment(order_id, payment_id)
    }

    /// Signature header for a webhook payload.
    #[must_use]
    pub fn sign_webhook(&self, payload: &[u8]) -> String {
        self.webhook.sign(payload)
    }
}

impl PaymentProvider for MockPaymentProvider {
    async fn create_order(&self, request: OrderRequest) -> Result<ProviderOrder> {
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(SeatError::Provider("order creation disabled".to_string()));
        }
        let n = self.next_order.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut orders) = self.orders.lock() {
            orders.push(request);
        }
        Ok(ProviderOrder {
            order_id: format!("order_test_{n}"),
        })
    }

    async fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<()> {
        if self.key.verify_payment(order_id, payment_id, signature) {
            Ok(())
        } else {
            Err(SeatError::InvalidSignature)
        }
    }

    async fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<()> {
        if self.webhook.verify(payload, signature) {
            Ok(())
        } else {
            Err(SeatError::InvalidSignature)
        }
    }
}

/// Provider-style webhook body for `event` on `order_id`.
#[must_use]
pub fn payment_event_payload(event: &str, order_id: &str, payment_id: &str) -> Vec<u8> {
    serde_json::json!({
        "event": event,
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": order_id,
                    "status": "captured"
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

/// `payment.captured` webhook body.
#[must_use]
pub fn payment_captured_payload(order_id: &str, payment_id: &str) -> Vec<u8> {
    payment_event_payload("payment.captured", order_id, payment_id)
}
