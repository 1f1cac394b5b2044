//! Payment provider abstraction.
//!
//! The provider is a black box reachable through three calls: create an
//! order, verify the signature returned to the client after checkout, and
//! verify the signature on webhook deliveries. Signatures are HMAC-SHA256
//! in lowercase hex; [`HmacSigner`] holds the shared computation so the HTTP
//! client and the test double agree byte for byte.

use crate::error::Result;
use crate::types::{Currency, IntentId, Money};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::future::Future;

type HmacSha256 = Hmac<Sha256>;

/// Order creation request sent to the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRequest {
    /// Our intent, sent as the provider receipt
    pub intent: IntentId,
    /// Amount in minor units
    pub amount: Money,
    /// Currency
    pub currency: Currency,
}

/// Order created by the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderOrder {
    /// Provider order reference
    pub order_id: String,
}

/// Payment provider trait
///
/// Every call is an I/O suspension point.
pub trait PaymentProvider: Send + Sync {
    /// Creates an order for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SeatError::Provider`] if the provider rejects the call
    /// or is unreachable.
    fn create_order(&self, request: OrderRequest) -> impl Future<Output = Result<ProviderOrder>> + Send;

    /// Verifies the checkout signature over `order_id|payment_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SeatError::InvalidSignature`] on mismatch.
    fn verify_payment_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Verifies the signature header of a webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SeatError::InvalidSignature`] on mismatch.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> impl Future<Output = Result<()>> + Send;
}

/// HMAC-SHA256 signer with a shared secret
#[derive(Clone)]
pub struct HmacSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").field("secret", &"<redacted>").finish()
    }
}

impl HmacSigner {
    /// Creates a signer for `secret`.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, message: &[u8]) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(message);
        Some(mac)
    }

    /// Lowercase hex signature of `message`, empty if the key is rejected.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> String {
        self.mac(message)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Signature of a checkout `order_id|payment_id` pair.
    #[must_use]
    pub fn sign_payment(&self, order_id: &str, payment_id: &str) -> String {
        self.sign(format!("{order_id}|{payment_id}").as_bytes())
    }

    /// Constant-time check of the hex `signature` against `message`.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        self.mac(message)
            .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    }

    /// Constant-time check of a checkout signature.
    #[must_use]
    pub fn verify_payment(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        self.verify(format!("{order_id}|{payment_id}").as_bytes(), signature)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let signer = HmacSigner::new("Jefe");
        assert_eq!(
            signer.sign(b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let signer = HmacSigner::new("whsec");
        let sig = signer.sign(b"{\"event\":\"payment.captured\"}");
        assert!(signer.verify(b"{\"event\":\"payment.captured\"}", &sig));
        assert!(!signer.verify(b"{\"event\":\"payment.failed\"}", &sig));
        assert!(!HmacSigner::new("other").verify(b"{\"event\":\"payment.captured\"}", &sig));
    }

    #[test]
    fn test_payment_signature_binds_order_and_payment() {
        let signer = HmacSigner::new("key_secret");
        let sig = signer.sign_payment("order_1", "pay_1");
        assert!(signer.verify_payment("order_1", "pay_1", &sig));
        assert!(!signer.verify_payment("order_2", "pay_1", &sig));
        assert!(signer.verify_payment("order_1", "pay_1", &sig.to_uppercase()));
    }

    #[test]
    fn test_verify_rejects_malformed_signatures() {
        let signer = HmacSigner::new("whsec");
        let sig = signer.sign(b"body");
        assert!(!signer.verify(b"body", "not-hex"));
        assert!(!signer.verify(b"body", ""));
        assert!(!signer.verify(b"body", &sig[..32]));
        assert!(signer.verify(b"body", &format!(" {sig}\n")));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", HmacSigner::new("topsecret"));
        assert!(!rendered.contains("topsecret"));
    }
}
