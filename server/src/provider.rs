//! Payment provider reached over HTTP.
//!
//! Orders are created with `POST {base_url}/v1/orders` using basic auth.
//! Checkout and webhook signatures are verified locally with the shared
//! secrets.

use crate::config::PaymentConfig;
use reqwest::{Client, StatusCode};
use seat_engine_core::provider::{HmacSigner, OrderRequest, PaymentProvider, ProviderOrder};
use seat_engine_core::{Result, SeatError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: u64,
    currency: &'a str,
    receipt: String,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    id: String,
}

/// HTTP payment provider client
#[derive(Clone, Debug)]
pub struct HttpPaymentProvider {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
    checkout: HmacSigner,
    webhook: HmacSigner,
}

impl HttpPaymentProvider {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SeatError::Provider`] if the HTTP client cannot be built.
    pub fn new(config: &PaymentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| SeatError::Provider(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            checkout: HmacSigner::new(&config.key_secret),
            webhook: HmacSigner::new(&config.webhook_secret),
        })
    }
}

impl PaymentProvider for HttpPaymentProvider {
    async fn create_order(&self, request: OrderRequest) -> Result<ProviderOrder> {
        let body = CreateOrderBody {
            amount: request.amount.minor(),
            currency: request.currency.as_str(),
            receipt: request.intent.to_string(),
        };
        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| SeatError::Provider(format!("Order request failed: {e}")))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let order = response
                    .json::<CreateOrderResponse>()
                    .await
                    .map_err(|e| SeatError::Provider(format!("Malformed order response: {e}")))?;
                tracing::debug!(order_id = %order.id, intent = %request.intent, "Provider order created");
                Ok(ProviderOrder { order_id: order.id })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), body = %body, "Provider rejected order");
                Err(SeatError::Provider(format!("order creation returned {status}")))
            }
        }
    }

    async fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<()> {
        if self.checkout.verify_payment(order_id, payment_id, signature) {
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> PaymentConfig {
        PaymentConfig {
            base_url: "http://127.0.0.1:9/".to_string(),
            key_id: "key".to_string(),
            key_secret: "checkout_secret".to_string(),
            webhook_secret: "webhook_secret".to_string(),
            webhook_signature_header: "x-razorpay-signature".to_string(),
            request_timeout: 1,
        }
    }

    #[tokio::test]
    async fn test_verifies_checkout_signature_with_key_secret() {
        let provider = HttpPaymentProvider::new(&config()).unwrap();
        let signature = HmacSigner::new("checkout_secret").sign_payment("order_1", "pay_1");

        assert!(
            provider
                .verify_payment_signature("order_1", "pay_1", &signature)
                .await
                .is_ok()
        );
        assert_eq!(
            provider
                .verify_payment_signature("order_1", "pay_2", &signature)
                .await,
            Err(SeatError::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn test_webhook_uses_its_own_secret() {
        let provider = HttpPaymentProvider::new(&config()).unwrap();
        let body = br#"{"event":"payment.captured"}"#;

        let good = HmacSigner::new("webhook_secret").sign(body);
        let wrong_key = HmacSigner::new("checkout_secret").sign(body);
        assert!(provider.verify_webhook_signature(body, &good).await.is_ok());
        assert!(provider.verify_webhook_signature(body, &wrong_key).await.is_err());
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let provider = HttpPaymentProvider::new(&config()).unwrap();
        assert_eq!(provider.base_url, "http://127.0.0.1:9");
    }
}
