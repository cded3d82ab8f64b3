use crate::{config::AppConfig, errors::ServiceError};
use hmac::{Hmac, Mac};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Razorpay bridge. Creates gateway orders over REST and verifies payment
/// signatures locally; all order state changes stay in `OrderService`.
#[derive(Clone)]
pub struct RazorpayService {
    client: reqwest::Client,
    key_id: Option<String>,
    key_secret: Option<String>,
    base_url: String,
    currency: String,
}

/// What the frontend needs to open the Razorpay checkout widget
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GatewayOrder {
    /// Razorpay's order id, later echoed back during verification
    pub razorpay_order_id: String,
    /// Amount in minor units (paise)
    pub amount: i64,
    pub currency: String,
    /// Publishable key id for the widget
    pub key_id: String,
}

#[derive(Debug, Serialize)]
struct CreateGatewayOrderRequest {
    amount: i64,
    currency: String,
    receipt: String,
    notes: GatewayOrderNotes,
}

#[derive(Debug, Serialize)]
struct GatewayOrderNotes {
    order_id: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct GatewayOrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

impl RazorpayService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
            base_url: config.razorpay_base_url.trim_end_matches('/').to_string(),
            currency: config.default_currency.clone(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), ServiceError> {
        match (self.key_id.as_deref(), self.key_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(ServiceError::GatewayError(
                "Razorpay is not configured".to_string(),
            )),
        }
    }

    /// Creates a gateway order for the given amount. Nothing is written
    /// locally; the returned id ties the gateway order to ours via the
    /// receipt and notes.
    #[instrument(skip(self))]
    pub async fn create_gateway_order(
        &self,
        amount: Decimal,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<GatewayOrder, ServiceError> {
        let (key_id, key_secret) = self.credentials()?;

        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }

        // Razorpay expects minor units (rupees -> paise)
        let minor_units = (amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| ServiceError::ValidationError("Amount out of range".to_string()))?;

        let body = CreateGatewayOrderRequest {
            amount: minor_units,
            currency: self.currency.clone(),
            receipt: order_id.to_string(),
            notes: GatewayOrderNotes {
                order_id: order_id.to_string(),
                user_id: user_id.to_string(),
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(key_id, Some(key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ServiceError::GatewayError(format!(
                "Gateway returned {}",
                status
            )));
        }

        let gateway: GatewayOrderResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("Malformed gateway response: {}", e)))?;

        info!(
            "Created gateway order {} for order {} ({} {})",
            gateway.id, order_id, gateway.amount, gateway.currency
        );

        Ok(GatewayOrder {
            razorpay_order_id: gateway.id,
            amount: gateway.amount,
            currency: gateway.currency,
            key_id: key_id.to_string(),
        })
    }

    /// Verifies a checkout callback: HMAC-SHA256 over
    /// `"{gateway_order_id}|{payment_id}"` keyed with the secret, compared
    /// in constant time against the hex signature the widget supplied.
    pub fn verify_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), ServiceError> {
        let (_, key_secret) = self.credentials()?;
        verify_payment_signature(key_secret, gateway_order_id, payment_id, signature)
    }
}

fn verify_payment_signature(
    key_secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), ServiceError> {
    let supplied = hex::decode(signature.trim()).map_err(|_| ServiceError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("HMAC init failed: {}", e)))?;
    mac.update(format!("{}|{}", gateway_order_id, payment_id).as_bytes());

    // verify_slice is constant-time
    mac.verify_slice(&supplied)
        .map_err(|_| ServiceError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_key_secret";

    fn sign(gateway_order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}|{}", gateway_order_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_passes() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(verify_payment_signature(SECRET, "order_abc", "pay_xyz", &sig).is_ok());
    }

    #[test]
    fn tampered_payment_id_fails() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(matches!(
            verify_payment_signature(SECRET, "order_abc", "pay_other", &sig),
            Err(ServiceError::InvalidSignature)
        ));
    }

    #[test]
    fn non_hex_signature_fails() {
        assert!(matches!(
            verify_payment_signature(SECRET, "order_abc", "pay_xyz", "not-hex!"),
            Err(ServiceError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_secret_fails() {
        let sig = sign("order_abc", "pay_xyz");
        assert!(verify_payment_signature("other_secret", "order_abc", "pay_xyz", &sig).is_err());
    }
}
