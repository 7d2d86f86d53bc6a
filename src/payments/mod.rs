//! Payment gateway integration (Razorpay).
//!
//! Order creation is delegated to the gateway; settlement is confirmed by
//! recomputing the checkout signature, an HMAC-SHA256 over
//! `"{order_id}|{payment_id}"` keyed with the secret. Verification fails
//! closed: anything short of an exact hex match is a rejection.

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::PaymentsConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductType {
    PromotionPackage,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::PromotionPackage => "promotion_package",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "promotion_package" => Some(ProductType::PromotionPackage),
            _ => None,
        }
    }

    pub fn price_inr(&self, config: &PaymentsConfig) -> i32 {
        match self {
            ProductType::PromotionPackage => config.promotion_package_price_inr,
        }
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway is not configured")]
    NotConfigured,
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway returned status {0}")]
    GatewayStatus(u16),
}

/// Order as returned by the gateway's orders API.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in the currency's smallest unit (paise).
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Clone)]
pub struct RazorpayClient {
    http: Client,
    base_url: String,
    key_id: Option<String>,
    key_secret: Option<String>,
}

impl RazorpayClient {
    pub fn new(config: &PaymentsConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key_id.is_some() && self.key_secret.is_some()
    }

    /// Public key id, safe to hand to the checkout frontend.
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub async fn create_order(
        &self,
        amount_inr: i32,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        let (key_id, key_secret) = self
            .key_id
            .as_ref()
            .zip(self.key_secret.as_ref())
            .ok_or(PaymentError::NotConfigured)?;

        let body = CreateOrderBody {
            // The gateway counts in paise.
            amount: i64::from(amount_inr) * 100,
            currency: "INR",
            receipt,
        };

        let response = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(key_id, Some(key_secret))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::GatewayStatus(status.as_u16()));
        }

        let order: GatewayOrder = response.json().await?;
        info!(order_id = %order.id, amount = order.amount, "Gateway order created");
        Ok(order)
    }

    /// Checks the checkout signature against our own computation.
    pub fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, PaymentError> {
        let key_secret = self.key_secret.as_ref().ok_or(PaymentError::NotConfigured)?;
        Ok(signature_matches(key_secret, order_id, payment_id, signature))
    }
}

/// Hex HMAC-SHA256 over `"{order_id}|{payment_id}"`.
pub fn compute_signature(key_secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Exact, case-sensitive comparison against the supplied hex signature.
pub fn signature_matches(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    supplied: &str,
) -> bool {
    compute_signature(key_secret, order_id, payment_id) == supplied
}
