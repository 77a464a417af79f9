//! Stripe checkout client and webhook signature verification.

use std::collections::HashMap;

use aivana_atoms::AppError;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const SERVICE: &str = "payment gateway";
const API_BASE: &str = "https://api.stripe.com/v1";

/// Signed notifications older or newer than this are rejected.
pub const SIGNATURE_TOLERANCE_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub plan: String,
    pub amount_cents: i64,
    pub credits: i64,
    pub buyer_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn create_checkout(&self, req: &CheckoutRequest) -> Result<CheckoutSession, AppError>;
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(http: reqwest::Client, secret_key: impl Into<String>) -> Self {
        Self {
            http,
            secret_key: secret_key.into(),
        }
    }
}

/// Form fields of a one-off payment session for a single plan.
fn checkout_form(req: &CheckoutRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", "usd".to_string()),
        ("line_items[0][price_data][unit_amount]", req.amount_cents.to_string()),
        ("line_items[0][price_data][product_data][name]", req.plan.clone()),
        ("metadata[plan]", req.plan.clone()),
        ("metadata[credits]", req.credits.to_string()),
        ("metadata[buyer_id]", req.buyer_id.clone()),
        ("success_url", req.success_url.clone()),
        ("cancel_url", req.cancel_url.clone()),
    ]
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout(&self, req: &CheckoutRequest) -> Result<CheckoutSession, AppError> {
        let resp: SessionResponse = self
            .http
            .post(format!("{}/checkout/sessions", API_BASE))
            .bearer_auth(&self.secret_key)
            .form(&checkout_form(req))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AppError::upstream(SERVICE, e))?
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, e))?;

        let url = resp
            .url
            .ok_or_else(|| AppError::upstream(SERVICE, format!("session {} has no url", resp.id)))?;
        Ok(CheckoutSession { id: resp.id, url })
    }
}

/// A webhook notification. Only the parts the studio reads.
#[derive(Debug, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The session object carried by `checkout.session.completed` and
/// `checkout.session.async_payment_succeeded`.
#[derive(Debug, Deserialize)]
pub struct CompletedSession {
    pub id: String,
    pub amount_total: Option<i64>,
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CompletedSession {
    /// Money has been captured, or the session needed none.
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            Some("paid") | Some("no_payment_required")
        )
    }
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`)
/// against the raw body. Any listed `v1` signature may match.
pub fn verify_signature(secret: &str, header: &str, body: &[u8], now: i64) -> Result<(), AppError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse::<i64>().ok(),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| AppError::validation("signature header has no timestamp"))?;
    if signatures.is_empty() {
        return Err(AppError::validation("signature header has no v1 signature"));
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::validation("signature timestamp outside tolerance"));
    }

    for sig in signatures {
        let Ok(expected) = hex::decode(sig) else {
            continue;
        };
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::validation(format!("unusable webhook secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    tracing::warn!("🚫 payment webhook signature mismatch");
    Err(AppError::validation("payment webhook signature mismatch"))
}
