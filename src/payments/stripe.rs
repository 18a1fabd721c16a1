//! Stripe adapter
//!
//! Checkout Sessions for payment collection, `/v1/refunds` for refunds.
//! Webhook signatures use the `stripe-signature` header:
//! `t=<unix>,v1=<hex hmac-sha256 of "t.payload">`, 5-minute tolerance.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use super::{CheckoutRequest, CheckoutSession, GatewayError, PaymentEvent, PaymentEventKind, PaymentGateway};
use crate::commerce::money::to_cents;
use crate::db::models::Provider;
use crate::utils::time::now_secs;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Replay tolerance for webhook timestamps (seconds)
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
        }
    }

    async fn post_form(&self, path: &str, form: &[(String, String)]) -> Result<Value, GatewayError> {
        let resp = self
            .client
            .post(format!("{API_BASE}{path}"))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        let body: Value = resp.json().await?;
        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown Stripe error");
            return Err(GatewayError::Provider(format!("Stripe: {message}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn provider(&self) -> Provider {
        Provider::Stripe
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "line_items[0][price_data][currency]".to_string(),
                "eur".to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.description.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                to_cents(request.amount).to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "payment_intent_data[metadata][reference_id]".to_string(),
                request.reference_id.clone(),
            ),
        ];
        if let Some(email) = &request.customer_email {
            form.push(("customer_email".to_string(), email.clone()));
        }

        let body = self.post_form("/checkout/sessions", &form).await?;

        // Store the payment-intent id when present; session id otherwise.
        let reference = body
            .get("payment_intent")
            .and_then(Value::as_str)
            .or_else(|| body.get("id").and_then(Value::as_str))
            .ok_or_else(|| GatewayError::Provider("Stripe: missing session id".into()))?
            .to_string();
        let checkout_url = body
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(CheckoutSession {
            reference,
            checkout_url,
        })
    }

    async fn refund_payment(
        &self,
        payment_reference: &str,
        amount: f64,
        reason: Option<&str>,
    ) -> Result<String, GatewayError> {
        let mut form = vec![
            ("payment_intent".to_string(), payment_reference.to_string()),
            ("amount".to_string(), to_cents(amount).to_string()),
        ];
        if let Some(reason) = reason {
            form.push(("metadata[reason]".to_string(), reason.to_string()));
        }

        let body = self.post_form("/refunds", &form).await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Provider("Stripe: missing refund id".into()))
    }
}

/// Verify a `stripe-signature` header against the webhook secret.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str) -> bool {
    verify_signature_at(payload, header, secret, now_secs())
}

/// Timestamp-injectable variant for tests
pub fn verify_signature_at(payload: &[u8], header: &str, secret: &str, now: i64) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if signatures.is_empty() {
        return false;
    }

    // Replay window
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);

    signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|decoded| mac.clone().verify_slice(&decoded).is_ok())
            .unwrap_or(false)
    })
}

/// Map a Stripe webhook payload onto the reconciler's event shape.
///
/// Unhandled event types return None (acknowledged but ignored).
pub fn parse_event(body: &Value) -> Option<PaymentEvent> {
    let event_type = body.get("type").and_then(Value::as_str)?;
    let object = body.pointer("/data/object")?;

    let (kind, reference) = match event_type {
        "payment_intent.succeeded" => (
            PaymentEventKind::Succeeded,
            object.get("id").and_then(Value::as_str)?,
        ),
        "checkout.session.completed" => (
            PaymentEventKind::Succeeded,
            object
                .get("payment_intent")
                .and_then(Value::as_str)
                .or_else(|| object.get("id").and_then(Value::as_str))?,
        ),
        "payment_intent.payment_failed" => (
            PaymentEventKind::Failed,
            object.get("id").and_then(Value::as_str)?,
        ),
        "payment_intent.canceled" => (
            PaymentEventKind::Cancelled,
            object.get("id").and_then(Value::as_str)?,
        ),
        _ => return None,
    };

    Some(PaymentEvent {
        provider: Provider::Stripe,
        kind,
        reference: reference.to_string(),
        payment_id: None,
    })
}
