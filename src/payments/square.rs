//! Square adapter
//!
//! Payment links for checkout, `/v2/refunds` for refunds. Webhook
//! signatures arrive in `x-square-hmacsha256-signature`:
//! base64(HMAC-SHA256(signature_key, notification_url + body)).

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use uuid::Uuid;

use super::{CheckoutRequest, CheckoutSession, GatewayError, PaymentEvent, PaymentEventKind, PaymentGateway};
use crate::commerce::money::to_cents;
use crate::db::models::Provider;

const API_BASE: &str = "https://connect.squareup.com/v2";
const SQUARE_VERSION: &str = "2024-01-18";

type HmacSha256 = Hmac<Sha256>;

pub struct SquareGateway {
    client: reqwest::Client,
    access_token: String,
    location_id: String,
}

impl SquareGateway {
    pub fn new(access_token: String, location_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
            location_id,
        }
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, GatewayError> {
        let resp = self
            .client
            .post(format!("{API_BASE}{path}"))
            .bearer_auth(&self.access_token)
            .header("Square-Version", SQUARE_VERSION)
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        let body: Value = resp.json().await?;
        if !status.is_success() {
            let message = body
                .pointer("/errors/0/detail")
                .and_then(Value::as_str)
                .unwrap_or("unknown Square error");
            return Err(GatewayError::Provider(format!("Square: {message}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl PaymentGateway for SquareGateway {
    fn provider(&self) -> Provider {
        Provider::Square
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let payload = json!({
            "idempotency_key": Uuid::new_v4().to_string(),
            "quick_pay": {
                "name": request.description,
                "price_money": {
                    "amount": to_cents(request.amount),
                    "currency": "EUR",
                },
                "location_id": self.location_id,
            },
            "checkout_options": {
                "redirect_url": request.success_url,
            },
            "payment_note": request.reference_id,
        });

        let body = self.post_json("/online-checkout/payment-links", &payload).await?;

        // The payment link's order id is what payment.updated events carry.
        let reference = body
            .pointer("/payment_link/order_id")
            .and_then(Value::as_str)
            .or_else(|| body.pointer("/payment_link/id").and_then(Value::as_str))
            .ok_or_else(|| GatewayError::Provider("Square: missing payment link id".into()))?
            .to_string();
        let checkout_url = body
            .pointer("/payment_link/url")
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
        let payload = json!({
            "idempotency_key": Uuid::new_v4().to_string(),
            "payment_id": payment_reference,
            "amount_money": {
                "amount": to_cents(amount),
                "currency": "EUR",
            },
            "reason": reason.unwrap_or("Remboursement"),
        });

        let body = self.post_json("/refunds", &payload).await?;
        body.pointer("/refund/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Provider("Square: missing refund id".into()))
    }
}

/// Verify the `x-square-hmacsha256-signature` header.
///
/// The signed content is the exact notification URL concatenated with the
/// raw request body.
pub fn verify_signature(
    body: &[u8],
    signature_header: &str,
    signature_key: &str,
    notification_url: &str,
) -> bool {
    let Ok(expected) = BASE64.decode(signature_header.trim()) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(signature_key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(notification_url.as_bytes());
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Map a Square webhook payload onto the reconciler's event shape.
pub fn parse_event(body: &Value) -> Option<PaymentEvent> {
    let event_type = body.get("type").and_then(Value::as_str)?;
    if event_type != "payment.updated" && event_type != "payment.created" {
        return None;
    }

    let payment = body.pointer("/data/object/payment")?;
    let status = payment.get("status").and_then(Value::as_str)?;
    let payment_id = payment.get("id").and_then(Value::as_str);
    // Payments created through a payment link carry our stored order id
    let reference = payment
        .get("order_id")
        .and_then(Value::as_str)
        .or(payment_id)?;

    let kind = match status {
        "COMPLETED" => PaymentEventKind::Succeeded,
        "FAILED" => PaymentEventKind::Failed,
        "CANCELED" => PaymentEventKind::Cancelled,
        // APPROVED/PENDING are not terminal, wait for the next update
        _ => return None,
    };

    Some(PaymentEvent {
        provider: Provider::Square,
        kind,
        reference: reference.to_string(),
        payment_id: payment_id.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "square_signature_key";
    const URL: &str = "https://api.atelier.example/api/square/webhook";

    fn sign(body: &[u8], key: &str, url: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
        mac.update(url.as_bytes());
        mac.update(body);
        BASE64.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"type":"payment.updated"}"#;
        let header = sign(body, KEY, URL);
        assert!(verify_signature(body, &header, KEY, URL));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let body = br#"{"type":"payment.updated"}"#;
        let header = sign(body, "other_key", URL);
        assert!(!verify_signature(body, &header, KEY, URL));
    }

    #[test]
    fn test_wrong_url_rejected() {
        // The notification URL is part of the signed content
        let body = br#"{"type":"payment.updated"}"#;
        let header = sign(body, KEY, "https://evil.example/hook");
        assert!(!verify_signature(body, &header, KEY, URL));
    }

    #[test]
    fn test_garbage_header_rejected() {
        let body = br#"{}"#;
        assert!(!verify_signature(body, "not base64 at all!!!", KEY, URL));
    }

    #[test]
    fn test_parse_completed_payment() {
        let body = json!({
            "type": "payment.updated",
            "data": { "object": { "payment": {
                "id": "pay_1", "status": "COMPLETED", "order_id": "ord_7"
            }}}
        });
        let event = parse_event(&body).unwrap();
        assert_eq!(event.kind, PaymentEventKind::Succeeded);
        assert_eq!(event.reference, "ord_7");
        assert_eq!(event.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(event.provider, Provider::Square);
    }

    #[test]
    fn test_parse_failed_payment() {
        let body = json!({
            "type": "payment.updated",
            "data": { "object": { "payment": { "id": "pay_1", "status": "FAILED" }}}
        });
        let event = parse_event(&body).unwrap();
        assert_eq!(event.kind, PaymentEventKind::Failed);
        // Falls back to the payment id when no order id is present
        assert_eq!(event.reference, "pay_1");
    }

    #[test]
    fn test_parse_pending_payment_ignored() {
        let body = json!({
            "type": "payment.updated",
            "data": { "object": { "payment": { "id": "pay_1", "status": "PENDING" }}}
        });
        assert!(parse_event(&body).is_none());
    }

    #[test]
    fn test_parse_unrelated_event_ignored() {
        let body = json!({ "type": "refund.updated", "data": {} });
        assert!(parse_event(&body).is_none());
    }
}
