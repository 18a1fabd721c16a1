//! Transactional email via SendGrid
//!
//! Every send is best-effort: failures are logged and swallowed, they never
//! fail the order/booking/refund that triggered them. With no API key
//! configured the service is a no-op (local development).

use serde_json::json;

use crate::db::models::{Order, Reservation};
use crate::utils::time::format_date;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Clone)]
struct EmailConfig {
    api_key: String,
    from_email: String,
}

#[derive(Clone)]
pub struct EmailService {
    client: reqwest::Client,
    config: Option<EmailConfig>,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        let config = match api_key {
            Some(api_key) => Some(EmailConfig { api_key, from_email }),
            None => {
                tracing::warn!("SENDGRID_API_KEY not set, emails disabled");
                None
            }
        };
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// No-op service for tests and offline development
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            config: None,
        }
    }

    /// Fire one mail; logs and swallows every failure.
    async fn send(&self, to: &str, subject: &str, html: &str) {
        let Some(config) = &self.config else {
            tracing::debug!(to = %to, subject = %subject, "Email disabled, skipping send");
            return;
        };

        let payload = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": config.from_email, "name": "Atelier Terre & Feu" },
            "subject": subject,
            "content": [{ "type": "text/html", "value": html }],
        });

        let result = self
            .client
            .post(SENDGRID_URL)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(to = %to, subject = %subject, "Email sent");
            }
            Ok(resp) => {
                tracing::warn!(
                    to = %to,
                    status = %resp.status(),
                    "SendGrid returned non-success status"
                );
            }
            Err(e) => {
                tracing::warn!(to = %to, error = %e, "Failed to send email");
            }
        }
    }

    pub async fn send_order_confirmation(&self, order: &Order) {
        let Some(email) = order.contact_email() else {
            return;
        };
        let html = format!(
            "<p>Merci pour votre commande !</p>\
             <p>Commande <strong>{}</strong> — total {:.2} €.</p>",
            order.id, order.total_amount
        );
        self.send(email, "Votre commande Atelier Terre & Feu", &html)
            .await;
    }

    pub async fn send_reservation_confirmation(&self, reservation: &Reservation, starts_at: i64) {
        let Some(email) = reservation.contact_email() else {
            return;
        };
        let html = format!(
            "<p>Votre réservation <strong>{}</strong> est enregistrée.</p>\
             <p>Séance du {} — {} place(s).</p>",
            reservation.id,
            format_date(starts_at),
            reservation.quantity
        );
        self.send(email, "Votre réservation d'atelier", &html).await;
    }

    pub async fn send_payment_confirmed(&self, email: &str, reference: &str, amount: f64) {
        let html = format!(
            "<p>Votre paiement de {amount:.2} € est confirmé.</p>\
             <p>Référence : <strong>{reference}</strong>.</p>"
        );
        self.send(email, "Paiement confirmé", &html).await;
    }

    pub async fn send_cancellation(&self, email: &str, reference: &str, refunded: f64) {
        let html = if refunded > 0.0 {
            format!(
                "<p>Votre commande <strong>{reference}</strong> a été annulée.</p>\
                 <p>Remboursement : {refunded:.2} €.</p>"
            )
        } else {
            format!("<p>Votre commande <strong>{reference}</strong> a été annulée.</p>")
        };
        self.send(email, "Annulation de votre commande", &html).await;
    }
}
