//! Payment gateway adapters
//!
//! Stripe and Square are external collaborators: these adapters only create
//! checkouts, issue refunds and translate webhook payloads into the single
//! [`PaymentEvent`] shape consumed by the reconciler. Business state never
//! depends on which vendor took the charge.

pub mod square;
pub mod stripe;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::core::Config;
use crate::db::models::Provider;

pub use square::SquareGateway;
pub use stripe::StripeGateway;

/// Gateway call failures
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Http(String),

    /// The provider answered with an error payload
    #[error("{0}")]
    Provider(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Http(err.to_string())
    }
}

/// Checkout creation input (amount is the gateway share, gift card excluded)
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Our aggregate id, carried in provider metadata
    pub reference_id: String,
    /// Line shown on the provider's payment page
    pub description: String,
    pub amount: f64,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Checkout creation result
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// Provider payment reference stored on the aggregate
    /// (Stripe payment-intent id / Square order id)
    pub reference: String,
    /// Redirect URL for the customer, when the provider returns one
    pub checkout_url: Option<String>,
}

/// Webhook event kinds relevant to reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
    Succeeded,
    Failed,
    Cancelled,
}

/// One normalized shape for both vendors' webhook payloads
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub provider: Provider,
    pub kind: PaymentEventKind,
    /// Matches the aggregate's stored payment_reference
    pub reference: String,
    /// Final provider payment id, when the payload carries one
    pub payment_id: Option<String>,
}

/// Payment provider seam: checkout creation and refunds
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> Provider;

    async fn create_checkout(&self, request: &CheckoutRequest)
    -> Result<CheckoutSession, GatewayError>;

    /// Refund `amount` of the original charge; returns the provider refund id
    async fn refund_payment(
        &self,
        payment_reference: &str,
        amount: f64,
        reason: Option<&str>,
    ) -> Result<String, GatewayError>;
}

/// Configured gateways, resolved per aggregate by its `provider` column
#[derive(Clone, Default)]
pub struct Gateways {
    stripe: Option<Arc<StripeGateway>>,
    square: Option<Arc<SquareGateway>>,
}

impl Gateways {
    pub fn from_config(config: &Config) -> Self {
        let stripe = config
            .stripe_secret_key
            .clone()
            .map(|key| Arc::new(StripeGateway::new(key)));
        if stripe.is_none() {
            tracing::warn!("STRIPE_SECRET_KEY not set, Stripe checkout disabled");
        }

        let square = match (&config.square_access_token, &config.square_location_id) {
            (Some(token), Some(location)) => Some(Arc::new(SquareGateway::new(
                token.clone(),
                location.clone(),
            ))),
            _ => {
                tracing::warn!("Square credentials not set, Square checkout disabled");
                None
            }
        };

        Self { stripe, square }
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn PaymentGateway>> {
        match provider {
            Provider::Stripe => self
                .stripe
                .clone()
                .map(|g| g as Arc<dyn PaymentGateway>),
            Provider::Square => self
                .square
                .clone()
                .map(|g| g as Arc<dyn PaymentGateway>),
        }
    }
}
