//! Order model
//!
//! Orders are never physically deleted in the normal flow; `cancelled` and
//! `refunded` are terminal statuses.

use serde::{Deserialize, Serialize};

/// Payment provider that took (or will take) the charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Provider {
    Stripe,
    Square,
}

impl Provider {
    /// Display label used in refund breakdowns and emails
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Stripe => "Stripe",
            Provider::Square => "Square",
        }
    }
}

/// Order status state machine
///
/// ```text
/// pending ─┬─> confirmed ──> preparing ──> shipped ──> delivered
///          │                     │
///          ├─> cancelled <───────┘
///          └─> refunded  <───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Terminal statuses accept no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Whether the state machine permits `self -> next`
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Pending, Confirmed) => true,
            (Confirmed, Preparing) | (Confirmed, Shipped) | (Confirmed, Delivered) => true,
            (Preparing, Shipped) | (Preparing, Delivered) => true,
            (Shipped, Delivered) => true,
            // Cancellation/refund allowed from any non-terminal status
            (_, Cancelled) | (_, Refunded) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub user_id: Option<String>,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub provider: Option<Provider>,
    pub payment_reference: Option<String>,
    pub gift_card_code: Option<String>,
    pub gift_card_amount: f64,
    pub refund_amount: Option<f64>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<i64>,
    /// JSON-serialized [`RefundDetails`] (TEXT column)
    pub refund_details: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Email address for notifications (guest contact for guest checkout)
    pub fn contact_email(&self) -> Option<&str> {
        self.guest_email.as_deref()
    }

    /// Amount charged through the payment gateway (total minus gift card)
    pub fn gateway_amount(&self) -> f64 {
        crate::commerce::money::to_f64(
            crate::commerce::money::to_decimal(self.total_amount)
                - crate::commerce::money::to_decimal(self.gift_card_amount),
        )
    }
}

/// Order line item
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: String,
    pub product_id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: i32,
}

/// Structured refund breakdown persisted on refund/cancel (audit/display)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundDetails {
    pub total_refunded: f64,
    pub gateway_refunded: f64,
    pub gift_card_refunded: f64,
    /// Tender labels, e.g. ["Square", "Carte cadeau"]
    pub methods: Vec<String>,
}
