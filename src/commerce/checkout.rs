//! Order creation
//!
//! Validates the cart, prices it server-side, applies an optional gift card
//! and either confirms immediately (fully covered) or persists a pending
//! order and hands off to the payment provider. A failed provider call rolls
//! the persisted order back (best-effort).

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::commerce::gift_cards::{self, LedgerRef};
use crate::commerce::money::{self, to_decimal, to_f64};
use crate::db::models::{Order, OrderItem, OrderStatus, PaymentStatus, Provider};
use crate::db::repository::order::{self as order_repo, NewOrderItem};
use crate::db::repository::{client as client_repo, product as product_repo};
use crate::payments::{CheckoutRequest, PaymentGateway};
use crate::services::EmailService;
use crate::utils::{AppError, AppResult, now_millis};

#[derive(Debug, Clone, Deserialize)]
pub struct CartItemInput {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub user_id: Option<String>,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub items: Vec<CartItemInput>,
    /// Required whenever an amount remains to pay after the gift card
    pub provider: Option<Provider>,
    pub gift_card_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Provider redirect URL (None when the order confirmed immediately)
    pub checkout_url: Option<String>,
    /// Gateway share still to pay
    pub amount_due: f64,
}

fn validate_input(input: &CheckoutInput) -> AppResult<()> {
    if input.items.is_empty() {
        return Err(AppError::validation("Cart is empty"));
    }
    for item in &input.items {
        money::validate_quantity(item.quantity, "quantity")?;
    }
    match (&input.user_id, &input.guest_email) {
        (None, None) => Err(AppError::validation(
            "Either a user or guest contact details are required",
        )),
        (_, Some(email)) if !email.validate_email() => {
            Err(AppError::validation("Invalid guest email"))
        }
        _ => Ok(()),
    }
}

/// Split a free-form guest name into first/last for the client record
fn split_name(name: Option<&str>) -> (Option<&str>, Option<&str>) {
    match name {
        Some(full) => match full.trim().split_once(' ') {
            Some((first, last)) => (Some(first), Some(last)),
            None => (Some(full.trim()), None),
        },
        None => (None, None),
    }
}

/// Best-effort client record sync; never fails the order.
async fn sync_client(pool: &SqlitePool, input: &CheckoutInput) {
    let Some(email) = &input.guest_email else {
        return;
    };
    let (first, last) = split_name(input.guest_name.as_deref());
    if let Err(e) =
        client_repo::sync_on_order(pool, email, first, last, input.guest_phone.as_deref()).await
    {
        tracing::warn!(email = %email, error = %e, "Client sync failed (ignored)");
    }
}

pub async fn create_order(
    pool: &SqlitePool,
    gateway: Option<&dyn PaymentGateway>,
    mailer: &EmailService,
    frontend_url: &str,
    input: CheckoutInput,
) -> AppResult<CheckoutOutcome> {
    // 1. Validate cart and contact
    validate_input(&input)?;

    // 2. Price the cart server-side
    let mut items = Vec::with_capacity(input.items.len());
    let mut total = rust_decimal::Decimal::ZERO;
    for line in &input.items {
        let product = product_repo::find_by_id(pool, &line.product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                AppError::not_found(format!("Product {} not found", line.product_id))
            })?;
        total += to_decimal(product.price) * rust_decimal::Decimal::from(line.quantity);
        items.push(NewOrderItem {
            product_id: product.id,
            name: product.name,
            unit_price: product.price,
            quantity: line.quantity,
        });
    }
    let total = to_f64(total);

    // 3. Optional gift card (read-only application at this point)
    let application = match &input.gift_card_code {
        Some(code) => Some(gift_cards::apply(pool, code, total).await?),
        None => None,
    };
    let gift_card_amount = application.as_ref().map(|a| a.amount_applied).unwrap_or(0.0);
    let remaining = application
        .as_ref()
        .map(|a| a.remaining_to_pay)
        .unwrap_or(total);

    let fully_covered = remaining <= 0.0;
    let order_id = Uuid::new_v4().to_string();
    let now = now_millis();

    let mut order = Order {
        id: order_id.clone(),
        user_id: input.user_id.clone(),
        guest_email: input.guest_email.clone(),
        guest_name: input.guest_name.clone(),
        guest_phone: input.guest_phone.clone(),
        shipping_address: input.shipping_address.clone(),
        total_amount: total,
        status: if fully_covered {
            OrderStatus::Confirmed
        } else {
            OrderStatus::Pending
        },
        payment_status: if fully_covered {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        },
        payment_method: if fully_covered {
            // Zero-priced carts confirm without any tender
            (gift_card_amount > 0.0).then(|| "gift_card".to_string())
        } else {
            Some("card".to_string())
        },
        provider: if fully_covered { None } else { input.provider },
        payment_reference: None,
        gift_card_code: application.as_ref().map(|a| a.code.clone()),
        gift_card_amount,
        refund_amount: None,
        refund_reason: None,
        refunded_at: None,
        refund_details: None,
        created_at: now,
        updated_at: now,
    };

    if fully_covered {
        // 4a. Fully covered (gift card, or zero-priced cart): confirm now
        order_repo::insert(pool, &order, &items).await?;

        if gift_card_amount > 0.0
            && let Some(code) = &order.gift_card_code
            && let Err(e) =
                gift_cards::redeem(pool, code, gift_card_amount, LedgerRef::order(&order_id)).await
        {
            // Synchronous redemption lost (e.g. concurrent use): roll back
            tracing::warn!(order_id = %order_id, error = %e, "Gift card redemption failed, rolling back order");
            if let Err(del) = order_repo::delete(pool, &order_id).await {
                tracing::error!(order_id = %order_id, error = %del, "Rollback delete failed");
            }
            return Err(e);
        }
    } else {
        // 4b. Amount remains: persist pending, then create the provider checkout
        let gateway = gateway.ok_or_else(|| {
            AppError::validation("No payment provider selected or configured")
        })?;
        order.provider = Some(gateway.provider());
        order_repo::insert(pool, &order, &items).await?;

        let request = CheckoutRequest {
            reference_id: order_id.clone(),
            description: format!("Commande Atelier {order_id}"),
            amount: remaining,
            customer_email: input.guest_email.clone(),
            success_url: format!("{frontend_url}/commande/confirmation?order={order_id}"),
            cancel_url: format!("{frontend_url}/commande/annulee?order={order_id}"),
        };

        match gateway.create_checkout(&request).await {
            Ok(session) => {
                order_repo::set_payment_reference(pool, &order_id, &session.reference).await?;
                order.payment_reference = Some(session.reference);

                sync_client(pool, &input).await;
                mailer.send_order_confirmation(&order).await;

                let items = order_repo::find_items(pool, &order_id).await?;
                return Ok(CheckoutOutcome {
                    order,
                    items,
                    checkout_url: session.checkout_url,
                    amount_due: remaining,
                });
            }
            Err(e) => {
                // Roll back: delete the order. Best-effort — a failure here is
                // logged, not retried.
                tracing::warn!(order_id = %order_id, error = %e, "Checkout creation failed, rolling back order");
                if let Err(del) = order_repo::delete(pool, &order_id).await {
                    tracing::error!(order_id = %order_id, error = %del, "Rollback delete failed");
                }
                return Err(AppError::upstream(e.to_string()));
            }
        }
    }

    // 5. Best-effort side effects for the immediate-confirmation path
    sync_client(pool, &input).await;
    mailer.send_order_confirmation(&order).await;

    let items = order_repo::find_items(pool, &order_id).await?;
    Ok(CheckoutOutcome {
        order,
        items,
        checkout_url: None,
        amount_due: 0.0,
    })
}
