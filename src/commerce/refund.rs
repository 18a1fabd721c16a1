//! Refund orchestration
//!
//! Full refund of an order or reservation as a step-logged saga:
//! terminal guard → gateway refund → gift-card restore → persist →
//! capacity release (reservations) → notification. The gateway refund
//! aborts the whole operation on failure (nothing mutated yet); a failed
//! gift-card restore is recorded in the step log for manual reconciliation
//! and does not roll back the gateway refund.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::commerce::gift_cards::{self, LedgerRef};
use crate::commerce::money::{to_decimal, to_f64};
use crate::db::models::{
    Order, OrderStatus, PaymentStatus, RefundDetails, Reservation, ReservationStatus,
};
use crate::db::repository::{
    order as order_repo, refund_log, reservation as reservation_repo, workshop as workshop_repo,
};
use crate::payments::PaymentGateway;
use crate::services::EmailService;
use crate::utils::{AppError, AppResult};

/// Tender label for the gift-card share in refund breakdowns
pub const GIFT_CARD_LABEL: &str = "Carte cadeau";

/// Admin action driving the orchestration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundMode {
    /// status → cancelled, payment_status → refunded
    Cancel,
    /// status → refunded
    Refund,
}

impl RefundMode {
    fn order_status(&self) -> OrderStatus {
        match self {
            RefundMode::Cancel => OrderStatus::Cancelled,
            RefundMode::Refund => OrderStatus::Refunded,
        }
    }

    fn reservation_status(&self) -> ReservationStatus {
        match self {
            RefundMode::Cancel => ReservationStatus::Cancelled,
            RefundMode::Refund => ReservationStatus::Refunded,
        }
    }
}

struct RefundPlan {
    /// Amount to send back through the payment provider
    gateway_amount: f64,
    /// Amount to restore onto the gift card
    gift_card_amount: f64,
}

/// Split the total into disjoint gateway and gift-card shares. Nothing is
/// refundable unless the payment actually settled.
fn build_plan(total: f64, gift_card_amount: f64, paid: bool, has_reference: bool) -> RefundPlan {
    if !paid {
        return RefundPlan {
            gateway_amount: 0.0,
            gift_card_amount: 0.0,
        };
    }
    let gateway = to_f64(to_decimal(total) - to_decimal(gift_card_amount));
    RefundPlan {
        gateway_amount: if has_reference { gateway.max(0.0) } else { 0.0 },
        gift_card_amount,
    }
}

struct SagaResult {
    details: RefundDetails,
}

/// Shared saga body for both aggregates. `target_kind` tags the step log.
#[allow(clippy::too_many_arguments)]
async fn run_saga(
    pool: &SqlitePool,
    gateway: Option<&dyn PaymentGateway>,
    target_kind: &str,
    target_id: &str,
    plan: &RefundPlan,
    gift_card_code: Option<&str>,
    payment_reference: Option<&str>,
    provider_label: Option<&str>,
    reason: Option<&str>,
) -> AppResult<SagaResult> {
    let mut details = RefundDetails {
        total_refunded: 0.0,
        gateway_refunded: 0.0,
        gift_card_refunded: 0.0,
        methods: Vec::new(),
    };

    // Step 1: gateway refund. Failure aborts before any local mutation.
    if plan.gateway_amount > 0.0 {
        let reference = payment_reference
            .ok_or_else(|| AppError::internal("paid aggregate without payment reference"))?;
        let gateway = match gateway {
            Some(g) => g,
            None => {
                let msg = "payment provider not configured for refund";
                refund_log::record(pool, target_kind, target_id, "gateway_refund", false, Some(msg))
                    .await?;
                return Err(AppError::upstream(msg));
            }
        };

        match gateway
            .refund_payment(reference, plan.gateway_amount, reason)
            .await
        {
            Ok(refund_id) => {
                refund_log::record(
                    pool,
                    target_kind,
                    target_id,
                    "gateway_refund",
                    true,
                    Some(&refund_id),
                )
                .await?;
                details.gateway_refunded = plan.gateway_amount;
                if let Some(label) = provider_label {
                    details.methods.push(label.to_string());
                }
            }
            Err(e) => {
                refund_log::record(
                    pool,
                    target_kind,
                    target_id,
                    "gateway_refund",
                    false,
                    Some(&e.to_string()),
                )
                .await?;
                return Err(AppError::upstream(e.to_string()));
            }
        }
    }

    // Step 2: gift-card restore. Non-fatal: the gateway refund is not rolled
    // back; a failure lands in the step log for manual reconciliation.
    if plan.gift_card_amount > 0.0
        && let Some(code) = gift_card_code
    {
        let target = if target_kind == "order" {
            LedgerRef::order(target_id)
        } else {
            LedgerRef::reservation(target_id)
        };
        let note = format!("Remboursement {target_kind} {target_id}");
        match gift_cards::restore(pool, code, plan.gift_card_amount, target, Some(&note)).await {
            Ok(_) => {
                refund_log::record(pool, target_kind, target_id, "gift_card_restore", true, None)
                    .await?;
                details.gift_card_refunded = plan.gift_card_amount;
                details.methods.push(GIFT_CARD_LABEL.to_string());
            }
            Err(e) => {
                tracing::warn!(
                    target_kind = %target_kind,
                    target_id = %target_id,
                    code = %code,
                    error = %e,
                    "Gift card restore failed after gateway refund; flagged for manual reconciliation"
                );
                refund_log::record(
                    pool,
                    target_kind,
                    target_id,
                    "gift_card_restore",
                    false,
                    Some(&e.to_string()),
                )
                .await?;
            }
        }
    }

    details.total_refunded =
        to_f64(to_decimal(details.gateway_refunded) + to_decimal(details.gift_card_refunded));
    Ok(SagaResult { details })
}

/// Full refund of an order (admin cancel or refund action).
pub async fn refund_order(
    pool: &SqlitePool,
    gateway: Option<&dyn PaymentGateway>,
    mailer: &EmailService,
    order_id: &str,
    reason: Option<&str>,
    mode: RefundMode,
) -> AppResult<Order> {
    let order = order_repo::find_by_id(pool, order_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

    // Terminal-state guard: reject before any mutation
    if order.status.is_terminal() {
        return Err(AppError::state_conflict(format!(
            "Order {order_id} is already {}",
            order.status.as_str()
        )));
    }

    let paid = order.payment_status == PaymentStatus::Paid;
    let plan = build_plan(
        order.total_amount,
        order.gift_card_amount,
        paid,
        order.payment_reference.is_some(),
    );

    let result = run_saga(
        pool,
        gateway,
        "order",
        order_id,
        &plan,
        order.gift_card_code.as_deref(),
        order.payment_reference.as_deref(),
        order.provider.map(|p| p.label()),
        reason,
    )
    .await?;

    // Persist the terminal state
    if paid {
        let details_json = serde_json::to_string(&result.details)
            .map_err(|e| AppError::internal(e.to_string()))?;
        order_repo::apply_refund(
            pool,
            order_id,
            mode.order_status(),
            result.details.total_refunded,
            reason,
            &details_json,
        )
        .await?;
    } else {
        // Nothing was charged: just close the order
        order_repo::update_status(pool, order_id, mode.order_status()).await?;
    }
    refund_log::record(pool, "order", order_id, "persist", true, None).await?;

    let order = order_repo::find_by_id(pool, order_id)
        .await?
        .ok_or_else(|| AppError::internal("order vanished during refund"))?;

    if let Some(email) = order.contact_email() {
        mailer
            .send_cancellation(email, order_id, result.details.total_refunded)
            .await;
    }

    tracing::info!(
        order_id = %order_id,
        mode = ?mode,
        total_refunded = result.details.total_refunded,
        "Order refund orchestration complete"
    );
    Ok(order)
}

/// Full refund of a reservation, including the capacity release.
pub async fn refund_reservation(
    pool: &SqlitePool,
    gateway: Option<&dyn PaymentGateway>,
    mailer: &EmailService,
    reservation_id: &str,
    reason: Option<&str>,
    mode: RefundMode,
) -> AppResult<Reservation> {
    let reservation = reservation_repo::find_by_id(pool, reservation_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Reservation {reservation_id} not found")))?;

    if reservation.status.is_terminal() {
        return Err(AppError::state_conflict(format!(
            "Reservation {reservation_id} is already {}",
            reservation.status.as_str()
        )));
    }

    // Only pending/confirmed reservations hold seats; a waitlist entry must
    // never decrement booked_count on cancellation.
    let held_seats = reservation.status.holds_seats();

    let paid = reservation.payment_status == PaymentStatus::Paid;
    let plan = build_plan(
        reservation.amount_paid,
        reservation.gift_card_amount,
        paid,
        reservation.payment_reference.is_some(),
    );

    let result = run_saga(
        pool,
        gateway,
        "reservation",
        reservation_id,
        &plan,
        reservation.gift_card_code.as_deref(),
        reservation.payment_reference.as_deref(),
        reservation.provider.map(|p| p.label()),
        reason,
    )
    .await?;

    if paid {
        let details_json = serde_json::to_string(&result.details)
            .map_err(|e| AppError::internal(e.to_string()))?;
        reservation_repo::apply_refund(
            pool,
            reservation_id,
            mode.reservation_status(),
            result.details.total_refunded,
            reason,
            &details_json,
        )
        .await?;
    } else {
        reservation_repo::update_status(pool, reservation_id, mode.reservation_status()).await?;
    }
    refund_log::record(pool, "reservation", reservation_id, "persist", true, None).await?;

    // Capacity release, exactly once, on the transition out of a
    // seat-holding status
    if held_seats {
        match workshop_repo::release_seats(pool, &reservation.session_id, reservation.quantity)
            .await
        {
            Ok(()) => {
                refund_log::record(pool, "reservation", reservation_id, "capacity_release", true, None)
                    .await?;
            }
            Err(e) => {
                tracing::warn!(
                    reservation_id = %reservation_id,
                    error = %e,
                    "Capacity release failed; flagged for manual reconciliation"
                );
                refund_log::record(
                    pool,
                    "reservation",
                    reservation_id,
                    "capacity_release",
                    false,
                    Some(&e.to_string()),
                )
                .await?;
            }
        }
    }

    let reservation = reservation_repo::find_by_id(pool, reservation_id)
        .await?
        .ok_or_else(|| AppError::internal("reservation vanished during refund"))?;

    if let Some(email) = reservation.contact_email() {
        mailer
            .send_cancellation(email, reservation_id, result.details.total_refunded)
            .await;
    }

    tracing::info!(
        reservation_id = %reservation_id,
        mode = ?mode,
        total_refunded = result.details.total_refunded,
        "Reservation refund orchestration complete"
    );
    Ok(reservation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Provider;
    use crate::db::repository::gift_card as gift_card_repo;
    use crate::db::repository::order::NewOrderItem;
    use crate::db::testing::{memory_pool, seed_gift_card, seed_session, seed_workshop};
    use crate::payments::testing::{GatewayCall, MockGateway};
    use crate::utils::now_millis;

    /// Confirmed, paid 40€ order: 15€ gift card + 25€ Square charge
    async fn paid_order_with_gift_card(pool: &sqlx::SqlitePool) -> Order {
        // The card was fully consumed at payment time (15€ used)
        seed_gift_card(pool, "CADEAU15", 15.0, 0.0).await;
        sqlx::query("UPDATE gift_card SET status = 'used', used = 1 WHERE code = 'CADEAU15'")
            .execute(pool)
            .await
            .unwrap();

        let now = now_millis();
        let order = Order {
            id: "o1".to_string(),
            user_id: None,
            guest_email: Some("claire@example.fr".to_string()),
            guest_name: None,
            guest_phone: None,
            shipping_address: None,
            total_amount: 40.0,
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            payment_method: Some("card".to_string()),
            provider: Some(Provider::Square),
            payment_reference: Some("pay_123".to_string()),
            gift_card_code: Some("CADEAU15".to_string()),
            gift_card_amount: 15.0,
            refund_amount: None,
            refund_reason: None,
            refunded_at: None,
            refund_details: None,
            created_at: now,
            updated_at: now,
        };
        let items = vec![NewOrderItem {
            product_id: "p1".to_string(),
            name: "Vase".to_string(),
            unit_price: 40.0,
            quantity: 1,
        }];
        order_repo::insert(pool, &order, &items).await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_cancel_paid_order_refunds_both_tenders() {
        let pool = memory_pool().await;
        paid_order_with_gift_card(&pool).await;
        let gateway = MockGateway::new(Provider::Square);

        let order = refund_order(
            &pool,
            Some(&gateway),
            &EmailService::disabled(),
            "o1",
            Some("customer request"),
            RefundMode::Cancel,
        )
        .await
        .unwrap();

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert_eq!(order.refund_amount, Some(40.0));

        // Gateway got exactly the non-gift-card share
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::Refund { reference: "pay_123".into(), amount: 25.0 }]
        );

        // Gift card restored and reactivated
        let card = gift_card_repo::find_by_code(&pool, "CADEAU15")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.balance, 15.0);
        assert!(!card.used);

        // Structured breakdown
        let details: RefundDetails =
            serde_json::from_str(order.refund_details.as_deref().unwrap()).unwrap();
        assert_eq!(details.total_refunded, 40.0);
        assert_eq!(details.gateway_refunded, 25.0);
        assert_eq!(details.gift_card_refunded, 15.0);
        assert_eq!(details.methods, vec!["Square", GIFT_CARD_LABEL]);

        // Step log recorded the saga
        let steps = refund_log::list_for_target(&pool, "order", "o1").await.unwrap();
        let names: Vec<&str> = steps.iter().map(|s| s.step.as_str()).collect();
        assert_eq!(names, vec!["gateway_refund", "gift_card_restore", "persist"]);
        assert!(steps.iter().all(|s| s.status == "succeeded"));
    }

    #[tokio::test]
    async fn test_refund_of_terminal_order_rejected_without_mutation() {
        let pool = memory_pool().await;
        paid_order_with_gift_card(&pool).await;
        let gateway = MockGateway::new(Provider::Square);

        refund_order(
            &pool,
            Some(&gateway),
            &EmailService::disabled(),
            "o1",
            None,
            RefundMode::Refund,
        )
        .await
        .unwrap();

        // Second attempt on the now-refunded order
        let err = refund_order(
            &pool,
            Some(&gateway),
            &EmailService::disabled(),
            "o1",
            None,
            RefundMode::Refund,
        )
        .await;
        assert!(matches!(err, Err(AppError::StateConflict(_))));

        // Exactly one gateway refund went out
        assert_eq!(gateway.calls().len(), 1);
        let order = order_repo::find_by_id(&pool, "o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
    }

    #[tokio::test]
    async fn test_gateway_failure_aborts_before_mutation() {
        let pool = memory_pool().await;
        paid_order_with_gift_card(&pool).await;
        let gateway = MockGateway::failing_refund(Provider::Square);

        let err = refund_order(
            &pool,
            Some(&gateway),
            &EmailService::disabled(),
            "o1",
            None,
            RefundMode::Refund,
        )
        .await;
        assert!(matches!(err, Err(AppError::Upstream(_))));

        // Order untouched, gift card untouched
        let order = order_repo::find_by_id(&pool, "o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        let card = gift_card_repo::find_by_code(&pool, "CADEAU15")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.balance, 0.0);

        // Failed step recorded
        let steps = refund_log::list_for_target(&pool, "order", "o1").await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step, "gateway_refund");
        assert_eq!(steps[0].status, "failed");
    }

    #[tokio::test]
    async fn test_gift_restore_failure_is_swallowed_but_logged() {
        let pool = memory_pool().await;
        paid_order_with_gift_card(&pool).await;
        // Point the order at a card that does not exist
        sqlx::query("UPDATE orders SET gift_card_code = 'GHOST234' WHERE id = 'o1'")
            .execute(&pool)
            .await
            .unwrap();
        let gateway = MockGateway::new(Provider::Square);

        let refunded = refund_order(
            &pool,
            Some(&gateway),
            &EmailService::disabled(),
            "o1",
            None,
            RefundMode::Refund,
        )
        .await
        .unwrap();

        // Gateway refund stands, order reaches its terminal state anyway
        assert_eq!(refunded.status, OrderStatus::Refunded);
        let details: RefundDetails =
            serde_json::from_str(refunded.refund_details.as_deref().unwrap()).unwrap();
        assert_eq!(details.gateway_refunded, 25.0);
        assert_eq!(details.gift_card_refunded, 0.0);
        assert_eq!(details.total_refunded, 25.0);
        assert_eq!(details.methods, vec!["Square"]);

        // The failed restore is queued for manual reconciliation
        let failed = refund_log::list_failed(&pool, 10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].step, "gift_card_restore");
    }

    #[tokio::test]
    async fn test_cancel_unpaid_order_moves_no_money() {
        let pool = memory_pool().await;
        let mut order = paid_order_with_gift_card(&pool).await;
        order.id = "o2".to_string();
        order.payment_status = PaymentStatus::Pending;
        order.status = OrderStatus::Pending;
        order.payment_reference = Some("pay_999".to_string());
        order_repo::insert(&pool, &order, &[]).await.unwrap();
        let gateway = MockGateway::new(Provider::Square);

        let cancelled = refund_order(
            &pool,
            Some(&gateway),
            &EmailService::disabled(),
            "o2",
            None,
            RefundMode::Cancel,
        )
        .await
        .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        // Unpaid: payment_status untouched, no gateway call, card untouched
        assert_eq!(cancelled.payment_status, PaymentStatus::Pending);
        assert!(gateway.calls().is_empty());
    }

    async fn seated_reservation(
        pool: &sqlx::SqlitePool,
        id: &str,
        status: ReservationStatus,
        payment_status: PaymentStatus,
    ) -> Reservation {
        let now = now_millis();
        let reservation = Reservation {
            id: id.to_string(),
            workshop_id: "w1".to_string(),
            session_id: "s1".to_string(),
            user_id: None,
            guest_email: Some("marc@example.fr".to_string()),
            guest_name: None,
            guest_phone: None,
            quantity: 2,
            status,
            payment_status,
            waitlist_position: if status == ReservationStatus::Waitlist {
                Some(1)
            } else {
                None
            },
            amount_paid: 90.0,
            payment_method: Some("card".to_string()),
            provider: Some(Provider::Stripe),
            payment_reference: Some(format!("pi-{id}")),
            gift_card_code: None,
            gift_card_amount: 0.0,
            refund_amount: None,
            refund_reason: None,
            refunded_at: None,
            refund_details: None,
            created_at: now,
            updated_at: now,
        };
        reservation_repo::insert(pool, &reservation).await.unwrap();
        reservation
    }

    #[tokio::test]
    async fn test_cancel_confirmed_reservation_releases_seats() {
        let pool = memory_pool().await;
        seed_workshop(&pool, "w1", "Tournage", 45.0).await;
        seed_session(&pool, "s1", "w1", 5).await;
        workshop_repo::try_reserve_seats(&pool, "s1", 2).await.unwrap();
        seated_reservation(&pool, "r1", ReservationStatus::Confirmed, PaymentStatus::Paid).await;
        let gateway = MockGateway::new(Provider::Stripe);

        let cancelled = refund_reservation(
            &pool,
            Some(&gateway),
            &EmailService::disabled(),
            "r1",
            Some("météo"),
            RefundMode::Cancel,
        )
        .await
        .unwrap();

        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::Refund { reference: "pi-r1".into(), amount: 90.0 }]
        );

        let session = workshop_repo::find_session(&pool, "s1").await.unwrap().unwrap();
        assert_eq!(session.booked_count, 0);
    }

    #[tokio::test]
    async fn test_cancel_waitlist_reservation_keeps_booked_count() {
        let pool = memory_pool().await;
        seed_workshop(&pool, "w1", "Tournage", 45.0).await;
        seed_session(&pool, "s1", "w1", 2).await;
        workshop_repo::try_reserve_seats(&pool, "s1", 2).await.unwrap();
        seated_reservation(&pool, "r1", ReservationStatus::Waitlist, PaymentStatus::Unpaid).await;

        let cancelled = refund_reservation(
            &pool,
            None,
            &EmailService::disabled(),
            "r1",
            None,
            RefundMode::Cancel,
        )
        .await
        .unwrap();

        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        // A waitlist reservation never held a seat: no decrement
        let session = workshop_repo::find_session(&pool, "s1").await.unwrap().unwrap();
        assert_eq!(session.booked_count, 2);
    }

    #[tokio::test]
    async fn test_cancel_pending_unpaid_reservation_releases_seats_without_refund() {
        let pool = memory_pool().await;
        seed_workshop(&pool, "w1", "Tournage", 45.0).await;
        seed_session(&pool, "s1", "w1", 5).await;
        workshop_repo::try_reserve_seats(&pool, "s1", 2).await.unwrap();
        seated_reservation(&pool, "r1", ReservationStatus::Pending, PaymentStatus::Pending).await;
        let gateway = MockGateway::new(Provider::Stripe);

        let cancelled = refund_reservation(
            &pool,
            Some(&gateway),
            &EmailService::disabled(),
            "r1",
            None,
            RefundMode::Cancel,
        )
        .await
        .unwrap();

        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert!(gateway.calls().is_empty());
        let session = workshop_repo::find_session(&pool, "s1").await.unwrap().unwrap();
        assert_eq!(session.booked_count, 0);
    }
}
