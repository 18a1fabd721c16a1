//! Webhook reconciliation
//!
//! One function converges local state with both providers' asynchronous
//! notifications. The aggregate is found by its stored payment reference
//! (order first, then reservation); unmatched events are acknowledged and
//! ignored. The paid/confirmed transition is a guarded single-statement
//! update, so duplicate deliveries cannot redeem a gift card twice.

use sqlx::SqlitePool;

use crate::commerce::gift_cards::{self, LedgerRef};
use crate::db::repository::{order as order_repo, reservation as reservation_repo};
use crate::payments::{PaymentEvent, PaymentEventKind};
use crate::services::EmailService;
use crate::utils::{AppResult, AppError};

/// What the reconciler did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    OrderConfirmed(String),
    ReservationConfirmed(String),
    OrderPaymentFailed(String),
    ReservationPaymentFailed(String),
    /// Duplicate delivery or terminal aggregate: nothing changed
    AlreadyProcessed(String),
    /// No aggregate carries this reference: acknowledged, ignored
    Unmatched,
}

pub async fn reconcile(
    pool: &SqlitePool,
    mailer: &EmailService,
    event: &PaymentEvent,
) -> AppResult<ReconcileOutcome> {
    if let Some(order) = order_repo::find_by_payment_reference(pool, &event.reference).await? {
        return reconcile_order(pool, mailer, event, order.id).await;
    }
    if let Some(reservation) =
        reservation_repo::find_by_payment_reference(pool, &event.reference).await?
    {
        return reconcile_reservation(pool, mailer, event, reservation.id).await;
    }

    // Tolerated: events for unrelated payments are acknowledged so the
    // provider stops retrying.
    tracing::info!(
        provider = ?event.provider,
        reference = %event.reference,
        "Webhook event matches no order or reservation, ignoring"
    );
    Ok(ReconcileOutcome::Unmatched)
}

async fn reconcile_order(
    pool: &SqlitePool,
    mailer: &EmailService,
    event: &PaymentEvent,
    order_id: String,
) -> AppResult<ReconcileOutcome> {
    match event.kind {
        PaymentEventKind::Succeeded => {
            // Guarded transition: only the first delivery wins
            if !order_repo::mark_paid(pool, &order_id).await? {
                tracing::debug!(order_id = %order_id, "Order already reconciled, skipping");
                return Ok(ReconcileOutcome::AlreadyProcessed(order_id));
            }

            if let Some(payment_id) = &event.payment_id
                && payment_id != &event.reference
            {
                order_repo::set_payment_reference(pool, &order_id, payment_id).await?;
            }

            let order = order_repo::find_by_id(pool, &order_id)
                .await?
                .ok_or_else(|| AppError::internal("order vanished during reconciliation"))?;

            // Deferred redemption: the card was applied at checkout, debited
            // only now that the payment is confirmed. The guard above makes
            // this exactly-once.
            if order.gift_card_amount > 0.0
                && let Some(code) = &order.gift_card_code
                && let Err(e) = gift_cards::redeem(
                    pool,
                    code,
                    order.gift_card_amount,
                    LedgerRef::order(&order_id),
                )
                .await
            {
                tracing::error!(
                    order_id = %order_id,
                    code = %code,
                    error = %e,
                    "Deferred gift card redemption failed after payment"
                );
            }

            if let Some(email) = order.contact_email() {
                mailer
                    .send_payment_confirmed(email, &order_id, order.gateway_amount())
                    .await;
            }

            tracing::info!(order_id = %order_id, provider = ?event.provider, "Order payment confirmed");
            Ok(ReconcileOutcome::OrderConfirmed(order_id))
        }
        PaymentEventKind::Failed | PaymentEventKind::Cancelled => {
            if order_repo::mark_payment_failed(pool, &order_id).await? {
                tracing::warn!(order_id = %order_id, kind = ?event.kind, "Order payment failed");
                Ok(ReconcileOutcome::OrderPaymentFailed(order_id))
            } else {
                Ok(ReconcileOutcome::AlreadyProcessed(order_id))
            }
        }
    }
}

async fn reconcile_reservation(
    pool: &SqlitePool,
    mailer: &EmailService,
    event: &PaymentEvent,
    reservation_id: String,
) -> AppResult<ReconcileOutcome> {
    match event.kind {
        PaymentEventKind::Succeeded => {
            if !reservation_repo::mark_paid(pool, &reservation_id).await? {
                tracing::debug!(reservation_id = %reservation_id, "Reservation already reconciled, skipping");
                return Ok(ReconcileOutcome::AlreadyProcessed(reservation_id));
            }

            if let Some(payment_id) = &event.payment_id
                && payment_id != &event.reference
            {
                reservation_repo::set_payment_reference(pool, &reservation_id, payment_id).await?;
            }

            let reservation = reservation_repo::find_by_id(pool, &reservation_id)
                .await?
                .ok_or_else(|| AppError::internal("reservation vanished during reconciliation"))?;

            if reservation.gift_card_amount > 0.0
                && let Some(code) = &reservation.gift_card_code
                && let Err(e) = gift_cards::redeem(
                    pool,
                    code,
                    reservation.gift_card_amount,
                    LedgerRef::reservation(&reservation_id),
                )
                .await
            {
                tracing::error!(
                    reservation_id = %reservation_id,
                    code = %code,
                    error = %e,
                    "Deferred gift card redemption failed after payment"
                );
            }

            if let Some(email) = reservation.contact_email() {
                mailer
                    .send_payment_confirmed(email, &reservation_id, reservation.gateway_amount())
                    .await;
            }

            tracing::info!(reservation_id = %reservation_id, provider = ?event.provider, "Reservation payment confirmed");
            Ok(ReconcileOutcome::ReservationConfirmed(reservation_id))
        }
        PaymentEventKind::Failed | PaymentEventKind::Cancelled => {
            if reservation_repo::mark_payment_failed(pool, &reservation_id).await? {
                // The provisional seat hold is NOT released here: left for
                // admin handling.
                tracing::warn!(
                    reservation_id = %reservation_id,
                    kind = ?event.kind,
                    "Reservation payment failed; provisional seat hold kept for admin review"
                );
                Ok(ReconcileOutcome::ReservationPaymentFailed(reservation_id))
            } else {
                Ok(ReconcileOutcome::AlreadyProcessed(reservation_id))
            }
        }
    }
}
