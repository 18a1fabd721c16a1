//! Workshop reservation creation
//!
//! Seats are held atomically ahead of payment (provisional hold). When the
//! hold fails the request is redirected into the waitlist — never rejected.
//! A failed provider checkout rolls back the record and releases the held
//! seats (best-effort).

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::commerce::gift_cards::{self, LedgerRef};
use crate::commerce::money::{self, to_decimal, to_f64};
use crate::db::models::{
    PaymentStatus, Provider, Reservation, ReservationStatus, SessionStatus,
};
use crate::db::repository::{
    client as client_repo, reservation as reservation_repo, workshop as workshop_repo,
};
use crate::payments::{CheckoutRequest, PaymentGateway};
use crate::services::EmailService;
use crate::utils::{AppError, AppResult, now_millis};

#[derive(Debug, Clone, Deserialize)]
pub struct BookingInput {
    pub session_id: String,
    pub quantity: i32,
    pub user_id: Option<String>,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub provider: Option<Provider>,
    pub gift_card_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingOutcome {
    pub reservation: Reservation,
    pub checkout_url: Option<String>,
    pub amount_due: f64,
    /// True when the request was redirected into the waitlist
    pub waitlisted: bool,
}

fn validate_input(input: &BookingInput) -> AppResult<()> {
    money::validate_quantity(input.quantity, "quantity")?;
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

async fn sync_client(pool: &SqlitePool, input: &BookingInput) {
    let Some(email) = &input.guest_email else {
        return;
    };
    let (first, last) = match input.guest_name.as_deref() {
        Some(full) => match full.trim().split_once(' ') {
            Some((f, l)) => (Some(f), Some(l)),
            None => (Some(full.trim()), None),
        },
        None => (None, None),
    };
    if let Err(e) =
        client_repo::sync_on_order(pool, email, first, last, input.guest_phone.as_deref()).await
    {
        tracing::warn!(email = %email, error = %e, "Client sync failed (ignored)");
    }
}

fn base_reservation(input: &BookingInput, workshop_id: &str, amount: f64) -> Reservation {
    let now = now_millis();
    Reservation {
        id: Uuid::new_v4().to_string(),
        workshop_id: workshop_id.to_string(),
        session_id: input.session_id.clone(),
        user_id: input.user_id.clone(),
        guest_email: input.guest_email.clone(),
        guest_name: input.guest_name.clone(),
        guest_phone: input.guest_phone.clone(),
        quantity: input.quantity,
        status: ReservationStatus::Pending,
        payment_status: PaymentStatus::Pending,
        waitlist_position: None,
        amount_paid: amount,
        payment_method: Some("card".to_string()),
        provider: input.provider,
        payment_reference: None,
        gift_card_code: None,
        gift_card_amount: 0.0,
        refund_amount: None,
        refund_reason: None,
        refunded_at: None,
        refund_details: None,
        created_at: now,
        updated_at: now,
    }
}

pub async fn create_reservation(
    pool: &SqlitePool,
    gateway: Option<&dyn PaymentGateway>,
    mailer: &EmailService,
    frontend_url: &str,
    input: BookingInput,
) -> AppResult<BookingOutcome> {
    // 1. Validate input and load session/workshop
    validate_input(&input)?;

    let session = workshop_repo::find_session(pool, &input.session_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Session {} not found", input.session_id)))?;
    if session.status != SessionStatus::Scheduled {
        return Err(AppError::state_conflict("Session is not open for booking"));
    }

    let workshop = workshop_repo::find_workshop(pool, &session.workshop_id)
        .await?
        .ok_or_else(|| AppError::not_found("Workshop not found"))?;

    let total = to_f64(to_decimal(workshop.price) * rust_decimal::Decimal::from(input.quantity));

    // 2. Provisional seat hold — atomic; on refusal the request is silently
    //    redirected into the waitlist with a computed position.
    let held = workshop_repo::try_reserve_seats(pool, &session.id, input.quantity).await?;
    if !held {
        let position = reservation_repo::count_waitlisted(pool, &session.id).await? as i32 + 1;
        let mut reservation = base_reservation(&input, &session.workshop_id, 0.0);
        reservation.status = ReservationStatus::Waitlist;
        reservation.payment_status = PaymentStatus::Unpaid;
        reservation.waitlist_position = Some(position);
        reservation.payment_method = None;
        reservation.provider = None;
        reservation_repo::insert(pool, &reservation).await?;

        tracing::info!(
            reservation_id = %reservation.id,
            session_id = %session.id,
            position,
            "Session full, reservation waitlisted"
        );

        sync_client(pool, &input).await;
        return Ok(BookingOutcome {
            reservation,
            checkout_url: None,
            amount_due: 0.0,
            waitlisted: true,
        });
    }

    // 3. Optional gift card (read-only application)
    let application = match &input.gift_card_code {
        Some(code) => Some(gift_cards::apply(pool, code, total).await?),
        None => None,
    };
    let gift_card_amount = application.as_ref().map(|a| a.amount_applied).unwrap_or(0.0);
    let remaining = application
        .as_ref()
        .map(|a| a.remaining_to_pay)
        .unwrap_or(total);

    let mut reservation = base_reservation(&input, &session.workshop_id, total);
    reservation.gift_card_code = application.as_ref().map(|a| a.code.clone());
    reservation.gift_card_amount = gift_card_amount;

    if remaining <= 0.0 {
        // 4a. Free session or fully covered by gift card: confirm immediately
        reservation.status = ReservationStatus::Confirmed;
        reservation.payment_status = PaymentStatus::Paid;
        reservation.provider = None;
        reservation.payment_method = if gift_card_amount > 0.0 {
            Some("gift_card".to_string())
        } else {
            None
        };
        reservation_repo::insert(pool, &reservation).await?;

        if gift_card_amount > 0.0
            && let Some(code) = &reservation.gift_card_code
            && let Err(e) = gift_cards::redeem(
                pool,
                code,
                gift_card_amount,
                LedgerRef::reservation(&reservation.id),
            )
            .await
        {
            tracing::warn!(reservation_id = %reservation.id, error = %e, "Gift card redemption failed, rolling back reservation");
            rollback(pool, &reservation.id, &session.id, input.quantity).await;
            return Err(e);
        }

        sync_client(pool, &input).await;
        mailer
            .send_reservation_confirmation(&reservation, session.starts_at)
            .await;

        return Ok(BookingOutcome {
            reservation,
            checkout_url: None,
            amount_due: 0.0,
            waitlisted: false,
        });
    }

    // 4b. Persist pending, then create the provider checkout
    let gateway = gateway
        .ok_or_else(|| AppError::validation("No payment provider selected or configured"))?;
    reservation.provider = Some(gateway.provider());
    reservation_repo::insert(pool, &reservation).await?;

    let request = CheckoutRequest {
        reference_id: reservation.id.clone(),
        description: format!("{} — {} place(s)", workshop.name, input.quantity),
        amount: remaining,
        customer_email: input.guest_email.clone(),
        success_url: format!(
            "{frontend_url}/ateliers/confirmation?reservation={}",
            reservation.id
        ),
        cancel_url: format!(
            "{frontend_url}/ateliers/annulee?reservation={}",
            reservation.id
        ),
    };

    match gateway.create_checkout(&request).await {
        Ok(session_out) => {
            reservation_repo::set_payment_reference(pool, &reservation.id, &session_out.reference)
                .await?;
            reservation.payment_reference = Some(session_out.reference);

            sync_client(pool, &input).await;
            mailer
                .send_reservation_confirmation(&reservation, session.starts_at)
                .await;

            Ok(BookingOutcome {
                reservation,
                checkout_url: session_out.checkout_url,
                amount_due: remaining,
                waitlisted: false,
            })
        }
        Err(e) => {
            tracing::warn!(reservation_id = %reservation.id, error = %e, "Checkout creation failed, rolling back reservation");
            rollback(pool, &reservation.id, &session.id, input.quantity).await;
            Err(AppError::upstream(e.to_string()))
        }
    }
}

/// Best-effort rollback: delete the record, release the held seats.
/// Errors are logged, not retried.
async fn rollback(pool: &SqlitePool, reservation_id: &str, session_id: &str, quantity: i32) {
    if let Err(e) = reservation_repo::delete(pool, reservation_id).await {
        tracing::error!(reservation_id = %reservation_id, error = %e, "Rollback delete failed");
    }
    if let Err(e) = workshop_repo::release_seats(pool, session_id, quantity).await {
        tracing::error!(session_id = %session_id, error = %e, "Rollback seat release failed");
    }
}
