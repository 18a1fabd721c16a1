//! Workshop, session and reservation models

use serde::{Deserialize, Serialize};

use super::order::{PaymentStatus, Provider};

/// Workshop (class) definition
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Workshop {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_minutes: Option<i32>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Cancelled,
    Completed,
}

/// One scheduled occurrence of a workshop, with fixed seat capacity.
///
/// Invariant: 0 <= booked_count <= capacity, enforced by the conditional
/// update in `repository::workshop::try_reserve_seats`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkshopSession {
    pub id: String,
    pub workshop_id: String,
    pub starts_at: i64,
    pub capacity: i32,
    pub booked_count: i32,
    pub status: SessionStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WorkshopSession {
    pub fn remaining_spots(&self) -> i32 {
        (self.capacity - self.booked_count).max(0)
    }
}

/// Reservation status state machine
///
/// Same shape as the order machine, plus the `waitlist` entry state.
/// `cancelled`/`refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReservationStatus {
    Waitlist,
    Pending,
    Confirmed,
    Cancelled,
    Refunded,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Cancelled | ReservationStatus::Refunded)
    }

    /// Whether this status counts against the session's booked_count.
    /// A waitlist reservation never held a seat.
    pub fn holds_seats(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Waitlist => "waitlist",
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Refunded => "refunded",
        }
    }
}

/// Booking against one workshop session
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reservation {
    pub id: String,
    pub workshop_id: String,
    pub session_id: String,
    pub user_id: Option<String>,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub quantity: i32,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub waitlist_position: Option<i32>,
    pub amount_paid: f64,
    pub payment_method: Option<String>,
    pub provider: Option<Provider>,
    pub payment_reference: Option<String>,
    pub gift_card_code: Option<String>,
    pub gift_card_amount: f64,
    pub refund_amount: Option<f64>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<i64>,
    pub refund_details: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Reservation {
    pub fn contact_email(&self) -> Option<&str> {
        self.guest_email.as_deref()
    }

    pub fn gateway_amount(&self) -> f64 {
        crate::commerce::money::to_f64(
            crate::commerce::money::to_decimal(self.amount_paid)
                - crate::commerce::money::to_decimal(self.gift_card_amount),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waitlist_never_holds_seats() {
        assert!(!ReservationStatus::Waitlist.holds_seats());
        assert!(ReservationStatus::Pending.holds_seats());
        assert!(ReservationStatus::Confirmed.holds_seats());
        assert!(!ReservationStatus::Cancelled.holds_seats());
    }

    #[test]
    fn test_terminal_reservation_statuses() {
        assert!(ReservationStatus::Cancelled.is_terminal());
        assert!(ReservationStatus::Refunded.is_terminal());
        assert!(!ReservationStatus::Waitlist.is_terminal());
    }

    #[test]
    fn test_remaining_spots_never_negative() {
        let session = WorkshopSession {
            id: "s1".into(),
            workshop_id: "w1".into(),
            starts_at: 0,
            capacity: 8,
            booked_count: 10,
            status: SessionStatus::Scheduled,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(session.remaining_spots(), 0);
    }
}
