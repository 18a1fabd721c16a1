//! Gift card and ledger models
//!
//! The transaction ledger is append-only and is the source of truth;
//! `balance` is a cached projection (balance = amount + sum of all
//! non-purchase transaction amounts).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum GiftCardStatus {
    Active,
    Used,
    Expired,
}

/// Stored-value instrument identified by an 8-character code
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GiftCard {
    pub id: String,
    pub code: String,
    /// Original amount at purchase
    pub amount: f64,
    /// Current balance (cached projection of the ledger)
    pub balance: f64,
    pub status: GiftCardStatus,
    pub expires_at: Option<i64>,
    pub purchaser_email: Option<String>,
    pub purchaser_name: Option<String>,
    pub used: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl GiftCard {
    /// Status is derived: expiry wins, then exhausted balance, else active
    pub fn derived_status(&self, now_millis: i64) -> GiftCardStatus {
        if let Some(expiry) = self.expires_at
            && expiry < now_millis
        {
            return GiftCardStatus::Expired;
        }
        if self.balance <= 0.0 {
            return GiftCardStatus::Used;
        }
        GiftCardStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Usage,
    Refund,
}

/// Append-only ledger row; amount is signed (+ credit, − debit)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GiftCardTransaction {
    pub id: i64,
    pub gift_card_id: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub order_id: Option<String>,
    pub reservation_id: Option<String>,
    pub note: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(balance: f64, expires_at: Option<i64>) -> GiftCard {
        GiftCard {
            id: "gc-1".into(),
            code: "ABCD2345".into(),
            amount: 50.0,
            balance,
            status: GiftCardStatus::Active,
            expires_at,
            purchaser_email: None,
            purchaser_name: None,
            used: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_derived_status_active() {
        assert_eq!(card(30.0, None).derived_status(1000), GiftCardStatus::Active);
    }

    #[test]
    fn test_derived_status_used_at_zero_balance() {
        assert_eq!(card(0.0, None).derived_status(1000), GiftCardStatus::Used);
    }

    #[test]
    fn test_derived_status_expiry_wins_over_balance() {
        // Expired card with remaining balance reports expired
        assert_eq!(
            card(30.0, Some(500)).derived_status(1000),
            GiftCardStatus::Expired
        );
    }

    #[test]
    fn test_not_expired_before_expiry_date() {
        assert_eq!(
            card(30.0, Some(2000)).derived_status(1000),
            GiftCardStatus::Active
        );
    }
}
