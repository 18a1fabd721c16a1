//! Gift card operations
//!
//! `apply` is a read-only calculation; `redeem` is the paired
//! balance-debit + ledger append (all-or-nothing, no partial redemption);
//! `restore` is the refund-side credit. Callers own exactly-once semantics
//! for deferred redemption (see the reconciler's guarded transition).

use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::commerce::money::{self, to_decimal, to_f64};
use crate::db::models::{GiftCard, GiftCardStatus};
use crate::db::repository::gift_card as gift_card_repo;
pub use crate::db::repository::gift_card::LedgerRef;
use crate::utils::{AppError, AppResult, now_millis};

/// Code alphabet: 8 characters, confusables (I, O, 0, 1) excluded
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 8;

/// Insert retries on code collision
const MAX_CODE_ATTEMPTS: usize = 5;

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Result of applying a card against an order total (no state change)
#[derive(Debug, Clone, Serialize)]
pub struct GiftCardApplication {
    pub code: String,
    pub amount_applied: f64,
    pub remaining_to_pay: f64,
    pub fully_covered: bool,
}

/// Load a card and reject unusable ones (missing, expired, emptied)
async fn load_usable_card(pool: &SqlitePool, code: &str) -> AppResult<GiftCard> {
    let card = gift_card_repo::find_by_code(pool, code)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Gift card {code} not found")))?;

    match card.derived_status(now_millis()) {
        GiftCardStatus::Expired => Err(AppError::validation("Gift card has expired")),
        GiftCardStatus::Used => Err(AppError::validation("Gift card has no remaining balance")),
        GiftCardStatus::Active if card.status != GiftCardStatus::Active => {
            // Column drifted (e.g. manually deactivated): trust the column
            Err(AppError::validation("Gift card is not active"))
        }
        GiftCardStatus::Active => Ok(card),
    }
}

/// Read-only calculation: how much of `order_total` this card covers.
///
/// Callers must invoke [`redeem`] separately once payment is otherwise
/// confirmed.
pub async fn apply(pool: &SqlitePool, code: &str, order_total: f64) -> AppResult<GiftCardApplication> {
    money::validate_amount(order_total, "order_total")?;
    let card = load_usable_card(pool, code).await?;

    let balance = to_decimal(card.balance);
    let total = to_decimal(order_total);
    let applied = balance.min(total);

    Ok(GiftCardApplication {
        code: card.code,
        amount_applied: to_f64(applied),
        remaining_to_pay: to_f64(total - applied),
        fully_covered: applied >= total,
    })
}

/// Debit `amount` from the card and append the usage ledger row.
///
/// Requires balance >= amount — there is no partial redemption. Returns the
/// card after the debit.
pub async fn redeem(
    pool: &SqlitePool,
    code: &str,
    amount: f64,
    target: LedgerRef<'_>,
) -> AppResult<GiftCard> {
    money::validate_amount(amount, "amount")?;
    if amount <= 0.0 {
        return Err(AppError::validation("redeem amount must be positive"));
    }

    let card = load_usable_card(pool, code).await?;
    if to_decimal(card.balance) + money::MONEY_TOLERANCE < to_decimal(amount) {
        return Err(AppError::validation(format!(
            "Insufficient gift card balance: {} available, {} requested",
            card.balance, amount
        )));
    }

    let note = target
        .order_id
        .map(|id| format!("Commande {id}"))
        .or_else(|| target.reservation_id.map(|id| format!("Réservation {id}")));

    let debited = gift_card_repo::try_debit_balance(pool, code, amount, target, note.as_deref()).await?;
    if !debited {
        // Lost a race with a concurrent redemption
        return Err(AppError::validation(
            "Insufficient gift card balance (concurrent redemption)",
        ));
    }

    let card = gift_card_repo::find_by_code(pool, code)
        .await?
        .ok_or_else(|| AppError::internal("gift card vanished after debit"))?;
    Ok(card)
}

/// Refund-side restore: credit the card, reactivate it regardless of prior
/// state, append the refund ledger row.
pub async fn restore(
    pool: &SqlitePool,
    code: &str,
    amount: f64,
    target: LedgerRef<'_>,
    note: Option<&str>,
) -> AppResult<GiftCard> {
    money::validate_amount(amount, "amount")?;
    if amount <= 0.0 {
        return Err(AppError::validation("restore amount must be positive"));
    }

    gift_card_repo::credit_balance(pool, code, amount, target, note).await?;
    let card = gift_card_repo::find_by_code(pool, code)
        .await?
        .ok_or_else(|| AppError::internal("gift card vanished after credit"))?;
    Ok(card)
}

/// Gift card purchase input
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PurchaseInput {
    pub amount: f64,
    pub purchaser_email: Option<String>,
    pub purchaser_name: Option<String>,
    /// Unix millis; None = no expiry
    pub expires_at: Option<i64>,
}

/// Create a card with a fresh code and its initial purchase ledger row
pub async fn purchase(pool: &SqlitePool, input: PurchaseInput) -> AppResult<GiftCard> {
    money::validate_amount(input.amount, "amount")?;
    if input.amount <= 0.0 {
        return Err(AppError::validation("gift card amount must be positive"));
    }
    if let Some(email) = &input.purchaser_email
        && !email.validate_email()
    {
        return Err(AppError::validation("invalid purchaser email"));
    }

    let now = now_millis();
    for _ in 0..MAX_CODE_ATTEMPTS {
        let card = GiftCard {
            id: Uuid::new_v4().to_string(),
            code: generate_code(),
            amount: input.amount,
            balance: input.amount,
            status: GiftCardStatus::Active,
            expires_at: input.expires_at,
            purchaser_email: input.purchaser_email.clone(),
            purchaser_name: input.purchaser_name.clone(),
            used: false,
            created_at: now,
            updated_at: now,
        };

        match gift_card_repo::insert_with_purchase(pool, &card).await {
            Ok(()) => return Ok(card),
            Err(crate::db::repository::RepoError::Duplicate(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::internal("could not generate a unique gift card code"))
}
