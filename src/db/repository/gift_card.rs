//! Gift Card Repository
//!
//! Every balance mutation happens inside one transaction together with its
//! ledger row. The debit is a guarded single-statement update
//! (`balance >= amount`): no partial redemption, no lost update under
//! concurrent redeems.

use super::{RepoError, RepoResult};
use crate::db::models::{GiftCard, GiftCardTransaction};
use crate::utils::now_millis;
use sqlx::SqlitePool;

/// Float comparison slack for REAL-typed money columns (half a cent)
const EPSILON: f64 = 0.005;

/// Back-reference for ledger rows
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerRef<'a> {
    pub order_id: Option<&'a str>,
    pub reservation_id: Option<&'a str>,
}

impl<'a> LedgerRef<'a> {
    pub fn order(id: &'a str) -> Self {
        Self {
            order_id: Some(id),
            reservation_id: None,
        }
    }

    pub fn reservation(id: &'a str) -> Self {
        Self {
            order_id: None,
            reservation_id: Some(id),
        }
    }
}

/// Create a card together with its initial purchase ledger row
pub async fn insert_with_purchase(pool: &SqlitePool, card: &GiftCard) -> RepoResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO gift_card (id, code, amount, balance, status, expires_at, purchaser_email,
                                purchaser_name, used, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&card.id)
    .bind(&card.code)
    .bind(card.amount)
    .bind(card.balance)
    .bind(card.status)
    .bind(card.expires_at)
    .bind(&card.purchaser_email)
    .bind(&card.purchaser_name)
    .bind(card.used)
    .bind(card.created_at)
    .bind(card.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO gift_card_transaction (gift_card_id, amount, kind, note, created_at)
         VALUES (?, ?, 'purchase', ?, ?)",
    )
    .bind(&card.id)
    .bind(card.amount)
    .bind("Achat carte cadeau")
    .bind(card.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn find_by_code(pool: &SqlitePool, code: &str) -> RepoResult<Option<GiftCard>> {
    let row = sqlx::query_as::<_, GiftCard>("SELECT * FROM gift_card WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list(pool: &SqlitePool, limit: i32, offset: i32) -> RepoResult<Vec<GiftCard>> {
    let rows = sqlx::query_as::<_, GiftCard>(
        "SELECT * FROM gift_card ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Debit `amount` from an active card and append the usage ledger row.
///
/// Returns false when the guard refuses (insufficient balance, not active).
/// Status flips to `used` when the balance reaches zero.
pub async fn try_debit_balance(
    pool: &SqlitePool,
    code: &str,
    amount: f64,
    target: LedgerRef<'_>,
    note: Option<&str>,
) -> RepoResult<bool> {
    if amount <= 0.0 {
        return Err(RepoError::Validation(format!(
            "debit amount must be positive, got {amount}"
        )));
    }

    let now = now_millis();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE gift_card
         SET balance = ROUND(balance - ?1, 2),
             used    = CASE WHEN balance - ?1 <= ?2 THEN 1 ELSE used END,
             status  = CASE WHEN balance - ?1 <= ?2 THEN 'used' ELSE status END,
             updated_at = ?3
         WHERE code = ?4 AND status = 'active' AND balance >= ?1 - ?2",
    )
    .bind(amount)
    .bind(EPSILON)
    .bind(now)
    .bind(code)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() != 1 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO gift_card_transaction (gift_card_id, amount, kind, order_id, reservation_id, note, created_at)
         SELECT id, ?1, 'usage', ?2, ?3, ?4, ?5 FROM gift_card WHERE code = ?6",
    )
    .bind(-amount)
    .bind(target.order_id)
    .bind(target.reservation_id)
    .bind(note)
    .bind(now)
    .bind(code)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Restore `amount` to a card after a refund and append the refund ledger row.
///
/// Reactivates the card (status=active, used=false) regardless of its prior
/// state; the balance is capped at the original amount.
pub async fn credit_balance(
    pool: &SqlitePool,
    code: &str,
    amount: f64,
    target: LedgerRef<'_>,
    note: Option<&str>,
) -> RepoResult<()> {
    if amount <= 0.0 {
        return Err(RepoError::Validation(format!(
            "credit amount must be positive, got {amount}"
        )));
    }

    let now = now_millis();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE gift_card
         SET balance = MIN(amount, ROUND(balance + ?1, 2)),
             used = 0,
             status = 'active',
             updated_at = ?2
         WHERE code = ?3",
    )
    .bind(amount)
    .bind(now)
    .bind(code)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() != 1 {
        tx.rollback().await?;
        return Err(RepoError::NotFound(format!("Gift card {code} not found")));
    }

    sqlx::query(
        "INSERT INTO gift_card_transaction (gift_card_id, amount, kind, order_id, reservation_id, note, created_at)
         SELECT id, ?1, 'refund', ?2, ?3, ?4, ?5 FROM gift_card WHERE code = ?6",
    )
    .bind(amount)
    .bind(target.order_id)
    .bind(target.reservation_id)
    .bind(note)
    .bind(now)
    .bind(code)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn ledger(pool: &SqlitePool, gift_card_id: &str) -> RepoResult<Vec<GiftCardTransaction>> {
    let rows = sqlx::query_as::<_, GiftCardTransaction>(
        "SELECT * FROM gift_card_transaction WHERE gift_card_id = ? ORDER BY id",
    )
    .bind(gift_card_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Balance recomputed from the ledger: amount + sum of non-purchase rows.
/// The cached `balance` column must always equal this projection.
pub async fn ledger_balance(pool: &SqlitePool, gift_card_id: &str) -> RepoResult<f64> {
    let balance: f64 = sqlx::query_scalar(
        "SELECT g.amount + COALESCE(SUM(t.amount), 0)
         FROM gift_card g
         LEFT JOIN gift_card_transaction t
           ON t.gift_card_id = g.id AND t.kind <> 'purchase'
         WHERE g.id = ?
         GROUP BY g.id",
    )
    .bind(gift_card_id)
    .fetch_one(pool)
    .await?;
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::GiftCardStatus;
    use crate::db::testing::{memory_pool, seed_gift_card};

    #[tokio::test]
    async fn test_debit_reduces_balance_and_appends_ledger() {
        let pool = memory_pool().await;
        seed_gift_card(&pool, "CADEAU30", 30.0, 30.0).await;

        let ok = try_debit_balance(&pool, "CADEAU30", 20.0, LedgerRef::order("o1"), None)
            .await
            .unwrap();
        assert!(ok);

        let card = find_by_code(&pool, "CADEAU30").await.unwrap().unwrap();
        assert_eq!(card.balance, 10.0);
        assert_eq!(card.status, GiftCardStatus::Active);

        let rows = ledger(&pool, &card.id).await.unwrap();
        assert_eq!(rows.len(), 2); // purchase + usage
        assert_eq!(rows[1].amount, -20.0);
        assert_eq!(rows[1].order_id.as_deref(), Some("o1"));
    }

    #[tokio::test]
    async fn test_debit_to_zero_marks_used() {
        let pool = memory_pool().await;
        seed_gift_card(&pool, "CADEAU30", 30.0, 10.0).await;

        assert!(
            try_debit_balance(&pool, "CADEAU30", 10.0, LedgerRef::order("o1"), None)
                .await
                .unwrap()
        );

        let card = find_by_code(&pool, "CADEAU30").await.unwrap().unwrap();
        assert_eq!(card.balance, 0.0);
        assert_eq!(card.status, GiftCardStatus::Used);
        assert!(card.used);
    }

    #[tokio::test]
    async fn test_debit_refused_on_insufficient_balance() {
        let pool = memory_pool().await;
        seed_gift_card(&pool, "CADEAU30", 30.0, 15.0).await;

        let ok = try_debit_balance(&pool, "CADEAU30", 20.0, LedgerRef::order("o1"), None)
            .await
            .unwrap();
        assert!(!ok);

        // No mutation, no ledger row
        let card = find_by_code(&pool, "CADEAU30").await.unwrap().unwrap();
        assert_eq!(card.balance, 15.0);
        assert_eq!(ledger(&pool, &card.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_debit_refused_on_used_card() {
        let pool = memory_pool().await;
        seed_gift_card(&pool, "CADEAU30", 30.0, 30.0).await;
        try_debit_balance(&pool, "CADEAU30", 30.0, LedgerRef::order("o1"), None)
            .await
            .unwrap();

        let ok = try_debit_balance(&pool, "CADEAU30", 1.0, LedgerRef::order("o2"), None)
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_credit_restores_and_reactivates() {
        let pool = memory_pool().await;
        seed_gift_card(&pool, "CADEAU30", 30.0, 30.0).await;
        try_debit_balance(&pool, "CADEAU30", 30.0, LedgerRef::order("o1"), None)
            .await
            .unwrap();

        credit_balance(
            &pool,
            "CADEAU30",
            30.0,
            LedgerRef::order("o1"),
            Some("Remboursement commande o1"),
        )
        .await
        .unwrap();

        let card = find_by_code(&pool, "CADEAU30").await.unwrap().unwrap();
        assert_eq!(card.balance, 30.0);
        assert_eq!(card.status, GiftCardStatus::Active);
        assert!(!card.used);
    }

    #[tokio::test]
    async fn test_credit_capped_at_original_amount() {
        let pool = memory_pool().await;
        seed_gift_card(&pool, "CADEAU30", 30.0, 25.0).await;

        credit_balance(&pool, "CADEAU30", 10.0, LedgerRef::order("o1"), None)
            .await
            .unwrap();

        let card = find_by_code(&pool, "CADEAU30").await.unwrap().unwrap();
        assert_eq!(card.balance, 30.0);
    }

    #[tokio::test]
    async fn test_ledger_balance_matches_cached_balance() {
        let pool = memory_pool().await;
        seed_gift_card(&pool, "CADEAU50", 50.0, 50.0).await;

        try_debit_balance(&pool, "CADEAU50", 20.0, LedgerRef::order("o1"), None)
            .await
            .unwrap();
        try_debit_balance(&pool, "CADEAU50", 15.0, LedgerRef::reservation("r1"), None)
            .await
            .unwrap();
        credit_balance(&pool, "CADEAU50", 15.0, LedgerRef::reservation("r1"), None)
            .await
            .unwrap();

        let card = find_by_code(&pool, "CADEAU50").await.unwrap().unwrap();
        let projected = ledger_balance(&pool, &card.id).await.unwrap();
        assert_eq!(card.balance, projected);
        assert_eq!(projected, 30.0);
    }

    #[tokio::test]
    async fn test_credit_unknown_card_errors() {
        let pool = memory_pool().await;
        let err = credit_balance(&pool, "NOPE", 10.0, LedgerRef::default(), None).await;
        assert!(matches!(err, Err(RepoError::NotFound(_))));
    }
}
