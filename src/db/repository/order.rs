//! Order Repository
//!
//! Inserts are transactional (order + line items). The webhook transition
//! `mark_paid` is a guarded single-statement update: its affected-row count
//! tells the reconciler whether it won the transition (duplicate webhook
//! deliveries lose and become no-ops).

use super::RepoResult;
use crate::db::models::{Order, OrderItem, OrderStatus};
use crate::utils::now_millis;
use sqlx::SqlitePool;

/// Line item at insert time (id is assigned by the database)
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: i32,
}

pub async fn insert(pool: &SqlitePool, order: &Order, items: &[NewOrderItem]) -> RepoResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO orders (id, user_id, guest_email, guest_name, guest_phone, shipping_address,
                             total_amount, status, payment_status, payment_method, provider,
                             payment_reference, gift_card_code, gift_card_amount, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(&order.guest_email)
    .bind(&order.guest_name)
    .bind(&order.guest_phone)
    .bind(&order.shipping_address)
    .bind(order.total_amount)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(&order.payment_method)
    .bind(order.provider)
    .bind(&order.payment_reference)
    .bind(&order.gift_card_code)
    .bind(order.gift_card_amount)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *tx)
    .await?;

    for item in items {
        sqlx::query(
            "INSERT INTO order_item (order_id, product_id, name, unit_price, quantity) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.unit_price)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Order>> {
    let row = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_items(pool: &SqlitePool, order_id: &str) -> RepoResult<Vec<OrderItem>> {
    let rows = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_item WHERE order_id = ? ORDER BY id")
        .bind(order_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn find_by_payment_reference(
    pool: &SqlitePool,
    reference: &str,
) -> RepoResult<Option<Order>> {
    let row = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_reference = ?")
        .bind(reference)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list(pool: &SqlitePool, limit: i32, offset: i32) -> RepoResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Checkout rollback: remove the order and its items (items first, then the
/// order, in one transaction — no reliance on cascade pragma state).
pub async fn delete(pool: &SqlitePool, order_id: &str) -> RepoResult<bool> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM order_item WHERE order_id = ?")
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM orders WHERE id = ?")
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update_status(pool: &SqlitePool, order_id: &str, status: OrderStatus) -> RepoResult<()> {
    sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(now_millis())
        .bind(order_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Converge the order to paid/confirmed. Returns true only for the winning
/// transition; repeats and terminal orders are left untouched.
pub async fn mark_paid(pool: &SqlitePool, order_id: &str) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE orders SET payment_status = 'paid', status = 'confirmed', updated_at = ?
         WHERE id = ? AND payment_status <> 'paid' AND status NOT IN ('cancelled', 'refunded')",
    )
    .bind(now_millis())
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Record a failed/abandoned payment. Guarded: an already-paid or terminal
/// order is not touched by an out-of-order failure event.
pub async fn mark_payment_failed(pool: &SqlitePool, order_id: &str) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE orders SET payment_status = 'failed', updated_at = ?
         WHERE id = ? AND payment_status IN ('unpaid', 'pending')",
    )
    .bind(now_millis())
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Record the updated provider payment id once the charge settles
pub async fn set_payment_reference(
    pool: &SqlitePool,
    order_id: &str,
    reference: &str,
) -> RepoResult<()> {
    sqlx::query("UPDATE orders SET payment_reference = ?, updated_at = ? WHERE id = ?")
        .bind(reference)
        .bind(now_millis())
        .bind(order_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Persist the outcome of the refund orchestration
pub async fn apply_refund(
    pool: &SqlitePool,
    order_id: &str,
    status: OrderStatus,
    refund_amount: f64,
    refund_reason: Option<&str>,
    refund_details_json: &str,
) -> RepoResult<()> {
    let now = now_millis();
    sqlx::query(
        "UPDATE orders SET status = ?, payment_status = 'refunded', refund_amount = ?,
                refund_reason = ?, refunded_at = ?, refund_details = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(status)
    .bind(refund_amount)
    .bind(refund_reason)
    .bind(now)
    .bind(refund_details_json)
    .bind(now)
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{PaymentStatus, Provider};
    use crate::db::testing::memory_pool;

    fn test_order(id: &str, total: f64) -> Order {
        let now = now_millis();
        Order {
            id: id.to_string(),
            user_id: None,
            guest_email: Some("claire@example.fr".to_string()),
            guest_name: Some("Claire Dubois".to_string()),
            guest_phone: None,
            shipping_address: None,
            total_amount: total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: Some("card".to_string()),
            provider: Some(Provider::Square),
            payment_reference: Some(format!("pay-{id}")),
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

    fn test_items() -> Vec<NewOrderItem> {
        vec![
            NewOrderItem {
                product_id: "p1".to_string(),
                name: "Bol céramique".to_string(),
                unit_price: 24.0,
                quantity: 2,
            },
            NewOrderItem {
                product_id: "p2".to_string(),
                name: "Tasse émaillée".to_string(),
                unit_price: 18.0,
                quantity: 1,
            },
        ]
    }

    #[tokio::test]
    async fn test_insert_and_fetch_with_items() {
        let pool = memory_pool().await;
        insert(&pool, &test_order("o1", 66.0), &test_items())
            .await
            .unwrap();

        let order = find_by_id(&pool, "o1").await.unwrap().unwrap();
        assert_eq!(order.total_amount, 66.0);
        assert_eq!(order.status, OrderStatus::Pending);

        let items = find_items(&pool, "o1").await.unwrap();
        assert_eq!(items.len(), 2);
        let sum: f64 = items.iter().map(|i| i.unit_price * i.quantity as f64).sum();
        assert_eq!(sum, order.total_amount);
    }

    #[tokio::test]
    async fn test_find_by_payment_reference() {
        let pool = memory_pool().await;
        insert(&pool, &test_order("o1", 40.0), &test_items())
            .await
            .unwrap();

        let found = find_by_payment_reference(&pool, "pay-o1").await.unwrap();
        assert!(found.is_some());
        assert!(
            find_by_payment_reference(&pool, "pay-unknown")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_mark_paid_is_idempotent() {
        let pool = memory_pool().await;
        insert(&pool, &test_order("o1", 40.0), &test_items())
            .await
            .unwrap();

        assert!(mark_paid(&pool, "o1").await.unwrap());
        // Second delivery of the same webhook loses the transition
        assert!(!mark_paid(&pool, "o1").await.unwrap());

        let order = find_by_id(&pool, "o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_mark_paid_skips_terminal_order() {
        let pool = memory_pool().await;
        insert(&pool, &test_order("o1", 40.0), &test_items())
            .await
            .unwrap();
        update_status(&pool, "o1", OrderStatus::Cancelled).await.unwrap();

        // Late webhook must not revive a cancelled order
        assert!(!mark_paid(&pool, "o1").await.unwrap());
        let order = find_by_id(&pool, "o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_delete_removes_order_and_items() {
        let pool = memory_pool().await;
        insert(&pool, &test_order("o1", 66.0), &test_items())
            .await
            .unwrap();

        assert!(delete(&pool, "o1").await.unwrap());
        assert!(find_by_id(&pool, "o1").await.unwrap().is_none());
        assert!(find_items(&pool, "o1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_refund_persists_breakdown() {
        let pool = memory_pool().await;
        insert(&pool, &test_order("o1", 40.0), &test_items())
            .await
            .unwrap();

        apply_refund(
            &pool,
            "o1",
            OrderStatus::Cancelled,
            40.0,
            Some("customer request"),
            r#"{"total_refunded":40.0}"#,
        )
        .await
        .unwrap();

        let order = find_by_id(&pool, "o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert_eq!(order.refund_amount, Some(40.0));
        assert!(order.refunded_at.is_some());
        assert!(order.refund_details.unwrap().contains("total_refunded"));
    }
}
