//! Reservation Repository
//!
//! Same guarded `mark_paid` transition as the order repository — the
//! reconciler treats both aggregates through one code path.

use super::RepoResult;
use crate::db::models::{Reservation, ReservationStatus};
use crate::utils::now_millis;
use sqlx::SqlitePool;

pub async fn insert(pool: &SqlitePool, reservation: &Reservation) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO reservation (id, workshop_id, session_id, user_id, guest_email, guest_name,
                                  guest_phone, quantity, status, payment_status, waitlist_position,
                                  amount_paid, payment_method, provider, payment_reference,
                                  gift_card_code, gift_card_amount, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&reservation.id)
    .bind(&reservation.workshop_id)
    .bind(&reservation.session_id)
    .bind(&reservation.user_id)
    .bind(&reservation.guest_email)
    .bind(&reservation.guest_name)
    .bind(&reservation.guest_phone)
    .bind(reservation.quantity)
    .bind(reservation.status)
    .bind(reservation.payment_status)
    .bind(reservation.waitlist_position)
    .bind(reservation.amount_paid)
    .bind(&reservation.payment_method)
    .bind(reservation.provider)
    .bind(&reservation.payment_reference)
    .bind(&reservation.gift_card_code)
    .bind(reservation.gift_card_amount)
    .bind(reservation.created_at)
    .bind(reservation.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Reservation>> {
    let row = sqlx::query_as::<_, Reservation>("SELECT * FROM reservation WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_payment_reference(
    pool: &SqlitePool,
    reference: &str,
) -> RepoResult<Option<Reservation>> {
    let row = sqlx::query_as::<_, Reservation>("SELECT * FROM reservation WHERE payment_reference = ?")
        .bind(reference)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list(pool: &SqlitePool, limit: i32, offset: i32) -> RepoResult<Vec<Reservation>> {
    let rows = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservation ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_for_session(pool: &SqlitePool, session_id: &str) -> RepoResult<Vec<Reservation>> {
    let rows = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservation WHERE session_id = ? ORDER BY created_at",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Next waitlist position = existing waitlisted reservations + 1
pub async fn count_waitlisted(pool: &SqlitePool, session_id: &str) -> RepoResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reservation WHERE session_id = ? AND status = 'waitlist'",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Booking rollback after a failed provider checkout
pub async fn delete(pool: &SqlitePool, id: &str) -> RepoResult<bool> {
    let result = sqlx::query("DELETE FROM reservation WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update_status(
    pool: &SqlitePool,
    id: &str,
    status: ReservationStatus,
) -> RepoResult<()> {
    sqlx::query("UPDATE reservation SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(now_millis())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Converge to paid/confirmed; only the first delivery wins (see order::mark_paid)
pub async fn mark_paid(pool: &SqlitePool, id: &str) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE reservation SET payment_status = 'paid', status = 'confirmed', updated_at = ?
         WHERE id = ? AND payment_status <> 'paid' AND status NOT IN ('cancelled', 'refunded')",
    )
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Guarded failure transition (see order::mark_payment_failed)
pub async fn mark_payment_failed(pool: &SqlitePool, id: &str) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE reservation SET payment_status = 'failed', updated_at = ?
         WHERE id = ? AND payment_status IN ('unpaid', 'pending')",
    )
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_payment_reference(pool: &SqlitePool, id: &str, reference: &str) -> RepoResult<()> {
    sqlx::query("UPDATE reservation SET payment_reference = ?, updated_at = ? WHERE id = ?")
        .bind(reference)
        .bind(now_millis())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Waitlist promotion: clears the waitlist position. Callers must have
/// grabbed the seats first (`workshop::try_reserve_seats`).
pub async fn promote(pool: &SqlitePool, id: &str) -> RepoResult<()> {
    sqlx::query(
        "UPDATE reservation SET status = 'confirmed', waitlist_position = NULL, updated_at = ?
         WHERE id = ?",
    )
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn apply_refund(
    pool: &SqlitePool,
    id: &str,
    status: ReservationStatus,
    refund_amount: f64,
    refund_reason: Option<&str>,
    refund_details_json: &str,
) -> RepoResult<()> {
    let now = now_millis();
    sqlx::query(
        "UPDATE reservation SET status = ?, payment_status = 'refunded', refund_amount = ?,
                refund_reason = ?, refunded_at = ?, refund_details = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(status)
    .bind(refund_amount)
    .bind(refund_reason)
    .bind(now)
    .bind(refund_details_json)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{PaymentStatus, Provider};
    use crate::db::testing::{memory_pool, seed_session, seed_workshop};

    fn test_reservation(id: &str, session_id: &str, status: ReservationStatus) -> Reservation {
        let now = now_millis();
        Reservation {
            id: id.to_string(),
            workshop_id: "w1".to_string(),
            session_id: session_id.to_string(),
            user_id: None,
            guest_email: Some("marc@example.fr".to_string()),
            guest_name: Some("Marc Petit".to_string()),
            guest_phone: None,
            quantity: 1,
            status,
            payment_status: PaymentStatus::Pending,
            waitlist_position: None,
            amount_paid: 45.0,
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
        }
    }

    #[tokio::test]
    async fn test_insert_find_delete() {
        let pool = memory_pool().await;
        seed_workshop(&pool, "w1", "Tournage", 45.0).await;
        seed_session(&pool, "s1", "w1", 5).await;

        insert(&pool, &test_reservation("r1", "s1", ReservationStatus::Pending))
            .await
            .unwrap();
        assert!(find_by_id(&pool, "r1").await.unwrap().is_some());
        assert!(
            find_by_payment_reference(&pool, "pi-r1")
                .await
                .unwrap()
                .is_some()
        );

        assert!(delete(&pool, "r1").await.unwrap());
        assert!(find_by_id(&pool, "r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_waitlisted_only_counts_waitlist_status() {
        let pool = memory_pool().await;
        seed_workshop(&pool, "w1", "Tournage", 45.0).await;
        seed_session(&pool, "s1", "w1", 1).await;

        let mut wl = test_reservation("r1", "s1", ReservationStatus::Waitlist);
        wl.waitlist_position = Some(1);
        insert(&pool, &wl).await.unwrap();
        insert(&pool, &test_reservation("r2", "s1", ReservationStatus::Confirmed))
            .await
            .unwrap();

        assert_eq!(count_waitlisted(&pool, "s1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_paid_idempotent_for_reservations() {
        let pool = memory_pool().await;
        seed_workshop(&pool, "w1", "Tournage", 45.0).await;
        seed_session(&pool, "s1", "w1", 5).await;
        insert(&pool, &test_reservation("r1", "s1", ReservationStatus::Pending))
            .await
            .unwrap();

        assert!(mark_paid(&pool, "r1").await.unwrap());
        assert!(!mark_paid(&pool, "r1").await.unwrap());

        let r = find_by_id(&pool, "r1").await.unwrap().unwrap();
        assert_eq!(r.status, ReservationStatus::Confirmed);
        assert_eq!(r.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_promote_clears_waitlist_position() {
        let pool = memory_pool().await;
        seed_workshop(&pool, "w1", "Tournage", 45.0).await;
        seed_session(&pool, "s1", "w1", 5).await;

        let mut wl = test_reservation("r1", "s1", ReservationStatus::Waitlist);
        wl.waitlist_position = Some(1);
        insert(&pool, &wl).await.unwrap();

        promote(&pool, "r1").await.unwrap();
        let r = find_by_id(&pool, "r1").await.unwrap().unwrap();
        assert_eq!(r.status, ReservationStatus::Confirmed);
        assert!(r.waitlist_position.is_none());
    }
}
