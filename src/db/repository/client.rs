//! Client Repository
//!
//! Guest checkout keeps a lightweight customer record, keyed by lowercased
//! email. The upsert is one statement (INSERT .. ON CONFLICT) so repeated
//! orders from the same guest just bump the counters.

use super::RepoResult;
use crate::db::models::Client;
use crate::utils::now_millis;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> RepoResult<Option<Client>> {
    let row = sqlx::query_as::<_, Client>("SELECT * FROM client WHERE email = ?")
        .bind(email.to_lowercase())
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Upsert on order: create the record or increment total_orders and refresh
/// last_order_date. Name/phone only fill empty fields, they never overwrite.
pub async fn sync_on_order(
    pool: &SqlitePool,
    email: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
    phone: Option<&str>,
) -> RepoResult<Client> {
    let email = email.to_lowercase();
    let now = now_millis();

    sqlx::query(
        "INSERT INTO client (id, email, first_name, last_name, phone, total_orders, last_order_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6, ?6)
         ON CONFLICT(email) DO UPDATE SET
             total_orders = total_orders + 1,
             last_order_date = ?6,
             first_name = COALESCE(first_name, ?3),
             last_name = COALESCE(last_name, ?4),
             phone = COALESCE(phone, ?5),
             updated_at = ?6",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&email)
    .bind(first_name)
    .bind(last_name)
    .bind(phone)
    .bind(now)
    .execute(pool)
    .await?;

    let client = find_by_email(pool, &email).await?;
    client.ok_or_else(|| super::RepoError::Database("Failed to upsert client".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_pool;

    #[tokio::test]
    async fn test_sync_creates_then_increments() {
        let pool = memory_pool().await;

        let c1 = sync_on_order(&pool, "Claire@Example.FR", Some("Claire"), None, None)
            .await
            .unwrap();
        assert_eq!(c1.email, "claire@example.fr");
        assert_eq!(c1.total_orders, 1);

        let c2 = sync_on_order(&pool, "claire@example.fr", None, Some("Dubois"), None)
            .await
            .unwrap();
        assert_eq!(c2.total_orders, 2);
        assert_eq!(c2.first_name.as_deref(), Some("Claire"));
        assert_eq!(c2.last_name.as_deref(), Some("Dubois"));
        assert!(c2.last_order_date.is_some());
    }

    #[tokio::test]
    async fn test_sync_does_not_overwrite_existing_contact() {
        let pool = memory_pool().await;

        sync_on_order(&pool, "marc@example.fr", Some("Marc"), None, Some("0601020304"))
            .await
            .unwrap();
        let c = sync_on_order(&pool, "marc@example.fr", Some("Autre"), None, Some("0000"))
            .await
            .unwrap();
        assert_eq!(c.first_name.as_deref(), Some("Marc"));
        assert_eq!(c.phone.as_deref(), Some("0601020304"));
    }
}
