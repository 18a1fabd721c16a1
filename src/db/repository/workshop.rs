//! Workshop and Session Repository

use super::{RepoError, RepoResult};
use crate::db::models::{SessionStatus, Workshop, WorkshopSession};
use crate::utils::now_millis;
use sqlx::SqlitePool;

pub async fn insert_workshop(pool: &SqlitePool, workshop: &Workshop) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO workshop (id, name, description, price, duration_minutes, image_url, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&workshop.id)
    .bind(&workshop.name)
    .bind(&workshop.description)
    .bind(workshop.price)
    .bind(workshop.duration_minutes)
    .bind(&workshop.image_url)
    .bind(workshop.is_active)
    .bind(workshop.created_at)
    .bind(workshop.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_workshop(pool: &SqlitePool, id: &str) -> RepoResult<Option<Workshop>> {
    let row = sqlx::query_as::<_, Workshop>("SELECT * FROM workshop WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_workshops(pool: &SqlitePool, active_only: bool) -> RepoResult<Vec<Workshop>> {
    let rows = if active_only {
        sqlx::query_as::<_, Workshop>("SELECT * FROM workshop WHERE is_active = 1 ORDER BY name")
            .fetch_all(pool)
            .await?
    } else {
        sqlx::query_as::<_, Workshop>("SELECT * FROM workshop ORDER BY name")
            .fetch_all(pool)
            .await?
    };
    Ok(rows)
}

pub async fn insert_session(pool: &SqlitePool, session: &WorkshopSession) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO workshop_session (id, workshop_id, starts_at, capacity, booked_count, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&session.id)
    .bind(&session.workshop_id)
    .bind(session.starts_at)
    .bind(session.capacity)
    .bind(session.booked_count)
    .bind(session.status)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_session(pool: &SqlitePool, id: &str) -> RepoResult<Option<WorkshopSession>> {
    let row = sqlx::query_as::<_, WorkshopSession>("SELECT * FROM workshop_session WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_sessions(pool: &SqlitePool, workshop_id: &str) -> RepoResult<Vec<WorkshopSession>> {
    let rows = sqlx::query_as::<_, WorkshopSession>(
        "SELECT * FROM workshop_session WHERE workshop_id = ? ORDER BY starts_at",
    )
    .bind(workshop_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Atomically hold `quantity` seats on a scheduled session.
///
/// Single conditional UPDATE: succeeds only while
/// booked_count + quantity <= capacity. Returns false when the session is
/// full (or not scheduled) — the caller decides waitlist vs. rejection.
pub async fn try_reserve_seats(
    pool: &SqlitePool,
    session_id: &str,
    quantity: i32,
) -> RepoResult<bool> {
    if quantity <= 0 {
        return Err(RepoError::Validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    let result = sqlx::query(
        "UPDATE workshop_session
         SET booked_count = booked_count + ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'scheduled' AND booked_count + ?1 <= capacity",
    )
    .bind(quantity)
    .bind(now_millis())
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Release previously held seats (bounded at zero).
pub async fn release_seats(pool: &SqlitePool, session_id: &str, quantity: i32) -> RepoResult<()> {
    sqlx::query(
        "UPDATE workshop_session
         SET booked_count = MAX(0, booked_count - ?1), updated_at = ?2
         WHERE id = ?3",
    )
    .bind(quantity)
    .bind(now_millis())
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update session capacity; rejected below the current booked_count.
pub async fn update_capacity(pool: &SqlitePool, session_id: &str, capacity: i32) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE workshop_session SET capacity = ?1, updated_at = ?2
         WHERE id = ?3 AND booked_count <= ?1",
    )
    .bind(capacity)
    .bind(now_millis())
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_session_status(
    pool: &SqlitePool,
    session_id: &str,
    status: SessionStatus,
) -> RepoResult<()> {
    sqlx::query("UPDATE workshop_session SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(now_millis())
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}
