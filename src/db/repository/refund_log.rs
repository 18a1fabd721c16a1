//! Refund step log
//!
//! Append-only record of each refund-saga step. Failed steps (typically a
//! gift-card restore after a successful gateway refund) are the
//! manual-reconciliation queue.

use super::RepoResult;
use crate::utils::now_millis;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefundStep {
    pub id: i64,
    pub target_kind: String,
    pub target_id: String,
    pub step: String,
    pub status: String,
    pub detail: Option<String>,
    pub created_at: i64,
}

pub async fn record(
    pool: &SqlitePool,
    target_kind: &str,
    target_id: &str,
    step: &str,
    succeeded: bool,
    detail: Option<&str>,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO refund_step (target_kind, target_id, step, status, detail, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(target_kind)
    .bind(target_id)
    .bind(step)
    .bind(if succeeded { "succeeded" } else { "failed" })
    .bind(detail)
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_for_target(
    pool: &SqlitePool,
    target_kind: &str,
    target_id: &str,
) -> RepoResult<Vec<RefundStep>> {
    let rows = sqlx::query_as::<_, RefundStep>(
        "SELECT * FROM refund_step WHERE target_kind = ? AND target_id = ? ORDER BY id",
    )
    .bind(target_kind)
    .bind(target_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Failed steps across all targets (manual reconciliation view)
pub async fn list_failed(pool: &SqlitePool, limit: i32) -> RepoResult<Vec<RefundStep>> {
    let rows = sqlx::query_as::<_, RefundStep>(
        "SELECT * FROM refund_step WHERE status = 'failed' ORDER BY id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
