//! Database Module
//!
//! Handles SQLite connection pool and migrations

pub mod models;
pub mod repository;

use crate::utils::AppError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;

/// Database service — owns a SQLite connection pool
#[derive(Clone)]
pub struct DbService {
    pub pool: SqlitePool,
}

impl DbService {
    /// Create a new database service with WAL mode
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        // Build connection options: WAL, foreign keys, normal sync
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| AppError::database(format!("Invalid database path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON")
            .optimize_on_close(true, None);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        // busy_timeout: 写冲突时等待 5s 而非立即失败
        sqlx::query("PRAGMA busy_timeout = 5000;")
            .execute(&pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to set busy_timeout: {e}")))?;

        tracing::info!("Database connection established (SQLite WAL, busy_timeout=5000ms)");

        // Run migrations (ignore previously applied but now removed migrations)
        sqlx::migrate!("./migrations")
            .set_ignore_missing(true)
            .run(&pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to apply migrations: {e}")))?;
        tracing::info!("Database migrations applied");

        Ok(Self { pool })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for repository and commerce tests.

    use crate::utils::now_millis;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;

    /// In-memory SQLite pool with the full schema applied.
    ///
    /// Single connection: a pooled :memory: database is per-connection.
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    pub async fn seed_product(pool: &SqlitePool, id: &str, name: &str, price: f64) {
        let now = now_millis();
        sqlx::query(
            "INSERT INTO product (id, name, price, is_active, created_at, updated_at) VALUES (?, ?, ?, 1, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(price)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
    }

    pub async fn seed_workshop(pool: &SqlitePool, id: &str, name: &str, price: f64) {
        let now = now_millis();
        sqlx::query(
            "INSERT INTO workshop (id, name, price, is_active, created_at, updated_at) VALUES (?, ?, ?, 1, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(price)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
    }

    pub async fn seed_session(pool: &SqlitePool, id: &str, workshop_id: &str, capacity: i32) {
        let now = now_millis();
        sqlx::query(
            "INSERT INTO workshop_session (id, workshop_id, starts_at, capacity, booked_count, status, created_at, updated_at) VALUES (?, ?, ?, ?, 0, 'scheduled', ?, ?)",
        )
        .bind(id)
        .bind(workshop_id)
        .bind(now + 7 * 24 * 3600 * 1000)
        .bind(capacity)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
    }

    pub async fn seed_gift_card(pool: &SqlitePool, code: &str, amount: f64, balance: f64) {
        let now = now_millis();
        sqlx::query(
            "INSERT INTO gift_card (id, code, amount, balance, status, used, created_at, updated_at) VALUES (?, ?, ?, ?, 'active', 0, ?, ?)",
        )
        .bind(format!("gc-{code}"))
        .bind(code)
        .bind(amount)
        .bind(balance)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
        // Initial purchase ledger row
        sqlx::query(
            "INSERT INTO gift_card_transaction (gift_card_id, amount, kind, created_at) VALUES (?, ?, 'purchase', ?)",
        )
        .bind(format!("gc-{code}"))
        .bind(amount)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
    }
}
