//! Client (customer record) model
//!
//! Upserted best-effort at guest checkout, keyed by lowercased email.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub total_orders: i32,
    pub last_order_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
