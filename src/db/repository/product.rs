//! Product Repository

use super::RepoResult;
use crate::db::models::Product;
use crate::utils::now_millis;
use sqlx::SqlitePool;

pub async fn insert(pool: &SqlitePool, product: &Product) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO product (id, name, description, price, image_url, category, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(&product.image_url)
    .bind(&product.category)
    .bind(product.is_active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Product>> {
    let row = sqlx::query_as::<_, Product>("SELECT * FROM product WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_active(pool: &SqlitePool) -> RepoResult<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>("SELECT * FROM product WHERE is_active = 1 ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn list_all(pool: &SqlitePool) -> RepoResult<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>("SELECT * FROM product ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn update(pool: &SqlitePool, product: &Product) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE product SET name = ?, description = ?, price = ?, image_url = ?, category = ?,
                is_active = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(&product.image_url)
    .bind(&product.category)
    .bind(product.is_active)
    .bind(now_millis())
    .bind(&product.id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
