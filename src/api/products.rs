//! Product catalog API (public, read-only)

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::core::ServerState;
use crate::db::models::Product;
use crate::db::repository::product as product_repo;
use crate::utils::{ApiResponse, AppError, AppResult, ok};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/products", get(list))
        .route("/api/products/{id}", get(get_by_id))
}

async fn list(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<Vec<Product>>>> {
    let products = product_repo::list_active(&state.db).await?;
    Ok(ok(products))
}

async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let product = product_repo::find_by_id(&state.db, &id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::not_found(format!("Product {id} not found")))?;
    Ok(ok(product))
}
