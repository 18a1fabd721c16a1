//! Admin product handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::commerce::money;
use crate::core::ServerState;
use crate::db::models::Product;
use crate::db::repository::product as product_repo;
use crate::utils::{ApiResponse, AppError, AppResult, now_millis, ok, ok_with_message};

pub async fn list(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<Vec<Product>>>> {
    let products = product_repo::list_all(&state.db).await?;
    Ok(ok(products))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

pub async fn create(
    State(state): State<ServerState>,
    Json(request): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    if request.name.trim().is_empty() {
        return Err(AppError::validation("Product name is required"));
    }
    money::validate_amount(request.price, "price")?;

    let now = now_millis();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        name: request.name,
        description: request.description,
        price: request.price,
        image_url: request.image_url,
        category: request.category,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    product_repo::insert(&state.db, &product).await?;
    Ok(ok_with_message(product, "Product created"))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let mut product = product_repo::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {id} not found")))?;

    if let Some(price) = request.price {
        money::validate_amount(price, "price")?;
        product.price = price;
    }
    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("Product name cannot be empty"));
        }
        product.name = name;
    }
    if let Some(description) = request.description {
        product.description = Some(description);
    }
    if let Some(image_url) = request.image_url {
        product.image_url = Some(image_url);
    }
    if let Some(category) = request.category {
        product.category = Some(category);
    }
    if let Some(is_active) = request.is_active {
        product.is_active = is_active;
    }

    product_repo::update(&state.db, &product).await?;
    Ok(ok(product))
}
