//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use crate::commerce::checkout::{self, CheckoutInput, CheckoutOutcome};
use crate::core::ServerState;
use crate::db::models::{Order, OrderItem};
use crate::db::repository::order as order_repo;
use crate::utils::{ApiResponse, AppError, AppResult, ok, ok_with_message};

/// Guest or authenticated checkout
pub async fn create(
    State(state): State<ServerState>,
    Json(input): Json<CheckoutInput>,
) -> AppResult<Json<ApiResponse<CheckoutOutcome>>> {
    let frontend_url = state.config.frontend_url()?;
    let gateway = state.gateway_for(input.provider);

    let outcome = checkout::create_order(
        &state.db,
        gateway.as_deref(),
        &state.mailer,
        &frontend_url,
        input,
    )
    .await?;

    Ok(ok_with_message(outcome, "Order created"))
}

#[derive(Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = order_repo::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    let items = order_repo::find_items(&state.db, &id).await?;
    Ok(ok(OrderDetail { order, items }))
}
