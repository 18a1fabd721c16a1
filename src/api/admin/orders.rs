//! Admin order handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::commerce::refund::{self, RefundMode};
use crate::core::ServerState;
use crate::db::models::{Order, OrderItem, OrderStatus};
use crate::db::repository::{order as order_repo, refund_log};
use crate::utils::{ApiResponse, AppError, AppResult, ok, ok_with_message};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i32,
    #[serde(default)]
    pub offset: i32,
}

fn default_limit() -> i32 {
    50
}

pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    let orders = order_repo::list(&state.db, query.limit, query.offset).await?;
    Ok(ok(orders))
}

#[derive(serde::Serialize)]
pub struct AdminOrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub refund_steps: Vec<refund_log::RefundStep>,
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<AdminOrderDetail>>> {
    let order = order_repo::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    let items = order_repo::find_items(&state.db, &id).await?;
    let refund_steps = refund_log::list_for_target(&state.db, "order", &id).await?;
    Ok(ok(AdminOrderDetail {
        order,
        items,
        refund_steps,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Fulfilment status changes (preparing/shipped/delivered...).
/// Cancellation and refunds go through their dedicated actions so the
/// orchestration always runs.
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = order_repo::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;

    if matches!(request.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
        return Err(AppError::validation(
            "Use the cancel/refund actions for terminal statuses",
        ));
    }
    if !order.status.can_transition_to(request.status) {
        return Err(AppError::state_conflict(format!(
            "Cannot move order from {} to {}",
            order.status.as_str(),
            request.status.as_str()
        )));
    }

    order_repo::update_status(&state.db, &id, request.status).await?;
    let order = order_repo::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::internal("order vanished after status update"))?;
    Ok(ok(order))
}

#[derive(Debug, Deserialize, Default)]
pub struct RefundRequest {
    pub reason: Option<String>,
}

pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    run_refund(&state, &id, request.reason, RefundMode::Cancel).await
}

pub async fn refund(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    run_refund(&state, &id, request.reason, RefundMode::Refund).await
}

async fn run_refund(
    state: &ServerState,
    id: &str,
    reason: Option<String>,
    mode: RefundMode,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = order_repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;
    let gateway = state.gateway_for(order.provider);

    let order = refund::refund_order(
        &state.db,
        gateway.as_deref(),
        &state.mailer,
        id,
        reason.as_deref(),
        mode,
    )
    .await?;

    Ok(ok_with_message(order, "Refund orchestration complete"))
}

pub async fn list_failed_refund_steps(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<refund_log::RefundStep>>>> {
    let steps = refund_log::list_failed(&state.db, query.limit).await?;
    Ok(ok(steps))
}
