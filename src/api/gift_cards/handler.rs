//! Gift Card API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use crate::commerce::gift_cards::{self, GiftCardApplication, PurchaseInput};
use crate::core::ServerState;
use crate::db::models::{GiftCard, GiftCardStatus};
use crate::db::repository::gift_card as gift_card_repo;
use crate::utils::{ApiResponse, AppError, AppResult, now_millis, ok, ok_with_message};

/// Purchase a new gift card
pub async fn purchase(
    State(state): State<ServerState>,
    Json(input): Json<PurchaseInput>,
) -> AppResult<Json<ApiResponse<GiftCard>>> {
    let card = gift_cards::purchase(&state.db, input).await?;
    Ok(ok_with_message(card, "Gift card created"))
}

/// Public balance check: only non-sensitive fields
#[derive(Serialize)]
pub struct GiftCardView {
    pub code: String,
    pub balance: f64,
    pub status: GiftCardStatus,
    pub expires_at: Option<i64>,
}

pub async fn get_by_code(
    State(state): State<ServerState>,
    Path(code): Path<String>,
) -> AppResult<Json<ApiResponse<GiftCardView>>> {
    let card = gift_card_repo::find_by_code(&state.db, &code)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Gift card {code} not found")))?;
    Ok(ok(GiftCardView {
        status: card.derived_status(now_millis()),
        code: card.code,
        balance: card.balance,
        expires_at: card.expires_at,
    }))
}

#[derive(Deserialize)]
pub struct ApplyRequest {
    pub code: String,
    pub order_total: f64,
}

/// Read-only application against an order total (no state change)
pub async fn apply(
    State(state): State<ServerState>,
    Json(request): Json<ApplyRequest>,
) -> AppResult<Json<ApiResponse<GiftCardApplication>>> {
    let application = gift_cards::apply(&state.db, &request.code, request.order_total).await?;
    Ok(ok(application))
}
