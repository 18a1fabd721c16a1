//! Admin gift card handlers

use axum::{
    Json,
    extract::{Query, State},
};

use super::orders::ListQuery;
use crate::commerce::gift_cards::{self, PurchaseInput};
use crate::core::ServerState;
use crate::db::models::GiftCard;
use crate::db::repository::gift_card as gift_card_repo;
use crate::utils::{ApiResponse, AppResult, ok, ok_with_message};

pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<GiftCard>>>> {
    let cards = gift_card_repo::list(&state.db, query.limit, query.offset).await?;
    Ok(ok(cards))
}

/// Manual creation (in-studio sales)
pub async fn create(
    State(state): State<ServerState>,
    Json(input): Json<PurchaseInput>,
) -> AppResult<Json<ApiResponse<GiftCard>>> {
    let card = gift_cards::purchase(&state.db, input).await?;
    Ok(ok_with_message(card, "Gift card created"))
}
