//! Gift Card API Module

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/gift-cards", post(handler::purchase))
        .route("/api/gift-cards/apply", post(handler::apply))
        .route("/api/gift-cards/{code}", get(handler::get_by_code))
}
