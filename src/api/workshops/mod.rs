//! Workshop API Module

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/workshops", get(handler::list))
        .route("/api/workshops/reservations", post(handler::book))
        .route("/api/workshops/reservations/{id}", get(handler::get_reservation))
        .route("/api/workshops/{id}", get(handler::get_by_id))
        .route("/api/workshops/{id}/sessions", get(handler::list_sessions))
}
