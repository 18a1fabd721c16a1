//! Admin back-office API (JWT, admin role required)

mod gift_cards;
mod orders;
mod products;
mod workshops;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth;
use crate::core::ServerState;

pub fn router(state: &ServerState) -> Router<ServerState> {
    Router::new()
        .nest("/api/admin", routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ))
}

fn routes() -> Router<ServerState> {
    Router::new()
        // Orders
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::get_by_id))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/orders/{id}/cancel", post(orders::cancel))
        .route("/orders/{id}/refund", post(orders::refund))
        // Workshops and sessions
        .route("/workshops", post(workshops::create_workshop))
        .route("/workshops/{id}/sessions", post(workshops::create_session))
        .route("/sessions/{id}/capacity", put(workshops::update_capacity))
        .route("/sessions/{id}/reservations", get(workshops::list_for_session))
        // Reservations
        .route("/reservations", get(workshops::list_reservations))
        .route("/reservations/{id}/cancel", post(workshops::cancel_reservation))
        .route("/reservations/{id}/refund", post(workshops::refund_reservation))
        .route("/reservations/{id}/promote", post(workshops::promote_reservation))
        // Gift cards
        .route("/gift-cards", get(gift_cards::list).post(gift_cards::create))
        // Products
        .route("/products", get(products::list).post(products::create))
        .route("/products/{id}", put(products::update))
        // Manual reconciliation queue (failed refund steps)
        .route("/refunds/failed", get(orders::list_failed_refund_steps))
}
