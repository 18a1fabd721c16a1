//! Payment provider webhooks
//!
//! Both endpoints must answer 2xx promptly (providers retry otherwise) and
//! tolerate duplicate delivery — idempotence lives in the reconciler's
//! guarded transitions. A request is rejected for a bad signature only when
//! production mode and a configured secret are both present.

mod square;
mod stripe;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/stripe-webhook", post(stripe::handle))
        .route("/api/square/webhook", post(square::handle))
}
