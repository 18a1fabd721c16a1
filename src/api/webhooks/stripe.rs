//! Stripe webhook endpoint

use axum::{Json, extract::State};
use http::HeaderMap;
use serde_json::{Value, json};

use crate::commerce::reconcile;
use crate::core::ServerState;
use crate::payments::stripe;
use crate::utils::{ApiResponse, AppError, AppResult, ok};

pub async fn handle(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<Json<ApiResponse<Value>>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    // Enforcement requires production AND a configured secret; anything
    // else logs and continues (local development posture).
    match (&state.config.stripe_webhook_secret, signature) {
        (Some(secret), Some(header)) => {
            if !stripe::verify_signature(body.as_bytes(), header, secret) {
                if state.config.is_production() {
                    tracing::warn!("Stripe webhook signature rejected");
                    return Err(AppError::Unauthorized);
                }
                tracing::warn!("Stripe webhook signature invalid (non-production, continuing)");
            }
        }
        (Some(_), None) => {
            if state.config.is_production() {
                tracing::warn!("Stripe webhook without signature header rejected");
                return Err(AppError::Unauthorized);
            }
            tracing::warn!("Stripe webhook missing signature header (non-production, continuing)");
        }
        (None, _) => {
            tracing::debug!("STRIPE_WEBHOOK_SECRET not configured, skipping verification");
        }
    }

    let payload: Value = serde_json::from_str(&body)
        .map_err(|e| AppError::validation(format!("Invalid webhook payload: {e}")))?;

    if let Some(event) = stripe::parse_event(&payload) {
        let outcome = reconcile::reconcile(&state.db, &state.mailer, &event).await?;
        tracing::debug!(outcome = ?outcome, "Stripe webhook reconciled");
    }

    Ok(ok(json!({ "received": true })))
}
