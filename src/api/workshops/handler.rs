//! Workshop API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use crate::commerce::booking::{self, BookingInput, BookingOutcome};
use crate::core::ServerState;
use crate::db::models::{Reservation, Workshop, WorkshopSession};
use crate::db::repository::{reservation as reservation_repo, workshop as workshop_repo};
use crate::utils::{ApiResponse, AppError, AppResult, ok, ok_with_message};

pub async fn list(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<Vec<Workshop>>>> {
    let workshops = workshop_repo::list_workshops(&state.db, true).await?;
    Ok(ok(workshops))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Workshop>>> {
    let workshop = workshop_repo::find_workshop(&state.db, &id)
        .await?
        .filter(|w| w.is_active)
        .ok_or_else(|| AppError::not_found(format!("Workshop {id} not found")))?;
    Ok(ok(workshop))
}

/// Session with the derived remaining-spots count
#[derive(Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: WorkshopSession,
    pub remaining_spots: i32,
}

pub async fn list_sessions(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<SessionView>>>> {
    let sessions = workshop_repo::list_sessions(&state.db, &id).await?;
    let views = sessions
        .into_iter()
        .map(|session| SessionView {
            remaining_spots: session.remaining_spots(),
            session,
        })
        .collect();
    Ok(ok(views))
}

/// Book seats on a session (or join the waitlist when full)
pub async fn book(
    State(state): State<ServerState>,
    Json(input): Json<BookingInput>,
) -> AppResult<Json<ApiResponse<BookingOutcome>>> {
    let frontend_url = state.config.frontend_url()?;
    let gateway = state.gateway_for(input.provider);

    let outcome = booking::create_reservation(
        &state.db,
        gateway.as_deref(),
        &state.mailer,
        &frontend_url,
        input,
    )
    .await?;

    let message = if outcome.waitlisted {
        "Session full, reservation added to the waitlist"
    } else {
        "Reservation created"
    };
    Ok(ok_with_message(outcome, message))
}

pub async fn get_reservation(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let reservation = reservation_repo::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Reservation {id} not found")))?;
    Ok(ok(reservation))
}
