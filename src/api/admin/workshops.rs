//! Admin workshop/session/reservation handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use super::orders::{ListQuery, RefundRequest};
use crate::commerce::money;
use crate::commerce::refund::{self, RefundMode};
use crate::core::ServerState;
use crate::db::models::{
    Reservation, ReservationStatus, SessionStatus, Workshop, WorkshopSession,
};
use crate::db::repository::{reservation as reservation_repo, workshop as workshop_repo};
use crate::utils::{ApiResponse, AppError, AppResult, now_millis, ok, ok_with_message};

#[derive(Debug, Deserialize)]
pub struct CreateWorkshopRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_minutes: Option<i32>,
    pub image_url: Option<String>,
}

pub async fn create_workshop(
    State(state): State<ServerState>,
    Json(request): Json<CreateWorkshopRequest>,
) -> AppResult<Json<ApiResponse<Workshop>>> {
    if request.name.trim().is_empty() {
        return Err(AppError::validation("Workshop name is required"));
    }
    money::validate_amount(request.price, "price")?;

    let now = now_millis();
    let workshop = Workshop {
        id: Uuid::new_v4().to_string(),
        name: request.name,
        description: request.description,
        price: request.price,
        duration_minutes: request.duration_minutes,
        image_url: request.image_url,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    workshop_repo::insert_workshop(&state.db, &workshop).await?;
    Ok(ok_with_message(workshop, "Workshop created"))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Unix millis
    pub starts_at: i64,
    pub capacity: i32,
}

pub async fn create_session(
    State(state): State<ServerState>,
    Path(workshop_id): Path<String>,
    Json(request): Json<CreateSessionRequest>,
) -> AppResult<Json<ApiResponse<WorkshopSession>>> {
    if request.capacity <= 0 {
        return Err(AppError::validation("capacity must be positive"));
    }
    workshop_repo::find_workshop(&state.db, &workshop_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Workshop {workshop_id} not found")))?;

    let now = now_millis();
    let session = WorkshopSession {
        id: Uuid::new_v4().to_string(),
        workshop_id,
        starts_at: request.starts_at,
        capacity: request.capacity,
        booked_count: 0,
        status: SessionStatus::Scheduled,
        created_at: now,
        updated_at: now,
    };
    workshop_repo::insert_session(&state.db, &session).await?;
    Ok(ok_with_message(session, "Session created"))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCapacityRequest {
    pub capacity: i32,
}

pub async fn update_capacity(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
    Json(request): Json<UpdateCapacityRequest>,
) -> AppResult<Json<ApiResponse<WorkshopSession>>> {
    if request.capacity <= 0 {
        return Err(AppError::validation("capacity must be positive"));
    }
    workshop_repo::find_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Session {session_id} not found")))?;

    let updated = workshop_repo::update_capacity(&state.db, &session_id, request.capacity).await?;
    if !updated {
        return Err(AppError::state_conflict(
            "Capacity cannot drop below the current booked count",
        ));
    }

    let session = workshop_repo::find_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| AppError::internal("session vanished after capacity update"))?;
    Ok(ok(session))
}

pub async fn list_reservations(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<Reservation>>>> {
    let reservations = reservation_repo::list(&state.db, query.limit, query.offset).await?;
    Ok(ok(reservations))
}

pub async fn list_for_session(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<Reservation>>>> {
    let reservations = reservation_repo::list_for_session(&state.db, &session_id).await?;
    Ok(ok(reservations))
}

pub async fn cancel_reservation(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    run_refund(&state, &id, request.reason, RefundMode::Cancel).await
}

pub async fn refund_reservation(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    run_refund(&state, &id, request.reason, RefundMode::Refund).await
}

async fn run_refund(
    state: &ServerState,
    id: &str,
    reason: Option<String>,
    mode: RefundMode,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let reservation = reservation_repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Reservation {id} not found")))?;
    let gateway = state.gateway_for(reservation.provider);

    let reservation = refund::refund_reservation(
        &state.db,
        gateway.as_deref(),
        &state.mailer,
        id,
        reason.as_deref(),
        mode,
    )
    .await?;

    Ok(ok_with_message(reservation, "Refund orchestration complete"))
}

/// Waitlist promotion: grab the seats, then confirm.
/// A waitlist entry never auto-charges — payment is settled offline.
pub async fn promote_reservation(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let reservation = reservation_repo::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Reservation {id} not found")))?;

    if reservation.status != ReservationStatus::Waitlist {
        return Err(AppError::state_conflict(
            "Only waitlisted reservations can be promoted",
        ));
    }

    let held =
        workshop_repo::try_reserve_seats(&state.db, &reservation.session_id, reservation.quantity)
            .await?;
    if !held {
        return Err(AppError::validation(
            "Not enough remaining spots to promote this reservation",
        ));
    }

    reservation_repo::promote(&state.db, &id).await?;
    let reservation = reservation_repo::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::internal("reservation vanished after promotion"))?;
    Ok(ok_with_message(reservation, "Reservation promoted"))
}
