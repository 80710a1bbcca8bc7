// src/routes/appointment_routes.rs

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ApiError, StoreError},
    models::{ApiOk, Appointment, AppointmentStatus, AppState, Entity, EntityKind},
    notify,
    roster::{RosterFilter, snapshot::SnapshotLoader},
    store::BackingStore,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment))
        .route("/appointments/recent", get(list_recent_appointments))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .route(
            "/appointments/{appointment_id}/schedule",
            post(schedule_appointment),
        )
        .route(
            "/appointments/{appointment_id}/cancel",
            post(cancel_appointment),
        )
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub schedule: DateTime<Utc>,
    pub reason: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleAppointmentRequest {
    pub schedule: Option<DateTime<Utc>>,
    pub doctor_id: Option<Uuid>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelAppointmentRequest {
    pub cancellation_reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RecentAppointmentsDto {
    pub total_count: usize,
    pub scheduled_count: usize,
    pub pending_count: usize,
    pub cancelled_count: usize,
    pub documents: Vec<Appointment>,
}

fn expect_appointment(entity: Entity) -> Result<Appointment, ApiError> {
    entity
        .into_appointment()
        .ok_or_else(|| ApiError::Internal("store returned a non-appointment document".into()))
}

/* ============================================================
   POST /appointments (patient requests a slot)
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    if req.reason.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "reason must not be empty".into(),
        ));
    }

    // referenced documents must exist before we accept the request
    state
        .store
        .get(EntityKind::Patient, req.patient_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => {
                ApiError::BadRequest("UNKNOWN_PATIENT", "patient does not exist".into())
            }
            other => other.into(),
        })?;
    state
        .store
        .get(EntityKind::Doctor, req.doctor_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => {
                ApiError::BadRequest("UNKNOWN_DOCTOR", "doctor does not exist".into())
            }
            other => other.into(),
        })?;

    let appointment = Appointment {
        appointment_id: Uuid::new_v4(),
        patient_id: req.patient_id,
        doctor_id: req.doctor_id,
        schedule: req.schedule,
        status: AppointmentStatus::Pending,
        reason: req.reason,
        note: req.note,
        cancellation_reason: None,
        created_at: Utc::now(),
    };

    let created = state
        .store
        .create(Entity::Appointment(appointment))
        .await?;

    Ok(Json(ApiOk {
        data: expect_appointment(created)?,
    }))
}

/* ============================================================
   GET /appointments/recent
   ============================================================ */

pub async fn list_recent_appointments(
    State(state): State<AppState>,
    Query(q): Query<RecentQuery>,
) -> Result<Json<ApiOk<RecentAppointmentsDto>>, ApiError> {
    let filter = match (q.patient_id, q.doctor_id) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "pass either patient_id or doctor_id, not both".into(),
            ));
        }
        (Some(patient_id), None) => RosterFilter::Patient(patient_id),
        (None, Some(doctor_id)) => RosterFilter::Doctor(doctor_id),
        (None, None) => RosterFilter::All,
    };

    let roster = SnapshotLoader::new(state.store.clone())
        .load(EntityKind::Appointment, filter)
        .await?;

    Ok(Json(ApiOk {
        data: RecentAppointmentsDto {
            total_count: roster.total_count,
            scheduled_count: roster.scheduled_count,
            pending_count: roster.pending_count,
            cancelled_count: roster.cancelled_count,
            documents: roster
                .items
                .into_iter()
                .filter_map(Entity::into_appointment)
                .collect(),
        },
    }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let entity = state
        .store
        .get(EntityKind::Appointment, appointment_id)
        .await?;

    Ok(Json(ApiOk {
        data: expect_appointment(entity)?,
    }))
}

/* ============================================================
   POST /appointments/{id}/schedule (admin triage)
   ============================================================ */

pub async fn schedule_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<ScheduleAppointmentRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let entity = state
        .store
        .get(EntityKind::Appointment, appointment_id)
        .await?;
    let mut appointment = expect_appointment(entity)?;

    if let Some(schedule) = req.schedule {
        appointment.schedule = schedule;
    }
    if let Some(doctor_id) = req.doctor_id {
        state
            .store
            .get(EntityKind::Doctor, doctor_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => {
                    ApiError::BadRequest("UNKNOWN_DOCTOR", "doctor does not exist".into())
                }
                other => other.into(),
            })?;
        appointment.doctor_id = doctor_id;
    }
    if let Some(note) = req.note {
        appointment.note = Some(note);
    }
    appointment.status = AppointmentStatus::Scheduled;

    let updated = state
        .store
        .update(Entity::Appointment(appointment))
        .await?;
    let updated = expect_appointment(updated)?;

    notify::send_schedule_sms(state.store.clone(), state.sms.clone(), updated.clone());

    Ok(Json(ApiOk { data: updated }))
}

/* ============================================================
   POST /appointments/{id}/cancel
   ============================================================ */

pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<CancelAppointmentRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    if req.cancellation_reason.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "cancellation_reason must not be empty".into(),
        ));
    }

    let entity = state
        .store
        .get(EntityKind::Appointment, appointment_id)
        .await?;
    let mut appointment = expect_appointment(entity)?;

    appointment.status = AppointmentStatus::Cancelled;
    appointment.cancellation_reason = Some(req.cancellation_reason);

    let updated = state
        .store
        .update(Entity::Appointment(appointment))
        .await?;
    let updated = expect_appointment(updated)?;

    notify::send_cancellation_sms(state.store.clone(), state.sms.clone(), updated.clone());

    Ok(Json(ApiOk { data: updated }))
}

/* ============================================================
   Tests
   ============================================================ */
