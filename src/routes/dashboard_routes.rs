// src/routes/dashboard_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{ApiOk, AppState, Appointment, Doctor, Entity, EntityKind},
    roster::classify::{DerivedLabel, classify},
    roster::snapshot::SnapshotLoader,
    roster::{Roster, RosterFilter},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin_dashboard))
        .route("/dashboard/doctors", get(doctor_directory))
        .route("/dashboard/patients/{patient_id}", get(patient_dashboard))
        .route("/dashboard/doctors/{doctor_id}", get(doctor_dashboard))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct AppointmentEntry {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub label: DerivedLabel,
}

#[derive(Debug, Serialize)]
pub struct AppointmentDashboardDto {
    /// false while the first snapshot is still loading (or failed)
    pub live: bool,
    pub total_count: usize,
    pub scheduled_count: usize,
    pub pending_count: usize,
    pub cancelled_count: usize,
    pub documents: Vec<AppointmentEntry>,
}

#[derive(Debug, Serialize)]
pub struct DoctorDirectoryDto {
    pub live: bool,
    pub total_count: usize,
    pub documents: Vec<Doctor>,
}

fn appointment_dashboard(roster: Roster, live: bool) -> AppointmentDashboardDto {
    let labels = classify(&roster, Utc::now());
    AppointmentDashboardDto {
        live,
        total_count: roster.total_count,
        scheduled_count: roster.scheduled_count,
        pending_count: roster.pending_count,
        cancelled_count: roster.cancelled_count,
        documents: roster
            .items
            .into_iter()
            .filter_map(Entity::into_appointment)
            .map(|appointment| {
                let label = labels
                    .get(&appointment.appointment_id)
                    .copied()
                    .unwrap_or(DerivedLabel::Past);
                AppointmentEntry { appointment, label }
            })
            .collect(),
    }
}

/* ============================================================
   Handlers
   ============================================================ */

/// Admin view: the process-lifetime live roster of all appointments.
pub async fn admin_dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<AppointmentDashboardDto>>, ApiError> {
    let live = state.appointment_roster.is_live();
    let roster = state.appointment_roster.snapshot();
    Ok(Json(ApiOk {
        data: appointment_dashboard(roster, live),
    }))
}

/// Live doctor directory shown on the admin screens.
pub async fn doctor_directory(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<DoctorDirectoryDto>>, ApiError> {
    let live = state.doctor_roster.is_live();
    let roster = state.doctor_roster.snapshot();
    Ok(Json(ApiOk {
        data: DoctorDirectoryDto {
            live,
            total_count: roster.total_count,
            documents: roster
                .items
                .into_iter()
                .filter_map(Entity::into_doctor)
                .collect(),
        },
    }))
}

/// One patient's appointments, loaded per request.
pub async fn patient_dashboard(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDashboardDto>>, ApiError> {
    let roster = SnapshotLoader::new(state.store.clone())
        .load(EntityKind::Appointment, RosterFilter::Patient(patient_id))
        .await?;
    Ok(Json(ApiOk {
        data: appointment_dashboard(roster, true),
    }))
}

/// One doctor's appointments, loaded per request.
pub async fn doctor_dashboard(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDashboardDto>>, ApiError> {
    let roster = SnapshotLoader::new(state.store.clone())
        .load(EntityKind::Appointment, RosterFilter::Doctor(doctor_id))
        .await?;
    Ok(Json(ApiOk {
        data: appointment_dashboard(roster, true),
    }))
}

/* ============================================================
   Tests
   ============================================================ */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use crate::roster::reconcile::test_fixtures::{appointment_for, uid};
    use chrono::Duration;

    #[test]
    fn dashboard_entries_carry_labels_in_roster_order() {
        let now = Utc::now();
        let mut roster = Roster::new(EntityKind::Appointment, RosterFilter::All);
        roster.items = vec![
            appointment_for("a2", "p1", AppointmentStatus::Pending, now + Duration::days(3)),
            appointment_for("a1", "p1", AppointmentStatus::Scheduled, now + Duration::days(1)),
        ];
        roster.recount();

        let dto = appointment_dashboard(roster, true);

        assert!(dto.live);
        assert_eq!(dto.total_count, 2);
        assert_eq!(dto.documents[0].appointment.appointment_id, uid("a2"));
        assert_eq!(dto.documents[0].label, DerivedLabel::Latest);
        assert_eq!(dto.documents[1].label, DerivedLabel::Scheduled);
    }
}
