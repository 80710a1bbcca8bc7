// src/routes/doctor_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{ApiOk, AppState, Doctor, Entity, EntityKind, Gender, OkData, OkResponse},
    roster::RosterFilter,
    roster::snapshot::SnapshotLoader,
    store::BackingStore,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", post(register_doctor).get(list_doctors))
        .route(
            "/doctors/{doctor_id}",
            get(get_doctor).patch(update_doctor).delete(delete_doctor),
        )
}

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Called only when the field is present (even if it's `null`):
    // null => Some(None), value => Some(Some(value))
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct RegisterDoctorRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
    pub address: String,
    pub profession: String,
    pub qualification: String,
    // already-uploaded storage references; the upload itself happens elsewhere
    pub photo_url: Option<String>,
    pub license_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub profession: Option<String>,
    pub qualification: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub photo_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub license_url: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct DoctorListDto {
    pub total_count: usize,
    pub documents: Vec<Doctor>,
}

fn expect_doctor(entity: Entity) -> Result<Doctor, ApiError> {
    entity
        .into_doctor()
        .ok_or_else(|| ApiError::Internal("store returned a non-doctor document".into()))
}

/* ============================================================
   Handlers
   ============================================================ */

pub async fn register_doctor(
    State(state): State<AppState>,
    Json(req): Json<RegisterDoctorRequest>,
) -> Result<Json<ApiOk<Doctor>>, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "name is required".into(),
        ));
    }
    if req.profession.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "profession is required".into(),
        ));
    }

    let doctor = Doctor {
        doctor_id: Uuid::new_v4(),
        name: name.to_string(),
        email: req.email,
        phone: req.phone,
        gender: req.gender,
        birth_date: req.birth_date,
        address: req.address,
        profession: req.profession,
        qualification: req.qualification,
        photo_url: req.photo_url,
        license_url: req.license_url,
        created_at: Utc::now(),
    };

    let created = state.store.create(Entity::Doctor(doctor)).await?;

    Ok(Json(ApiOk {
        data: expect_doctor(created)?,
    }))
}

pub async fn list_doctors(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<DoctorListDto>>, ApiError> {
    let roster = SnapshotLoader::new(state.store.clone())
        .load(EntityKind::Doctor, RosterFilter::All)
        .await?;

    Ok(Json(ApiOk {
        data: DoctorListDto {
            total_count: roster.total_count,
            documents: roster
                .items
                .into_iter()
                .filter_map(Entity::into_doctor)
                .collect(),
        },
    }))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<ApiOk<Doctor>>, ApiError> {
    let entity = state.store.get(EntityKind::Doctor, doctor_id).await?;
    Ok(Json(ApiOk {
        data: expect_doctor(entity)?,
    }))
}

pub async fn update_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Json(req): Json<UpdateDoctorRequest>,
) -> Result<Json<ApiOk<Doctor>>, ApiError> {
    let entity = state.store.get(EntityKind::Doctor, doctor_id).await?;
    let mut doctor = expect_doctor(entity)?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "name must not be empty".into(),
            ));
        }
        doctor.name = name;
    }
    if let Some(email) = req.email {
        doctor.email = email;
    }
    if let Some(phone) = req.phone {
        doctor.phone = phone;
    }
    if let Some(gender) = req.gender {
        doctor.gender = gender;
    }
    if let Some(birth_date) = req.birth_date {
        doctor.birth_date = birth_date;
    }
    if let Some(address) = req.address {
        doctor.address = address;
    }
    if let Some(profession) = req.profession {
        doctor.profession = profession;
    }
    if let Some(qualification) = req.qualification {
        doctor.qualification = qualification;
    }
    if let Some(photo_url) = req.photo_url {
        doctor.photo_url = photo_url;
    }
    if let Some(license_url) = req.license_url {
        doctor.license_url = license_url;
    }

    let updated = state.store.update(Entity::Doctor(doctor)).await?;

    Ok(Json(ApiOk {
        data: expect_doctor(updated)?,
    }))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    state.store.delete(EntityKind::Doctor, doctor_id).await?;

    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}

/* ============================================================
   Tests
   ============================================================ */
