// src/routes/patient_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{ApiOk, AppState, Entity, EntityKind, Gender, Patient},
    roster::RosterFilter,
    roster::snapshot::SnapshotLoader,
    store::BackingStore,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", post(register_patient).get(list_patients))
        .route(
            "/patients/{patient_id}",
            get(get_patient).patch(update_patient),
        )
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct RegisterPatientRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
    pub address: String,
    pub occupation: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_number: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_policy_number: Option<String>,
    pub allergies: Option<String>,
    pub current_medication: Option<String>,
    pub family_medical_history: Option<String>,
    pub past_medical_history: Option<String>,
    pub identification_type: Option<String>,
    pub identification_number: Option<String>,
    // storage reference for the uploaded identification document
    pub identification_url: Option<String>,
    pub privacy_consent: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_number: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_policy_number: Option<String>,
    pub allergies: Option<String>,
    pub current_medication: Option<String>,
    pub family_medical_history: Option<String>,
    pub past_medical_history: Option<String>,
    pub identification_type: Option<String>,
    pub identification_number: Option<String>,
    pub identification_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PatientListDto {
    pub total_count: usize,
    pub documents: Vec<Patient>,
}

fn expect_patient(entity: Entity) -> Result<Patient, ApiError> {
    entity
        .into_patient()
        .ok_or_else(|| ApiError::Internal("store returned a non-patient document".into()))
}

/* ============================================================
   Handlers
   ============================================================ */

pub async fn register_patient(
    State(state): State<AppState>,
    Json(req): Json<RegisterPatientRequest>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "name is required".into(),
        ));
    }
    if !req.privacy_consent {
        return Err(ApiError::BadRequest(
            "CONSENT_REQUIRED",
            "privacy consent is required to register".into(),
        ));
    }

    let patient = Patient {
        patient_id: Uuid::new_v4(),
        name: name.to_string(),
        email: req.email,
        phone: req.phone,
        gender: req.gender,
        birth_date: req.birth_date,
        address: req.address,
        occupation: req.occupation,
        emergency_contact_name: req.emergency_contact_name,
        emergency_contact_number: req.emergency_contact_number,
        insurance_provider: req.insurance_provider,
        insurance_policy_number: req.insurance_policy_number,
        allergies: req.allergies,
        current_medication: req.current_medication,
        family_medical_history: req.family_medical_history,
        past_medical_history: req.past_medical_history,
        identification_type: req.identification_type,
        identification_number: req.identification_number,
        identification_url: req.identification_url,
        privacy_consent: req.privacy_consent,
        created_at: Utc::now(),
    };

    let created = state.store.create(Entity::Patient(patient)).await?;

    Ok(Json(ApiOk {
        data: expect_patient(created)?,
    }))
}

pub async fn list_patients(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<PatientListDto>>, ApiError> {
    let roster = SnapshotLoader::new(state.store.clone())
        .load(EntityKind::Patient, RosterFilter::All)
        .await?;

    Ok(Json(ApiOk {
        data: PatientListDto {
            total_count: roster.total_count,
            documents: roster
                .items
                .into_iter()
                .filter_map(Entity::into_patient)
                .collect(),
        },
    }))
}

pub async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let entity = state.store.get(EntityKind::Patient, patient_id).await?;
    Ok(Json(ApiOk {
        data: expect_patient(entity)?,
    }))
}

pub async fn update_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<ApiOk<Patient>>, ApiError> {
    let entity = state.store.get(EntityKind::Patient, patient_id).await?;
    let mut patient = expect_patient(entity)?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "name must not be empty".into(),
            ));
        }
        patient.name = name;
    }
    if let Some(email) = req.email {
        patient.email = email;
    }
    if let Some(phone) = req.phone {
        patient.phone = phone;
    }
    if let Some(gender) = req.gender {
        patient.gender = gender;
    }
    if let Some(birth_date) = req.birth_date {
        patient.birth_date = birth_date;
    }
    if let Some(address) = req.address {
        patient.address = address;
    }
    if let Some(occupation) = req.occupation {
        patient.occupation = Some(occupation);
    }
    if let Some(emergency_contact_name) = req.emergency_contact_name {
        patient.emergency_contact_name = Some(emergency_contact_name);
    }
    if let Some(emergency_contact_number) = req.emergency_contact_number {
        patient.emergency_contact_number = Some(emergency_contact_number);
    }
    if let Some(insurance_provider) = req.insurance_provider {
        patient.insurance_provider = Some(insurance_provider);
    }
    if let Some(insurance_policy_number) = req.insurance_policy_number {
        patient.insurance_policy_number = Some(insurance_policy_number);
    }
    if let Some(allergies) = req.allergies {
        patient.allergies = Some(allergies);
    }
    if let Some(current_medication) = req.current_medication {
        patient.current_medication = Some(current_medication);
    }
    if let Some(family_medical_history) = req.family_medical_history {
        patient.family_medical_history = Some(family_medical_history);
    }
    if let Some(past_medical_history) = req.past_medical_history {
        patient.past_medical_history = Some(past_medical_history);
    }
    if let Some(identification_type) = req.identification_type {
        patient.identification_type = Some(identification_type);
    }
    if let Some(identification_number) = req.identification_number {
        patient.identification_number = Some(identification_number);
    }
    if let Some(identification_url) = req.identification_url {
        patient.identification_url = Some(identification_url);
    }

    let updated = state.store.update(Entity::Patient(patient)).await?;

    Ok(Json(ApiOk {
        data: expect_patient(updated)?,
    }))
}
