use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::notify::SmsGateway;
use crate::roster::live::LiveRoster;
use crate::store::BackingStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BackingStore>,
    pub sms: Arc<dyn SmsGateway>,
    pub appointment_roster: Arc<LiveRoster>,
    pub doctor_roster: Arc<LiveRoster>,
}

/* -------------------------
   Shared API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/* -------------------------
   Enums (stored as smallint)
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending = 0,
    Scheduled = 1,
    Cancelled = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male = 0,
    Female = 1,
    Other = 2,
}

/* -------------------------
   Documents
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub schedule: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: String,
    pub note: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Doctor {
    pub doctor_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
    pub address: String,
    pub profession: String,
    pub qualification: String,
    pub photo_url: Option<String>,
    pub license_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Patient {
    pub patient_id: Uuid,
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
    pub identification_url: Option<String>,
    pub privacy_consent: bool,
    pub created_at: DateTime<Utc>,
}

/* -------------------------
   Entity (tagged union)
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Appointment,
    Doctor,
    Patient,
}

impl EntityKind {
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Appointment => "appointments",
            EntityKind::Doctor => "doctors",
            EntityKind::Patient => "patients",
        }
    }
}

/// One document from any of the three collections.
///
/// Serializes as the bare document, the same shape the change-event
/// payloads and the REST responses use.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Appointment(Appointment),
    Doctor(Doctor),
    Patient(Patient),
}

impl Entity {
    pub fn id(&self) -> Uuid {
        match self {
            Entity::Appointment(a) => a.appointment_id,
            Entity::Doctor(d) => d.doctor_id,
            Entity::Patient(p) => p.patient_id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Appointment(_) => EntityKind::Appointment,
            Entity::Doctor(_) => EntityKind::Doctor,
            Entity::Patient(_) => EntityKind::Patient,
        }
    }

    pub fn as_appointment(&self) -> Option<&Appointment> {
        match self {
            Entity::Appointment(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_appointment(self) -> Option<Appointment> {
        match self {
            Entity::Appointment(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_doctor(self) -> Option<Doctor> {
        match self {
            Entity::Doctor(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_patient(self) -> Option<Patient> {
        match self {
            Entity::Patient(p) => Some(p),
            _ => None,
        }
    }
}
