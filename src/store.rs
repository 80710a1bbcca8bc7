use async_trait::async_trait;
use uuid::Uuid;

use crate::bus::{ACTION_CREATE, ACTION_DELETE, ACTION_UPDATE, EventBus, RawEvent};
use crate::error::StoreError;
use crate::models::{Appointment, Doctor, Entity, EntityKind, Patient};
use crate::roster::RosterFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    CreatedAsc,
    CreatedDesc,
}

#[derive(Debug)]
pub struct Listing {
    pub total: usize,
    pub items: Vec<Entity>,
}

/// The document database behind the application.
///
/// Mutations return the full post-change document; the Postgres
/// implementation also emits that document on the event bus, which is
/// what feeds the live rosters.
#[async_trait]
pub trait BackingStore: Send + Sync {
    async fn list(
        &self,
        kind: EntityKind,
        filter: &RosterFilter,
        order: ListOrder,
    ) -> Result<Listing, StoreError>;

    async fn get(&self, kind: EntityKind, id: Uuid) -> Result<Entity, StoreError>;

    async fn create(&self, entity: Entity) -> Result<Entity, StoreError>;

    /// Full-document replace keyed by the entity's id.
    async fn update(&self, entity: Entity) -> Result<Entity, StoreError>;

    /// Removes the document and returns its last state.
    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<Entity, StoreError>;
}

/* ============================================================
   Postgres implementation
   ============================================================ */

const APPOINTMENT_COLS: &str = "appointment_id, patient_id, doctor_id, schedule, status, reason, note, cancellation_reason, created_at";

const DOCTOR_COLS: &str = "doctor_id, name, email, phone, gender, birth_date, address, profession, qualification, photo_url, license_url, created_at";

const PATIENT_COLS: &str = "patient_id, name, email, phone, gender, birth_date, address, occupation, emergency_contact_name, emergency_contact_number, insurance_provider, insurance_policy_number, allergies, current_medication, family_medical_history, past_medical_history, identification_type, identification_number, identification_url, privacy_consent, created_at";

pub struct PgStore {
    db: sqlx::PgPool,
    bus: EventBus,
}

impl PgStore {
    pub fn new(db: sqlx::PgPool, bus: EventBus) -> Self {
        Self { db, bus }
    }

    fn publish(&self, action: &str, entity: &Entity) {
        match serde_json::to_value(entity) {
            Ok(payload) => self.bus.publish(RawEvent::document(
                entity.kind().collection(),
                entity.id(),
                action,
                payload,
            )),
            Err(e) => tracing::warn!("change event payload encoding failed: {e}"),
        }
    }
}

fn store_error(collection: &'static str, e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StoreError::Malformed {
            collection,
            reason: e.to_string(),
        },
        other => StoreError::Unavailable(format!("db error: {other}")),
    }
}

fn order_sql(order: ListOrder) -> &'static str {
    match order {
        ListOrder::CreatedAsc => "ASC",
        ListOrder::CreatedDesc => "DESC",
    }
}

#[async_trait]
impl BackingStore for PgStore {
    async fn list(
        &self,
        kind: EntityKind,
        filter: &RosterFilter,
        order: ListOrder,
    ) -> Result<Listing, StoreError> {
        let items: Vec<Entity> = match kind {
            EntityKind::Appointment => {
                let dir = order_sql(order);
                let rows: Vec<Appointment> = match filter {
                    RosterFilter::All => {
                        sqlx::query_as(&format!(
                            "SELECT {APPOINTMENT_COLS} FROM appointment ORDER BY created_at {dir}"
                        ))
                        .fetch_all(&self.db)
                        .await
                    }
                    RosterFilter::Patient(patient_id) => {
                        sqlx::query_as(&format!(
                            "SELECT {APPOINTMENT_COLS} FROM appointment WHERE patient_id = $1 ORDER BY created_at {dir}"
                        ))
                        .bind(patient_id)
                        .fetch_all(&self.db)
                        .await
                    }
                    RosterFilter::Doctor(doctor_id) => {
                        sqlx::query_as(&format!(
                            "SELECT {APPOINTMENT_COLS} FROM appointment WHERE doctor_id = $1 ORDER BY created_at {dir}"
                        ))
                        .bind(doctor_id)
                        .fetch_all(&self.db)
                        .await
                    }
                }
                .map_err(|e| store_error(kind.collection(), e))?;
                rows.into_iter().map(Entity::Appointment).collect()
            }
            EntityKind::Doctor => {
                let rows: Vec<Doctor> = sqlx::query_as(&format!(
                    "SELECT {DOCTOR_COLS} FROM doctor ORDER BY created_at ASC"
                ))
                .fetch_all(&self.db)
                .await
                .map_err(|e| store_error(kind.collection(), e))?;
                rows.into_iter().map(Entity::Doctor).collect()
            }
            EntityKind::Patient => {
                let rows: Vec<Patient> = sqlx::query_as(&format!(
                    "SELECT {PATIENT_COLS} FROM patient ORDER BY created_at ASC"
                ))
                .fetch_all(&self.db)
                .await
                .map_err(|e| store_error(kind.collection(), e))?;
                rows.into_iter().map(Entity::Patient).collect()
            }
        };

        Ok(Listing {
            total: items.len(),
            items,
        })
    }

    async fn get(&self, kind: EntityKind, id: Uuid) -> Result<Entity, StoreError> {
        let entity = match kind {
            EntityKind::Appointment => sqlx::query_as::<_, Appointment>(&format!(
                "SELECT {APPOINTMENT_COLS} FROM appointment WHERE appointment_id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| store_error(kind.collection(), e))?
            .map(Entity::Appointment),
            EntityKind::Doctor => sqlx::query_as::<_, Doctor>(&format!(
                "SELECT {DOCTOR_COLS} FROM doctor WHERE doctor_id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| store_error(kind.collection(), e))?
            .map(Entity::Doctor),
            EntityKind::Patient => sqlx::query_as::<_, Patient>(&format!(
                "SELECT {PATIENT_COLS} FROM patient WHERE patient_id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| store_error(kind.collection(), e))?
            .map(Entity::Patient),
        };

        entity.ok_or(StoreError::NotFound {
            collection: kind.collection(),
            id,
        })
    }

    async fn create(&self, entity: Entity) -> Result<Entity, StoreError> {
        let kind = entity.kind();
        let created = match entity {
            Entity::Appointment(a) => {
                let row: Appointment = sqlx::query_as(&format!(
                    r#"
                    INSERT INTO appointment
                        (appointment_id, patient_id, doctor_id, schedule, status, reason, note, cancellation_reason, created_at)
                    VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
                    RETURNING {APPOINTMENT_COLS}
                    "#
                ))
                .bind(a.appointment_id)
                .bind(a.patient_id)
                .bind(a.doctor_id)
                .bind(a.schedule)
                .bind(a.status)
                .bind(&a.reason)
                .bind(&a.note)
                .bind(&a.cancellation_reason)
                .bind(a.created_at)
                .fetch_one(&self.db)
                .await
                .map_err(|e| store_error(kind.collection(), e))?;
                Entity::Appointment(row)
            }
            Entity::Doctor(d) => {
                let row: Doctor = sqlx::query_as(&format!(
                    r#"
                    INSERT INTO doctor
                        (doctor_id, name, email, phone, gender, birth_date, address, profession, qualification, photo_url, license_url, created_at)
                    VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
                    RETURNING {DOCTOR_COLS}
                    "#
                ))
                .bind(d.doctor_id)
                .bind(&d.name)
                .bind(&d.email)
                .bind(&d.phone)
                .bind(d.gender)
                .bind(d.birth_date)
                .bind(&d.address)
                .bind(&d.profession)
                .bind(&d.qualification)
                .bind(&d.photo_url)
                .bind(&d.license_url)
                .bind(d.created_at)
                .fetch_one(&self.db)
                .await
                .map_err(|e| store_error(kind.collection(), e))?;
                Entity::Doctor(row)
            }
            Entity::Patient(p) => {
                let row: Patient = sqlx::query_as(&format!(
                    r#"
                    INSERT INTO patient
                        (patient_id, name, email, phone, gender, birth_date, address, occupation,
                         emergency_contact_name, emergency_contact_number, insurance_provider,
                         insurance_policy_number, allergies, current_medication, family_medical_history,
                         past_medical_history, identification_type, identification_number,
                         identification_url, privacy_consent, created_at)
                    VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21)
                    RETURNING {PATIENT_COLS}
                    "#
                ))
                .bind(p.patient_id)
                .bind(&p.name)
                .bind(&p.email)
                .bind(&p.phone)
                .bind(p.gender)
                .bind(p.birth_date)
                .bind(&p.address)
                .bind(&p.occupation)
                .bind(&p.emergency_contact_name)
                .bind(&p.emergency_contact_number)
                .bind(&p.insurance_provider)
                .bind(&p.insurance_policy_number)
                .bind(&p.allergies)
                .bind(&p.current_medication)
                .bind(&p.family_medical_history)
                .bind(&p.past_medical_history)
                .bind(&p.identification_type)
                .bind(&p.identification_number)
                .bind(&p.identification_url)
                .bind(p.privacy_consent)
                .bind(p.created_at)
                .fetch_one(&self.db)
                .await
                .map_err(|e| store_error(kind.collection(), e))?;
                Entity::Patient(row)
            }
        };

        self.publish(ACTION_CREATE, &created);
        Ok(created)
    }

    async fn update(&self, entity: Entity) -> Result<Entity, StoreError> {
        let kind = entity.kind();
        let id = entity.id();

        let updated = match entity {
            Entity::Appointment(a) => sqlx::query_as::<_, Appointment>(&format!(
                r#"
                UPDATE appointment
                SET patient_id = $2,
                    doctor_id = $3,
                    schedule = $4,
                    status = $5,
                    reason = $6,
                    note = $7,
                    cancellation_reason = $8
                WHERE appointment_id = $1
                RETURNING {APPOINTMENT_COLS}
                "#
            ))
            .bind(a.appointment_id)
            .bind(a.patient_id)
            .bind(a.doctor_id)
            .bind(a.schedule)
            .bind(a.status)
            .bind(&a.reason)
            .bind(&a.note)
            .bind(&a.cancellation_reason)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| store_error(kind.collection(), e))?
            .map(Entity::Appointment),
            Entity::Doctor(d) => sqlx::query_as::<_, Doctor>(&format!(
                r#"
                UPDATE doctor
                SET name = $2,
                    email = $3,
                    phone = $4,
                    gender = $5,
                    birth_date = $6,
                    address = $7,
                    profession = $8,
                    qualification = $9,
                    photo_url = $10,
                    license_url = $11
                WHERE doctor_id = $1
                RETURNING {DOCTOR_COLS}
                "#
            ))
            .bind(d.doctor_id)
            .bind(&d.name)
            .bind(&d.email)
            .bind(&d.phone)
            .bind(d.gender)
            .bind(d.birth_date)
            .bind(&d.address)
            .bind(&d.profession)
            .bind(&d.qualification)
            .bind(&d.photo_url)
            .bind(&d.license_url)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| store_error(kind.collection(), e))?
            .map(Entity::Doctor),
            Entity::Patient(p) => sqlx::query_as::<_, Patient>(&format!(
                r#"
                UPDATE patient
                SET name = $2,
                    email = $3,
                    phone = $4,
                    gender = $5,
                    birth_date = $6,
                    address = $7,
                    occupation = $8,
                    emergency_contact_name = $9,
                    emergency_contact_number = $10,
                    insurance_provider = $11,
                    insurance_policy_number = $12,
                    allergies = $13,
                    current_medication = $14,
                    family_medical_history = $15,
                    past_medical_history = $16,
                    identification_type = $17,
                    identification_number = $18,
                    identification_url = $19,
                    privacy_consent = $20
                WHERE patient_id = $1
                RETURNING {PATIENT_COLS}
                "#
            ))
            .bind(p.patient_id)
            .bind(&p.name)
            .bind(&p.email)
            .bind(&p.phone)
            .bind(p.gender)
            .bind(p.birth_date)
            .bind(&p.address)
            .bind(&p.occupation)
            .bind(&p.emergency_contact_name)
            .bind(&p.emergency_contact_number)
            .bind(&p.insurance_provider)
            .bind(&p.insurance_policy_number)
            .bind(&p.allergies)
            .bind(&p.current_medication)
            .bind(&p.family_medical_history)
            .bind(&p.past_medical_history)
            .bind(&p.identification_type)
            .bind(&p.identification_number)
            .bind(&p.identification_url)
            .bind(p.privacy_consent)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| store_error(kind.collection(), e))?
            .map(Entity::Patient),
        };

        let updated = updated.ok_or(StoreError::NotFound {
            collection: kind.collection(),
            id,
        })?;

        self.publish(ACTION_UPDATE, &updated);
        Ok(updated)
    }

    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<Entity, StoreError> {
        let deleted = match kind {
            EntityKind::Appointment => sqlx::query_as::<_, Appointment>(&format!(
                "DELETE FROM appointment WHERE appointment_id = $1 RETURNING {APPOINTMENT_COLS}"
            ))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| store_error(kind.collection(), e))?
            .map(Entity::Appointment),
            EntityKind::Doctor => sqlx::query_as::<_, Doctor>(&format!(
                "DELETE FROM doctor WHERE doctor_id = $1 RETURNING {DOCTOR_COLS}"
            ))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| store_error(kind.collection(), e))?
            .map(Entity::Doctor),
            EntityKind::Patient => sqlx::query_as::<_, Patient>(&format!(
                "DELETE FROM patient WHERE patient_id = $1 RETURNING {PATIENT_COLS}"
            ))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| store_error(kind.collection(), e))?
            .map(Entity::Patient),
        };

        let deleted = deleted.ok_or(StoreError::NotFound {
            collection: kind.collection(),
            id,
        })?;

        self.publish(ACTION_DELETE, &deleted);
        Ok(deleted)
    }
}

/* ============================================================
   In-memory fake for tests
   ============================================================ */
