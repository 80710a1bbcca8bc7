use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Appointment, EntityKind};
use crate::store::BackingStore;

/// Outbound SMS contract. Delivery is fire-and-forget from the caller's
/// point of view: failures are logged, never propagated.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> anyhow::Result<()>;
}

/// Default gateway: writes the message to the log instead of a carrier.
/// Real delivery is an external service swapped in behind the trait.
pub struct SmsLog {
    sender: String,
}

impl SmsLog {
    pub fn new(sender: String) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl SmsGateway for SmsLog {
    async fn send(&self, to: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(from = %self.sender, %to, "sms: {body}");
        Ok(())
    }
}

fn format_schedule(schedule: DateTime<Utc>) -> String {
    schedule.format("%B %-d, %Y %-I:%M %p").to_string()
}

pub fn schedule_message(doctor_name: &str, schedule: DateTime<Utc>) -> String {
    format!(
        "Hi, it's CareTake. Your appointment is scheduled for {} with Dr. {}.",
        format_schedule(schedule),
        doctor_name
    )
}

pub fn cancellation_message(schedule: DateTime<Utc>, reason: &str) -> String {
    format!(
        "Hi, it's CareTake. We regret to inform you that your appointment for {} is cancelled. Reason: {}.",
        format_schedule(schedule),
        reason
    )
}

/// Notify the patient that their appointment was scheduled. Spawned off
/// the request path; any failure only shows up in the log.
pub fn send_schedule_sms(
    store: Arc<dyn BackingStore>,
    sms: Arc<dyn SmsGateway>,
    appointment: Appointment,
) {
    tokio::spawn(async move {
        if let Err(e) = deliver(store, sms, appointment, None).await {
            tracing::warn!("schedule sms delivery failed: {e}");
        }
    });
}

/// Notify the patient that their appointment was cancelled.
pub fn send_cancellation_sms(
    store: Arc<dyn BackingStore>,
    sms: Arc<dyn SmsGateway>,
    appointment: Appointment,
) {
    let reason = appointment
        .cancellation_reason
        .clone()
        .unwrap_or_else(|| "not specified".to_string());
    tokio::spawn(async move {
        if let Err(e) = deliver(store, sms, appointment, Some(reason)).await {
            tracing::warn!("cancellation sms delivery failed: {e}");
        }
    });
}

async fn deliver(
    store: Arc<dyn BackingStore>,
    sms: Arc<dyn SmsGateway>,
    appointment: Appointment,
    cancellation_reason: Option<String>,
) -> anyhow::Result<()> {
    let patient = store
        .get(EntityKind::Patient, appointment.patient_id)
        .await?
        .into_patient()
        .ok_or_else(|| anyhow::anyhow!("patient lookup returned a non-patient document"))?;

    let body = match cancellation_reason {
        Some(reason) => cancellation_message(appointment.schedule, &reason),
        None => {
            let doctor = store
                .get(EntityKind::Doctor, appointment.doctor_id)
                .await?
                .into_doctor()
                .ok_or_else(|| anyhow::anyhow!("doctor lookup returned a non-doctor document"))?;
            schedule_message(&doctor.name, appointment.schedule)
        }
    };

    sms.send(&patient.phone, &body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn schedule_message_names_doctor_and_time() {
        let schedule = Utc.with_ymd_and_hms(2025, 3, 7, 14, 30, 0).unwrap();
        let msg = schedule_message("Adams", schedule);
        assert_eq!(
            msg,
            "Hi, it's CareTake. Your appointment is scheduled for March 7, 2025 2:30 PM with Dr. Adams."
        );
    }

    #[test]
    fn cancellation_message_includes_reason() {
        let schedule = Utc.with_ymd_and_hms(2025, 3, 7, 9, 0, 0).unwrap();
        let msg = cancellation_message(schedule, "doctor unavailable");
        assert!(msg.contains("March 7, 2025 9:00 AM"));
        assert!(msg.contains("Reason: doctor unavailable."));
    }
}
