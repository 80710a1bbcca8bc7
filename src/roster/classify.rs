use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::AppointmentStatus;
use crate::roster::Roster;

/// Render-time label for an appointment. Never stored; recomputed from
/// the roster and the clock on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DerivedLabel {
    #[serde(rename = "Latest Appt.")]
    Latest,
    #[serde(rename = "Scheduled Appt.")]
    Scheduled,
    #[serde(rename = "New Appt.")]
    New,
    #[serde(rename = "Past Appt.")]
    Past,
}

/// Label every appointment in the roster.
///
/// An appointment is upcoming when its schedule is strictly after `now`.
/// The chronologically last upcoming appointment of each patient is
/// `Latest`; other upcoming ones are `Scheduled` or `New` depending on
/// their status, and everything else is `Past`. When two upcoming
/// appointments of one patient share a schedule timestamp, the one that
/// appears first in the roster wins `Latest`.
pub fn classify(roster: &Roster, now: DateTime<Utc>) -> HashMap<Uuid, DerivedLabel> {
    // patient -> (appointment, schedule) of their last upcoming appointment
    let mut latest: HashMap<Uuid, (Uuid, DateTime<Utc>)> = HashMap::new();
    for item in &roster.items {
        let Some(a) = item.as_appointment() else {
            continue;
        };
        if a.schedule <= now {
            continue;
        }
        match latest.get(&a.patient_id) {
            // strictly-greater keeps the earliest item on equal timestamps
            Some((_, best)) if a.schedule <= *best => {}
            _ => {
                latest.insert(a.patient_id, (a.appointment_id, a.schedule));
            }
        }
    }

    let mut labels = HashMap::new();
    for item in &roster.items {
        let Some(a) = item.as_appointment() else {
            continue;
        };
        let upcoming = a.schedule > now;
        let is_latest = latest
            .get(&a.patient_id)
            .is_some_and(|(id, _)| *id == a.appointment_id);

        let label = if upcoming && is_latest {
            DerivedLabel::Latest
        } else if upcoming && a.status == AppointmentStatus::Scheduled {
            DerivedLabel::Scheduled
        } else if upcoming {
            DerivedLabel::New
        } else {
            DerivedLabel::Past
        };
        labels.insert(a.appointment_id, label);
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, EntityKind};
    use crate::roster::RosterFilter;
    use crate::roster::reconcile::test_fixtures::{appointment_for, uid};
    use chrono::Duration;

    fn roster_of(items: Vec<Entity>) -> Roster {
        let mut roster = Roster::new(EntityKind::Appointment, RosterFilter::All);
        roster.items = items;
        roster.recount();
        roster
    }

    #[test]
    fn last_upcoming_per_patient_is_latest() {
        let now = Utc::now();
        let roster = roster_of(vec![
            appointment_for("a1", "p1", AppointmentStatus::Scheduled, now + Duration::days(1)),
            appointment_for("a2", "p1", AppointmentStatus::Pending, now + Duration::days(3)),
        ]);

        let labels = classify(&roster, now);

        assert_eq!(labels.get(&uid("a2")), Some(&DerivedLabel::Latest));
        assert_eq!(labels.get(&uid("a1")), Some(&DerivedLabel::Scheduled));
    }

    #[test]
    fn upcoming_unscheduled_is_new() {
        let now = Utc::now();
        let roster = roster_of(vec![
            appointment_for("a1", "p1", AppointmentStatus::Pending, now + Duration::days(1)),
            appointment_for("a2", "p1", AppointmentStatus::Pending, now + Duration::days(2)),
        ]);

        let labels = classify(&roster, now);

        assert_eq!(labels.get(&uid("a2")), Some(&DerivedLabel::Latest));
        assert_eq!(labels.get(&uid("a1")), Some(&DerivedLabel::New));
    }

    #[test]
    fn elapsed_appointments_are_past() {
        let now = Utc::now();
        let roster = roster_of(vec![
            appointment_for("a1", "p1", AppointmentStatus::Scheduled, now - Duration::days(1)),
            appointment_for("a2", "p1", AppointmentStatus::Cancelled, now - Duration::hours(2)),
        ]);

        let labels = classify(&roster, now);

        assert_eq!(labels.get(&uid("a1")), Some(&DerivedLabel::Past));
        assert_eq!(labels.get(&uid("a2")), Some(&DerivedLabel::Past));
    }

    #[test]
    fn latest_is_tracked_per_patient() {
        let now = Utc::now();
        let roster = roster_of(vec![
            appointment_for("a1", "p1", AppointmentStatus::Pending, now + Duration::days(1)),
            appointment_for("b1", "p2", AppointmentStatus::Pending, now + Duration::days(2)),
        ]);

        let labels = classify(&roster, now);

        assert_eq!(labels.get(&uid("a1")), Some(&DerivedLabel::Latest));
        assert_eq!(labels.get(&uid("b1")), Some(&DerivedLabel::Latest));
    }

    #[test]
    fn equal_schedules_break_ties_by_roster_order() {
        let now = Utc::now();
        let when = now + Duration::days(1);
        let roster = roster_of(vec![
            appointment_for("a1", "p1", AppointmentStatus::Scheduled, when),
            appointment_for("a2", "p1", AppointmentStatus::Scheduled, when),
        ]);

        let labels = classify(&roster, now);

        assert_eq!(labels.get(&uid("a1")), Some(&DerivedLabel::Latest));
        assert_eq!(labels.get(&uid("a2")), Some(&DerivedLabel::Scheduled));
    }

    #[test]
    fn classification_is_deterministic() {
        let now = Utc::now();
        let roster = roster_of(vec![
            appointment_for("a1", "p1", AppointmentStatus::Pending, now + Duration::days(1)),
            appointment_for("a2", "p1", AppointmentStatus::Scheduled, now - Duration::days(1)),
            appointment_for("b1", "p2", AppointmentStatus::Scheduled, now + Duration::hours(6)),
        ]);

        let first = classify(&roster, now);
        let second = classify(&roster, now);

        assert_eq!(first, second);
    }

    #[test]
    fn classifier_does_not_touch_the_roster() {
        let now = Utc::now();
        let roster = roster_of(vec![appointment_for(
            "a1",
            "p1",
            AppointmentStatus::Pending,
            now + Duration::days(1),
        )]);
        let ids_before: Vec<_> = roster.items.iter().map(|e| e.id()).collect();
        let total_before = roster.total_count;

        let _ = classify(&roster, now);

        let ids_after: Vec<_> = roster.items.iter().map(|e| e.id()).collect();
        assert_eq!(ids_before, ids_after);
        assert_eq!(total_before, roster.total_count);
    }
}
