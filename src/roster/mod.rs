pub mod classify;
pub mod live;
pub mod normalize;
pub mod reconcile;
pub mod snapshot;
pub mod subscription;

use uuid::Uuid;

use crate::models::{AppointmentStatus, Entity, EntityKind};

/// Scope of a roster: everything, or one patient's / one doctor's
/// appointments. Doctor and patient rosters always use `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RosterFilter {
    #[default]
    All,
    Patient(Uuid),
    Doctor(Uuid),
}

impl RosterFilter {
    pub fn matches(&self, entity: &Entity) -> bool {
        match (self, entity) {
            (RosterFilter::All, _) => true,
            (RosterFilter::Patient(id), Entity::Appointment(a)) => a.patient_id == *id,
            (RosterFilter::Doctor(id), Entity::Appointment(a)) => a.doctor_id == *id,
            // only appointment rosters are ever filtered
            _ => true,
        }
    }
}

/// In-memory view of one collection for one screen: the items in display
/// order plus aggregate counters.
///
/// Counters are never tracked incrementally; `recount` derives them from
/// `items` after every mutation, so `total_count == items.len()` and the
/// status counters sum to the total at all times.
#[derive(Debug, Clone)]
pub struct Roster {
    kind: EntityKind,
    filter: RosterFilter,
    pub total_count: usize,
    pub scheduled_count: usize,
    pub pending_count: usize,
    pub cancelled_count: usize,
    pub items: Vec<Entity>,
}

impl Roster {
    pub fn new(kind: EntityKind, filter: RosterFilter) -> Self {
        Self {
            kind,
            filter,
            total_count: 0,
            scheduled_count: 0,
            pending_count: 0,
            cancelled_count: 0,
            items: Vec::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn filter(&self) -> RosterFilter {
        self.filter
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|e| e.id() == id)
    }

    /// Rederive every counter from `items`. Status counters stay zero for
    /// doctor and patient rosters.
    pub fn recount(&mut self) {
        self.total_count = self.items.len();
        self.scheduled_count = 0;
        self.pending_count = 0;
        self.cancelled_count = 0;
        for item in &self.items {
            if let Entity::Appointment(a) = item {
                match a.status {
                    AppointmentStatus::Scheduled => self.scheduled_count += 1,
                    AppointmentStatus::Pending => self.pending_count += 1,
                    AppointmentStatus::Cancelled => self.cancelled_count += 1,
                }
            }
        }
    }
}
