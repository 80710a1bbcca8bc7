use crate::models::EntityKind;
use crate::roster::Roster;
use crate::roster::normalize::ChangeEvent;

/// What `apply` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Replaced,
    Removed,
    /// Wrong kind, filtered out, or a stale reference; the roster is
    /// unchanged.
    Skipped,
}

/// Merge one change event into the roster.
///
/// Created inserts at the front for appointment rosters (newest-first
/// display order) and at the back otherwise. Updated replaces the item in
/// place without moving it. Updated and Deleted for an id the roster does
/// not hold are silent no-ops: the document may belong to a view with a
/// different filter. Counters are rederived by scan after any change.
pub fn apply(roster: &mut Roster, event: ChangeEvent) -> Outcome {
    if event.entity().kind() != roster.kind() {
        return Outcome::Skipped;
    }

    let outcome = match event {
        ChangeEvent::Created(entity) => {
            if !roster.filter().matches(&entity) {
                return Outcome::Skipped;
            }
            match roster.position(entity.id()) {
                // a duplicate create must not break identity-key uniqueness
                Some(pos) => {
                    roster.items[pos] = entity;
                    Outcome::Replaced
                }
                None => {
                    if roster.kind() == EntityKind::Appointment {
                        roster.items.insert(0, entity);
                    } else {
                        roster.items.push(entity);
                    }
                    Outcome::Inserted
                }
            }
        }
        ChangeEvent::Updated(entity) => match roster.position(entity.id()) {
            Some(pos) => {
                roster.items[pos] = entity;
                Outcome::Replaced
            }
            None => return Outcome::Skipped,
        },
        ChangeEvent::Deleted(entity) => match roster.position(entity.id()) {
            Some(pos) => {
                roster.items.remove(pos);
                Outcome::Removed
            }
            None => return Outcome::Skipped,
        },
    };

    roster.recount();
    outcome
}

/* ============================================================
   Shared test fixtures
   ============================================================ */
