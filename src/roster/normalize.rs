use serde_json::Value;

use crate::bus::{ACTION_CREATE, ACTION_DELETE, ACTION_UPDATE, RawEvent, collection_channel};
use crate::error::EventError;
use crate::models::{Appointment, Doctor, Entity, EntityKind, Patient};

/// A create/update/delete notification carrying the full post-change
/// document.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Created(Entity),
    Updated(Entity),
    Deleted(Entity),
}

impl ChangeEvent {
    pub fn entity(&self) -> &Entity {
        match self {
            ChangeEvent::Created(e) | ChangeEvent::Updated(e) | ChangeEvent::Deleted(e) => e,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            ChangeEvent::Created(_) => ACTION_CREATE,
            ChangeEvent::Updated(_) => ACTION_UPDATE,
            ChangeEvent::Deleted(_) => ACTION_DELETE,
        }
    }
}

#[derive(Debug)]
pub enum Normalized {
    Change(ChangeEvent),
    /// The event belongs to another collection or lifecycle phase.
    Ignored,
}

/// Classify a raw feed event for one entity kind.
///
/// Topic suffixes are checked in the order create, update, delete; the
/// feed never emits more than one lifecycle suffix per event, but if it
/// did, the first match wins. An event whose topics match but whose
/// payload does not decode as the expected document is an error for the
/// caller to drop and log.
pub fn normalize(raw: &RawEvent, kind: EntityKind) -> Result<Normalized, EventError> {
    let channel = collection_channel(kind.collection());

    let action = [ACTION_CREATE, ACTION_UPDATE, ACTION_DELETE]
        .into_iter()
        .find(|action| {
            let suffix = format!(".{action}");
            raw.topics
                .iter()
                .any(|t| t.starts_with(&channel) && t.ends_with(&suffix))
        });

    let Some(action) = action else {
        return Ok(Normalized::Ignored);
    };

    let entity = decode_entity(kind, &raw.payload)?;

    let change = match action {
        ACTION_CREATE => ChangeEvent::Created(entity),
        ACTION_UPDATE => ChangeEvent::Updated(entity),
        _ => ChangeEvent::Deleted(entity),
    };
    Ok(Normalized::Change(change))
}

fn decode_entity(kind: EntityKind, payload: &Value) -> Result<Entity, EventError> {
    let decoded = match kind {
        EntityKind::Appointment => {
            serde_json::from_value::<Appointment>(payload.clone()).map(Entity::Appointment)
        }
        EntityKind::Doctor => serde_json::from_value::<Doctor>(payload.clone()).map(Entity::Doctor),
        EntityKind::Patient => {
            serde_json::from_value::<Patient>(payload.clone()).map(Entity::Patient)
        }
    };
    decoded.map_err(|e| EventError::MalformedEvent(format!("{} payload: {e}", kind.collection())))
}
