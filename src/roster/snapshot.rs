use std::sync::Arc;

use crate::error::StoreError;
use crate::models::EntityKind;
use crate::roster::{Roster, RosterFilter};
use crate::store::{BackingStore, ListOrder};

/// Fetches the initial full listing for a roster and derives its
/// aggregate counters in one scan. Single attempt; a store failure is the
/// caller's to surface.
pub struct SnapshotLoader {
    store: Arc<dyn BackingStore>,
}

impl SnapshotLoader {
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self { store }
    }

    pub async fn load(
        &self,
        kind: EntityKind,
        filter: RosterFilter,
    ) -> Result<Roster, StoreError> {
        // appointments list newest-first; the other collections keep the
        // store's own order
        let order = match kind {
            EntityKind::Appointment => ListOrder::CreatedDesc,
            _ => ListOrder::CreatedAsc,
        };

        let listing = self.store.list(kind, &filter, order).await?;

        let mut roster = Roster::new(kind, filter);
        roster.items = listing.items;
        roster.recount();
        Ok(roster)
    }
}
