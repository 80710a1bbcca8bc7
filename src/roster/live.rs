use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::task::JoinHandle;

use crate::bus::{EventBus, RawEvent, collection_channel};
use crate::models::EntityKind;
use crate::roster::normalize::{Normalized, normalize};
use crate::roster::reconcile::{self, Outcome};
use crate::roster::snapshot::SnapshotLoader;
use crate::roster::subscription::{Delivery, Subscription};
use crate::roster::{Roster, RosterFilter};
use crate::store::BackingStore;

/// Events that arrive while the first snapshot is still loading are held
/// back, then replayed on top of it in arrival order. Once live, events
/// apply directly.
enum Phase {
    Loading(VecDeque<RawEvent>),
    Live,
}

/// One view's roster, kept current by the change-event feed.
///
/// Construction subscribes to the feed before the snapshot fetch starts,
/// so nothing published during the fetch is lost. The snapshot install
/// and the replay of held-back events happen under the phase lock, never
/// interleaved with direct event application.
pub struct LiveRoster {
    shared: Arc<RwLock<Roster>>,
    loaded: Arc<AtomicBool>,
    sub: Subscription,
    loader: JoinHandle<()>,
}

impl LiveRoster {
    pub fn start(
        store: Arc<dyn BackingStore>,
        bus: &EventBus,
        kind: EntityKind,
        filter: RosterFilter,
    ) -> Self {
        let rx = bus.subscribe();
        let shared = Arc::new(RwLock::new(Roster::new(kind, filter)));
        let phase = Arc::new(Mutex::new(Phase::Loading(VecDeque::new())));
        let loaded = Arc::new(AtomicBool::new(false));
        let resyncing = Arc::new(AtomicBool::new(false));

        let sub = Subscription::spawn(rx, collection_channel(kind.collection()), {
            let shared = Arc::clone(&shared);
            let phase = Arc::clone(&phase);
            let loaded = Arc::clone(&loaded);
            let resyncing = Arc::clone(&resyncing);
            let store = Arc::clone(&store);
            move |delivery| match delivery {
                Delivery::Event(raw) => {
                    let mut phase = phase.lock().unwrap_or_else(PoisonError::into_inner);
                    match &mut *phase {
                        Phase::Loading(buffer) => buffer.push_back(raw),
                        Phase::Live => apply_raw(&shared, kind, &raw),
                    }
                }
                Delivery::Lagged(skipped) => {
                    tracing::warn!(
                        collection = kind.collection(),
                        skipped,
                        "event feed lagged; resyncing roster from the store"
                    );
                    if !resyncing.swap(true, Ordering::AcqRel) {
                        tokio::spawn(resync(
                            Arc::clone(&store),
                            Arc::clone(&shared),
                            kind,
                            filter,
                            Arc::clone(&loaded),
                            Arc::clone(&resyncing),
                        ));
                    }
                }
            }
        });

        let loader = tokio::spawn({
            let shared = Arc::clone(&shared);
            let phase = Arc::clone(&phase);
            let loaded = Arc::clone(&loaded);
            async move {
                let snapshot = SnapshotLoader::new(store).load(kind, filter).await;

                let mut phase = phase.lock().unwrap_or_else(PoisonError::into_inner);
                match snapshot {
                    Ok(roster) => {
                        *shared.write().unwrap_or_else(PoisonError::into_inner) = roster;
                        loaded.store(true, Ordering::Release);
                    }
                    Err(e) => {
                        // stay on the empty roster; events still apply,
                        // and is_live keeps reporting the failed load
                        tracing::error!(
                            collection = kind.collection(),
                            "initial snapshot load failed: {e}"
                        );
                    }
                }
                if let Phase::Loading(buffer) = &mut *phase {
                    for raw in buffer.drain(..) {
                        apply_raw(&shared, kind, &raw);
                    }
                }
                *phase = Phase::Live;
            }
        });

        Self {
            shared,
            loaded,
            sub,
            loader,
        }
    }

    /// Whether the first snapshot has resolved. Until then the view is in
    /// its loading/error state.
    pub fn is_live(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Current state of the roster, cloned for the read path.
    pub fn snapshot(&self) -> Roster {
        self.shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Tear the view down: cancel the subscription before discarding the
    /// roster so no event handler outlives it.
    pub fn shutdown(&self) {
        self.sub.cancel();
        self.loader.abort();
    }
}

fn apply_raw(shared: &RwLock<Roster>, kind: EntityKind, raw: &RawEvent) {
    match normalize(raw, kind) {
        Ok(Normalized::Change(change)) => {
            let action = change.action();
            let id = change.entity().id();
            let outcome = {
                let mut roster = shared.write().unwrap_or_else(PoisonError::into_inner);
                reconcile::apply(&mut roster, change)
            };
            if outcome == Outcome::Skipped {
                tracing::debug!(collection = kind.collection(), %id, action, "stale or filtered event skipped");
            } else {
                tracing::info!(collection = kind.collection(), %id, action, "applied change event");
            }
        }
        Ok(Normalized::Ignored) => {}
        Err(e) => tracing::warn!(collection = kind.collection(), "dropped change event: {e}"),
    }
}

/// Replace the roster with a fresh listing after the feed lagged. Events
/// applied between the fetch and the install are superseded by it; the
/// feed resumes on top of the fresh state.
async fn resync(
    store: Arc<dyn BackingStore>,
    shared: Arc<RwLock<Roster>>,
    kind: EntityKind,
    filter: RosterFilter,
    loaded: Arc<AtomicBool>,
    resyncing: Arc<AtomicBool>,
) {
    match SnapshotLoader::new(store).load(kind, filter).await {
        Ok(roster) => {
            *shared.write().unwrap_or_else(PoisonError::into_inner) = roster;
            loaded.store(true, Ordering::Release);
            tracing::info!(collection = kind.collection(), "roster resynced");
        }
        Err(e) => tracing::warn!(collection = kind.collection(), "roster resync failed: {e}"),
    }
    resyncing.store(false, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{ACTION_CREATE, ACTION_UPDATE, EventBus};
    use crate::models::AppointmentStatus;
    use crate::roster::reconcile::test_fixtures::{appointment, uid};
    use crate::store::testing::MemStore;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    fn publish(bus: &EventBus, action: &str, entity: &crate::models::Entity) {
        bus.publish(RawEvent::document(
            entity.kind().collection(),
            entity.id(),
            action,
            serde_json::to_value(entity).expect("encode"),
        ));
    }

    async fn wait_until(mut probe: impl FnMut() -> bool) {
        for _ in 0..200 {
            if probe() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition never became true");
    }

    #[tokio::test]
    async fn first_snapshot_populates_the_roster() {
        let now = Utc::now();
        let store = Arc::new(MemStore::with_items(vec![
            appointment("a1", AppointmentStatus::Pending, now),
            appointment("a2", AppointmentStatus::Scheduled, now),
        ]));
        let bus = EventBus::new();

        let live = LiveRoster::start(store, &bus, EntityKind::Appointment, RosterFilter::All);
        wait_until(|| live.is_live()).await;

        let roster = live.snapshot();
        assert_eq!(roster.total_count, 2);
        assert_eq!(roster.pending_count, 1);
        assert_eq!(roster.scheduled_count, 1);
        live.shutdown();
    }

    #[tokio::test]
    async fn events_racing_the_snapshot_are_buffered_then_applied() {
        let now = Utc::now();
        let store = Arc::new(MemStore::with_items(vec![appointment(
            "a1",
            AppointmentStatus::Pending,
            now,
        )]));
        store.set_delay(Duration::from_millis(80));
        let bus = EventBus::new();

        let live = LiveRoster::start(
            Arc::clone(&store) as Arc<dyn BackingStore>,
            &bus,
            EntityKind::Appointment,
            RosterFilter::All,
        );

        // lands while the snapshot fetch is still sleeping
        let racing = appointment(
            "a2",
            AppointmentStatus::Pending,
            now + ChronoDuration::days(1),
        );
        publish(&bus, ACTION_CREATE, &racing);

        wait_until(|| live.is_live()).await;
        wait_until(|| live.snapshot().total_count == 2).await;

        let roster = live.snapshot();
        let ids: Vec<_> = roster.items.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![uid("a2"), uid("a1")]);
        live.shutdown();
    }

    #[tokio::test]
    async fn post_snapshot_events_apply_directly() {
        let store = Arc::new(MemStore::new());
        let bus = EventBus::new();
        let live = LiveRoster::start(store, &bus, EntityKind::Appointment, RosterFilter::All);
        wait_until(|| live.is_live()).await;

        let created = appointment("a1", AppointmentStatus::Pending, Utc::now());
        publish(&bus, ACTION_CREATE, &created);
        wait_until(|| live.snapshot().total_count == 1).await;

        let updated = appointment("a1", AppointmentStatus::Scheduled, Utc::now());
        publish(&bus, ACTION_UPDATE, &updated);
        wait_until(|| live.snapshot().scheduled_count == 1).await;

        let roster = live.snapshot();
        assert_eq!(roster.total_count, 1);
        assert_eq!(roster.pending_count, 0);
        live.shutdown();
    }

    #[tokio::test]
    async fn stale_updates_leave_the_roster_unchanged() {
        let store = Arc::new(MemStore::new());
        let bus = EventBus::new();
        let live = LiveRoster::start(store, &bus, EntityKind::Appointment, RosterFilter::All);
        wait_until(|| live.is_live()).await;

        let stale = appointment("unknown", AppointmentStatus::Scheduled, Utc::now());
        publish(&bus, ACTION_UPDATE, &stale);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(live.snapshot().total_count, 0);
        live.shutdown();
    }

    #[tokio::test]
    async fn failed_snapshot_still_accepts_events() {
        let store = Arc::new(MemStore::new());
        store.fail_all(true);
        let bus = EventBus::new();

        let live = LiveRoster::start(
            Arc::clone(&store) as Arc<dyn BackingStore>,
            &bus,
            EntityKind::Appointment,
            RosterFilter::All,
        );

        let created = appointment("a1", AppointmentStatus::Pending, Utc::now());
        publish(&bus, ACTION_CREATE, &created);
        wait_until(|| live.snapshot().total_count == 1).await;

        assert!(!live.is_live());
        live.shutdown();
    }

    #[tokio::test]
    async fn shutdown_stops_event_processing() {
        let store = Arc::new(MemStore::new());
        let bus = EventBus::new();
        let live = LiveRoster::start(store, &bus, EntityKind::Appointment, RosterFilter::All);
        wait_until(|| live.is_live()).await;

        live.shutdown();

        let created = appointment("a1", AppointmentStatus::Pending, Utc::now());
        publish(&bus, ACTION_CREATE, &created);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(live.snapshot().total_count, 0);
    }
}
