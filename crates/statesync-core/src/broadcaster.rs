//! Periodic full-state resync to state stream subscribers.
//!
//! Every tick the broadcaster snapshots the whole store and pushes one
//! snapshot per entity to each subscriber. Nothing is diffed: a subscriber
//! that missed a tick simply gets the current view on the next one, and
//! clients apply snapshots idempotently by entity id. The cost is
//! `entities * subscribers` messages per tick, which limits this model to
//! small worlds.
//!
//! Snapshots are built once per tick into a [`SnapshotBatch`] shared
//! between subscribers. One batch is one fan-out item, so a subscriber's
//! buffer counts whole ticks and a world of any size fits into a single
//! slot. Delivery goes through [`Fanout`], so a stuck subscriber never
//! holds up the others or the next tick.

use std::sync::Arc;
use std::time::Duration;

use statesync_types::{ClientToken, EntitySnapshot};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::BroadcastConfig;
use crate::fanout::{DeliveryReport, Fanout, Subscription};
use crate::service::SyncService;
use crate::store::EntityStore;

/// Every entity snapshot taken in one tick.
pub type SnapshotBatch = Arc<[EntitySnapshot]>;

/// Summary of one broadcast tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Entities snapshotted this tick.
    pub entities: usize,
    /// Per-subscriber delivery outcome.
    pub delivery: DeliveryReport,
}

/// State stream subscribers plus the broadcast period.
#[derive(Debug)]
pub struct SnapshotBroadcaster {
    subscribers: Arc<Fanout<SnapshotBatch>>,
    interval: Duration,
}

impl SnapshotBroadcaster {
    /// Create a broadcaster with no subscribers.
    pub fn new(config: &BroadcastConfig) -> Self {
        Self {
            subscribers: Arc::new(Fanout::new("state", config.fanout())),
            interval: config.interval(),
        }
    }

    /// Register a state stream for `token`, replacing any earlier one.
    pub fn subscribe(&self, token: ClientToken) -> Subscription<SnapshotBatch> {
        self.subscribers.subscribe(token)
    }

    /// Broadcast period.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of open state streams.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Run one tick: snapshot `store` and push it to every subscriber.
    pub fn tick(&self, store: &EntityStore) -> TickReport {
        if self.subscribers.is_empty() {
            return TickReport::default();
        }

        let batch: SnapshotBatch = store.snapshots().into();
        let delivery = self.subscribers.deliver(std::slice::from_ref(&batch));

        TickReport {
            entities: batch.len(),
            delivery,
        }
    }
}

/// Drive the broadcaster until `shutdown` flips to `true` or its sender
/// is dropped.
///
/// The first tick fires immediately. Late ticks are delayed rather than
/// bunched up.
pub async fn run_broadcaster(service: Arc<SyncService>, mut shutdown: watch::Receiver<bool>) {
    let period = service.broadcast_interval();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        "Snapshot broadcaster started"
    );

    let mut ticks: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = service.broadcast_tick();
                ticks = ticks.wrapping_add(1);
                if report.delivery.lagged > 0 || !report.delivery.evicted.is_empty() {
                    debug!(
                        tick = ticks,
                        entities = report.entities,
                        delivered = report.delivery.delivered,
                        lagged = report.delivery.lagged,
                        evicted = report.delivery.evicted.len(),
                        "Broadcast tick had slow subscribers"
                    );
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(ticks, "Snapshot broadcaster stopped");
}

/// Spawn [`run_broadcaster`] on a background task.
pub fn spawn_broadcaster(
    service: Arc<SyncService>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_broadcaster(service, shutdown))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use statesync_types::{EntityId, MemberState};

    use super::*;

    fn config(buffer_capacity: usize, max_lagged_ticks: u32) -> BroadcastConfig {
        BroadcastConfig {
            interval_ms: 50,
            buffer_capacity,
            max_lagged_ticks,
        }
    }

    fn store_with(ids: &[&str]) -> EntityStore {
        let store = EntityStore::new();
        for id in ids {
            store
                .create(
                    EntityId::from(*id),
                    String::from("ship"),
                    vec![MemberState {
                        name: String::from("hp"),
                        data: b"100".to_vec(),
                        authoritative_owner: ClientToken::from("a"),
                    }],
                )
                .unwrap();
        }
        store
    }

    fn ids(sub: &mut Subscription<SnapshotBatch>) -> Vec<String> {
        let mut ids: Vec<String> = std::iter::from_fn(|| sub.try_recv())
            .flat_map(|batch| batch.iter().map(|s| s.id.to_string()).collect::<Vec<_>>())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn tick_sends_every_entity_to_every_subscriber() {
        let store = store_with(&["e1", "e2"]);
        let broadcaster = SnapshotBroadcaster::new(&config(16, 3));
        let mut a = broadcaster.subscribe(ClientToken::from("a"));
        let mut b = broadcaster.subscribe(ClientToken::from("b"));

        let report = broadcaster.tick(&store);
        assert_eq!(report.entities, 2);
        assert_eq!(report.delivery.delivered, 2);
        assert_eq!(ids(&mut a), ["e1", "e2"]);
        assert_eq!(ids(&mut b), ["e1", "e2"]);

        // Full resync: the next tick resends everything.
        broadcaster.tick(&store);
        assert_eq!(ids(&mut a), ["e1", "e2"]);
    }

    #[test]
    fn tick_without_subscribers_is_a_no_op() {
        let store = store_with(&["e1"]);
        let broadcaster = SnapshotBroadcaster::new(&config(16, 3));
        assert_eq!(broadcaster.tick(&store), TickReport::default());
    }

    #[test]
    fn stuck_subscriber_does_not_stop_healthy_one_and_is_eventually_dropped() {
        let store = store_with(&["e1", "e2"]);
        let broadcaster = SnapshotBroadcaster::new(&config(2, 3));
        let stuck = broadcaster.subscribe(ClientToken::from("stuck"));
        let mut healthy = broadcaster.subscribe(ClientToken::from("healthy"));

        for _ in 0..5 {
            broadcaster.tick(&store);
            assert_eq!(ids(&mut healthy), ["e1", "e2"]);
        }

        // Ticks 1-2 filled the buffer, ticks 3-5 were failures 1-3.
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(stuck.close_reason(), Some(crate::fanout::CloseReason::Lagged));
    }

    #[test]
    fn world_larger_than_buffer_reaches_a_draining_subscriber_in_full() {
        let store = store_with(&["e0", "e1", "e2"]);
        let broadcaster = SnapshotBroadcaster::new(&config(2, 3));
        let mut healthy = broadcaster.subscribe(ClientToken::from("healthy"));

        for _ in 0..10 {
            let report = broadcaster.tick(&store);
            assert_eq!(report.delivery.delivered, 1);
            assert_eq!(report.delivery.lagged, 0);
            assert!(report.delivery.evicted.is_empty());
            assert_eq!(ids(&mut healthy), ["e0", "e1", "e2"]);
        }
        assert_eq!(healthy.close_reason(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_delivers_within_two_periods_and_stops_on_shutdown() {
        let service = Arc::new(SyncService::new(&crate::config::SyncConfig::default()));
        let token = service.connect(statesync_types::ClientType::from("unity")).token;
        service
            .create_entity(
                &token,
                EntityId::from("e1"),
                String::from("ship"),
                Vec::new(),
            )
            .unwrap();
        let mut stream = service.open_state_stream(&token).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_broadcaster(Arc::clone(&service), shutdown_rx);

        let deadline = service.broadcast_interval().saturating_mul(2);
        let first = tokio::time::timeout(deadline, stream.recv()).await.unwrap();
        let ids: Option<Vec<String>> =
            first.map(|batch| batch.iter().map(|s| s.id.to_string()).collect());
        assert_eq!(ids, Some(vec![String::from("e1")]));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
