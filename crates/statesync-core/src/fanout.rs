//! Per-subscriber fan-out with bounded buffers.
//!
//! Both streams (entity snapshots and presence events) deliver through a
//! [`Fanout`]. Each subscriber owns a bounded `mpsc` buffer, and delivery
//! uses `try_send`, so one slow or absent consumer never delays the
//! others.
//!
//! # Locking
//!
//! The registration map is read-locked only to clone the current list of
//! senders; no lock is held while pushing items. Insert and removal take
//! the write lock briefly.
//!
//! # Full-buffer policy
//!
//! A delivery round that cannot push every item to a subscriber counts as
//! one failure for that subscriber and skips its remaining items. A
//! complete round resets the count. When the count reaches
//! [`FanoutConfig::max_consecutive_failures`] the subscriber is evicted and
//! its stream ends with [`CloseReason::Lagged`]. A subscriber whose
//! receiver is gone is evicted on the next round.
//!
//! # Lifetime
//!
//! [`Subscription`] is an RAII handle: dropping it removes its entry, but
//! only if that entry is still the current registration for the token.
//! Registering the same token again replaces (and closes) the previous
//! subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use statesync_types::ClientToken;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Buffer and eviction settings for one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutConfig {
    /// Items buffered per subscriber.
    pub capacity: usize,
    /// Consecutive incomplete rounds before a subscriber is evicted.
    pub max_consecutive_failures: u32,
}

/// Why the server closed a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The subscriber's buffer stayed full for too many rounds.
    Lagged,
    /// A newer subscription for the same token took its place.
    Replaced,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The receiving side was already gone.
    Disconnected,
}

impl CloseReason {
    /// Short human-readable description, suitable for a close frame.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lagged => "evicted: subscriber fell too far behind",
            Self::Replaced => "replaced by a newer subscription",
            Self::Unsubscribed => "unsubscribed",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Outcome of one delivery round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers that received every item.
    pub delivered: usize,
    /// Subscribers that missed items this round but were kept.
    pub lagged: usize,
    /// Subscribers removed during this round.
    pub evicted: Vec<ClientToken>,
}

struct Slot<T> {
    id: u64,
    tx: mpsc::Sender<T>,
    failures: Arc<AtomicU32>,
    reason: Arc<Mutex<Option<CloseReason>>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
            failures: Arc::clone(&self.failures),
            reason: Arc::clone(&self.reason),
        }
    }
}

impl<T> Slot<T> {
    fn close(&self, reason: CloseReason) {
        let mut slot_reason = self.reason.lock();
        if slot_reason.is_none() {
            *slot_reason = Some(reason);
        }
    }
}

enum Push {
    Complete,
    Full { sent: usize },
    Closed,
}

fn push_all<T: Clone>(tx: &mpsc::Sender<T>, items: &[T]) -> Push {
    for (sent, item) in items.iter().enumerate() {
        match tx.try_send(item.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Push::Full { sent },
            Err(TrySendError::Closed(_)) => return Push::Closed,
        }
    }
    Push::Complete
}

/// Registry of subscribers, one per token, each with its own buffer.
pub struct Fanout<T> {
    label: &'static str,
    config: FanoutConfig,
    next_id: AtomicU64,
    slots: RwLock<HashMap<ClientToken, Slot<T>>>,
}

impl<T> core::fmt::Debug for Fanout<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Fanout")
            .field("label", &self.label)
            .field("config", &self.config)
            .field("subscribers", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T> Fanout<T> {
    /// Create an empty fan-out. `label` names it in log output.
    pub fn new(label: &'static str, config: FanoutConfig) -> Self {
        Self {
            label,
            config,
            next_id: AtomicU64::new(0),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Register `token`, replacing any earlier registration for it.
    pub fn subscribe(self: &Arc<Self>, token: ClientToken) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.config.capacity.max(1));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let reason = Arc::new(Mutex::new(None));
        let slot = Slot {
            id,
            tx,
            failures: Arc::new(AtomicU32::new(0)),
            reason: Arc::clone(&reason),
        };

        let previous = self.slots.write().insert(token.clone(), slot);
        if let Some(previous) = previous {
            previous.close(CloseReason::Replaced);
            debug!(fanout = self.label, %token, "Subscription replaced");
        }

        Subscription {
            token,
            id,
            rx,
            reason,
            fanout: Arc::downgrade(self),
        }
    }

    /// Remove and close the subscription for `token`.
    ///
    /// Returns `false` if nothing was registered.
    pub fn unsubscribe(&self, token: &ClientToken) -> bool {
        let removed = self.slots.write().remove(token);
        removed.is_some_and(|slot| {
            slot.close(CloseReason::Unsubscribed);
            true
        })
    }

    /// Remove the entry for `token` only if it is still registration `id`.
    fn remove_if_current(&self, token: &ClientToken, id: u64, reason: CloseReason) -> bool {
        let mut slots = self.slots.write();
        if slots.get(token).is_some_and(|slot| slot.id == id) {
            if let Some(slot) = slots.remove(token) {
                slot.close(reason);
            }
            true
        } else {
            false
        }
    }

    /// Whether `token` currently has a subscription.
    pub fn contains(&self, token: &ClientToken) -> bool {
        self.slots.read().contains_key(token)
    }

    /// Number of current subscribers.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl<T: Clone> Fanout<T> {
    /// Push `items`, in order, to every current subscriber.
    ///
    /// Never blocks on a subscriber. See the module docs for the policy
    /// applied to subscribers whose buffer is full.
    pub fn deliver(&self, items: &[T]) -> DeliveryReport {
        let targets: Vec<(ClientToken, Slot<T>)> = self
            .slots
            .read()
            .iter()
            .map(|(token, slot)| (token.clone(), slot.clone()))
            .collect();

        let mut report = DeliveryReport::default();
        for (token, slot) in targets {
            match push_all(&slot.tx, items) {
                Push::Complete => {
                    slot.failures.store(0, Ordering::Relaxed);
                    report.delivered = report.delivered.saturating_add(1);
                }
                Push::Full { sent } => {
                    let failures = slot
                        .failures
                        .fetch_add(1, Ordering::Relaxed)
                        .saturating_add(1);
                    if failures >= self.config.max_consecutive_failures {
                        if self.remove_if_current(&token, slot.id, CloseReason::Lagged) {
                            warn!(
                                fanout = self.label,
                                %token,
                                failures,
                                "Evicting slow subscriber"
                            );
                            report.evicted.push(token);
                        }
                    } else {
                        debug!(
                            fanout = self.label,
                            %token,
                            sent,
                            skipped = items.len().saturating_sub(sent),
                            failures,
                            "Subscriber buffer full"
                        );
                        report.lagged = report.lagged.saturating_add(1);
                    }
                }
                Push::Closed => {
                    if self.remove_if_current(&token, slot.id, CloseReason::Disconnected) {
                        debug!(fanout = self.label, %token, "Removing closed subscriber");
                        report.evicted.push(token);
                    }
                }
            }
        }
        report
    }
}

/// Receiving end of one registration.
///
/// Dropping the handle unregisters it.
pub struct Subscription<T> {
    token: ClientToken,
    id: u64,
    rx: mpsc::Receiver<T>,
    reason: Arc<Mutex<Option<CloseReason>>>,
    fanout: Weak<Fanout<T>>,
}

impl<T> core::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("token", &self.token)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl<T> Subscription<T> {
    /// Wait for the next item. `None` once the server has closed the
    /// subscription and the buffer is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take the next buffered item without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Token this subscription was registered for.
    pub const fn token(&self) -> &ClientToken {
        &self.token
    }

    /// Why the server closed this subscription, if it has.
    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.reason.lock()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(fanout) = self.fanout.upgrade() {
            fanout.remove_if_current(&self.token, self.id, CloseReason::Disconnected);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fanout(capacity: usize, max_failures: u32) -> Arc<Fanout<u32>> {
        Arc::new(Fanout::new(
            "test",
            FanoutConfig {
                capacity,
                max_consecutive_failures: max_failures,
            },
        ))
    }

    fn drain(sub: &mut Subscription<u32>) -> Vec<u32> {
        std::iter::from_fn(|| sub.try_recv()).collect()
    }

    #[test]
    fn delivers_to_every_subscriber_in_order() {
        let fan = fanout(8, 3);
        let mut a = fan.subscribe(ClientToken::from("a"));
        let mut b = fan.subscribe(ClientToken::from("b"));

        let report = fan.deliver(&[1, 2, 3]);
        assert_eq!(report.delivered, 2);
        assert_eq!(drain(&mut a), [1, 2, 3]);
        assert_eq!(drain(&mut b), [1, 2, 3]);
    }

    #[test]
    fn full_subscriber_does_not_block_healthy_one() {
        let fan = fanout(2, 10);
        let _stuck = fan.subscribe(ClientToken::from("stuck"));
        let mut healthy = fan.subscribe(ClientToken::from("healthy"));

        for round in 0..3 {
            let report = fan.deliver(&[round, round]);
            assert_eq!(drain(&mut healthy), [round, round]);
            if round > 0 {
                assert_eq!(report.lagged, 1);
            }
        }
        assert!(fan.contains(&ClientToken::from("stuck")));
    }

    #[test]
    fn slow_subscriber_is_evicted_after_consecutive_failures() {
        let fan = fanout(1, 2);
        let mut slow = fan.subscribe(ClientToken::from("slow"));

        // Round 1 fills the buffer (second item does not fit): failure 1.
        let report = fan.deliver(&[1, 2]);
        assert_eq!(report.lagged, 1);
        // Round 2 cannot push anything: failure 2, evicted.
        let report = fan.deliver(&[3]);
        assert_eq!(report.evicted, [ClientToken::from("slow")]);
        assert!(!fan.contains(&ClientToken::from("slow")));

        // Buffered item is still readable, then the stream ends.
        assert_eq!(slow.try_recv(), Some(1));
        assert_eq!(slow.close_reason(), Some(CloseReason::Lagged));
    }

    #[test]
    fn complete_round_resets_failure_count() {
        let fan = fanout(1, 2);
        let mut sub = fan.subscribe(ClientToken::from("s"));

        fan.deliver(&[1, 2]); // failure 1
        assert_eq!(drain(&mut sub), [1]);
        fan.deliver(&[3]); // complete, reset
        assert_eq!(drain(&mut sub), [3]);
        fan.deliver(&[4, 5]); // failure 1 again
        assert!(fan.contains(&ClientToken::from("s")));
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let fan = fanout(4, 1);
        let sub = fan.subscribe(ClientToken::from("a"));
        assert_eq!(fan.len(), 1);
        drop(sub);
        assert!(fan.is_empty());
    }

    #[test]
    fn resubscribe_replaces_and_stale_drop_keeps_new_entry() {
        let fan = fanout(4, 1);
        let mut old = fan.subscribe(ClientToken::from("a"));
        let mut new = fan.subscribe(ClientToken::from("a"));
        assert_eq!(fan.len(), 1);
        assert_eq!(old.close_reason(), Some(CloseReason::Replaced));
        assert!(old.try_recv().is_none());

        drop(old);
        assert!(fan.contains(&ClientToken::from("a")));

        fan.deliver(&[7]);
        assert_eq!(new.try_recv(), Some(7));
    }

    #[test]
    fn unsubscribe_closes_channel() {
        let fan = fanout(4, 1);
        let sub = fan.subscribe(ClientToken::from("a"));
        assert!(fan.unsubscribe(&ClientToken::from("a")));
        assert!(!fan.unsubscribe(&ClientToken::from("a")));
        assert_eq!(sub.close_reason(), Some(CloseReason::Unsubscribed));

        // Delivering with nobody registered is a no-op.
        assert_eq!(fan.deliver(&[1]), DeliveryReport::default());
    }

    #[tokio::test]
    async fn recv_ends_after_eviction() {
        let fan = fanout(1, 1);
        let mut sub = fan.subscribe(ClientToken::from("a"));
        fan.deliver(&[1, 2]);
        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, None);
        assert_eq!(sub.close_reason(), Some(CloseReason::Lagged));
    }
}
