//! "Client connected" notifications.

use std::sync::Arc;

use statesync_types::{ClientToken, PresenceEvent};
use tracing::debug;

use crate::config::PresenceConfig;
use crate::fanout::{DeliveryReport, Fanout, Subscription};

/// Fans each [`PresenceEvent`] out to every open subscription stream.
#[derive(Debug)]
pub struct PresenceNotifier {
    subscribers: Arc<Fanout<PresenceEvent>>,
}

impl PresenceNotifier {
    /// Create a notifier with no subscribers.
    pub fn new(config: &PresenceConfig) -> Self {
        Self {
            subscribers: Arc::new(Fanout::new("presence", config.fanout())),
        }
    }

    /// Register a delivery channel for `token`, replacing any earlier one.
    pub fn subscribe(&self, token: ClientToken) -> Subscription<PresenceEvent> {
        self.subscribers.subscribe(token)
    }

    /// Remove and close the channel for `token`.
    pub fn unsubscribe(&self, token: &ClientToken) -> bool {
        self.subscribers.unsubscribe(token)
    }

    /// Deliver `event` to every current subscriber without blocking.
    pub fn announce(&self, event: PresenceEvent) -> DeliveryReport {
        let report = self.subscribers.deliver(std::slice::from_ref(&event));
        debug!(
            token = %event.token,
            delivered = report.delivered,
            evicted = report.evicted.len(),
            "Presence announced"
        );
        report
    }

    /// Number of open subscription streams.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use statesync_types::ClientType;

    use super::*;
    use crate::fanout::CloseReason;

    fn event(token: &str) -> PresenceEvent {
        PresenceEvent {
            token: ClientToken::from(token),
            client_type: ClientType::from("unity"),
        }
    }

    #[test]
    fn announce_reaches_each_subscriber_once() {
        let notifier = PresenceNotifier::new(&PresenceConfig::default());
        let mut first = notifier.subscribe(ClientToken::from("c1"));
        let mut second = notifier.subscribe(ClientToken::from("c3"));

        let report = notifier.announce(event("c2"));
        assert_eq!(report.delivered, 2);
        assert_eq!(first.try_recv(), Some(event("c2")));
        assert_eq!(first.try_recv(), None);
        assert_eq!(second.try_recv(), Some(event("c2")));
    }

    #[test]
    fn full_subscriber_is_dropped_without_affecting_others() {
        let notifier = PresenceNotifier::new(&PresenceConfig {
            buffer_capacity: 1,
            max_lagged_events: 1,
        });
        let stuck = notifier.subscribe(ClientToken::from("stuck"));
        let mut healthy = notifier.subscribe(ClientToken::from("healthy"));

        notifier.announce(event("x"));
        assert_eq!(healthy.try_recv(), Some(event("x")));

        let report = notifier.announce(event("y"));
        assert_eq!(report.evicted, [ClientToken::from("stuck")]);
        assert_eq!(stuck.close_reason(), Some(CloseReason::Lagged));
        assert_eq!(healthy.try_recv(), Some(event("y")));
        assert_eq!(notifier.subscriber_count(), 1);
    }

    #[test]
    fn unsubscribed_channel_receives_nothing() {
        let notifier = PresenceNotifier::new(&PresenceConfig::default());
        let mut sub = notifier.subscribe(ClientToken::from("c1"));
        assert!(notifier.unsubscribe(&ClientToken::from("c1")));
        notifier.announce(event("c2"));
        assert_eq!(sub.try_recv(), None);
    }
}
