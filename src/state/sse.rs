use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Simple broadcast hub wrapper carrying one identity's event stream.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Per-identity registry of SSE hubs.
///
/// A hub is created lazily on the first subscription or publish for an
/// identity and pruned once its last subscriber disconnects.
pub struct SseRegistry {
    capacity: usize,
    hubs: DashMap<String, SseHub>,
}

impl SseRegistry {
    /// Build the registry with a per-hub channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            hubs: DashMap::new(),
        }
    }

    /// Subscribe to the event stream scoped to one identity.
    pub fn subscribe(&self, identity: &str) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(identity.to_string())
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Deliver an event to an identity's active subscriptions, if any.
    ///
    /// Delivery is at-least-once from the consumer's point of view; payloads
    /// carry session id and state so duplicates are cheap to collapse.
    pub fn publish(&self, identity: &str, event: ServerEvent) {
        if let Some(hub) = self.hubs.get(identity) {
            hub.broadcast(event);
        }
    }

    /// Drop an identity's hub once no subscriber is left.
    pub fn prune(&self, identity: &str) {
        self.hubs
            .remove_if(identity, |_, hub| !hub.has_subscribers());
    }

    /// Whether the identity currently has at least one live subscription.
    pub fn is_connected(&self, identity: &str) -> bool {
        self.hubs
            .get(identity)
            .map(|hub| hub.has_subscribers())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_only_the_target_identity() {
        let registry = SseRegistry::new(8);
        let mut alice_rx = registry.subscribe("alice");
        let mut bob_rx = registry.subscribe("bob");

        registry.publish("alice", ServerEvent::new(Some("MATCHED".into()), "{}".into()));

        let received = alice_rx.try_recv().unwrap();
        assert_eq!(received.event.as_deref(), Some("MATCHED"));
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let registry = SseRegistry::new(8);
        registry.publish("ghost", ServerEvent::new(None, "{}".into()));
        assert!(!registry.is_connected("ghost"));
    }

    #[test]
    fn overflow_reports_the_lag_and_keeps_the_latest_events() {
        let registry = SseRegistry::new(2);
        let mut rx = registry.subscribe("alice");
        for i in 0..4 {
            registry.publish("alice", ServerEvent::new(None, i.to_string()));
        }

        // The subscriber learns how many events it lost, then resumes from
        // the oldest retained one.
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(2))
        ));
        assert_eq!(rx.try_recv().unwrap().data, "2");
        assert_eq!(rx.try_recv().unwrap().data, "3");
    }

    #[test]
    fn prune_keeps_hubs_with_live_subscribers() {
        let registry = SseRegistry::new(8);
        let rx = registry.subscribe("alice");

        registry.prune("alice");
        assert!(registry.is_connected("alice"));

        drop(rx);
        registry.prune("alice");
        assert!(!registry.is_connected("alice"));
    }
}
