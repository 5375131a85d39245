//! Event bus for the telemetry reconciliation engine
//!
//! Provides a pub/sub event system backed by tokio's broadcast channel.
//! Used to decouple the coordinator from whatever renders its output.
//!
//! # Architecture
//!
//! ```text
//! EngineEvent (session, kind)
//!      ↓
//! EventBus.publish() → broadcast::Sender
//!      ↓
//! Fan-out to multiple subscribers and callback listeners
//!      ↓
//! Each consumer receives events asynchronously
//! ```
//!
//! There is no process-wide bus: each coordinator owns one and hands out
//! clones.

mod bus;
mod event;
pub mod topics;

pub use bus::{EventBus, ListenerHandle};
pub use event::{EngineEvent, EventKind, ReconcileStats};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = EngineEvent::new("s1", EventKind::Throttled { retry_after_ms: 10 });
        assert_eq!(event.session_id, "s1");
        assert_eq!(event.topic(), topics::THROTTLED);
        assert!(!event.id.is_empty());
        assert!(event.to_string().contains("retry in 10 ms"));
    }

    #[test]
    fn test_topics_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for (_, topic) in topics::ALL_TOPICS {
            assert!(topic.starts_with("telemetry/"));
            assert!(seen.insert(*topic), "duplicate topic {topic}");
        }
    }

    #[tokio::test]
    async fn test_subscriber_count() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }
}
