//! Domain event system — decoupled observation of the control loops.
//!
//! Events are published when something interesting happens inside a loop.
//! Subscribers react without coupling; publishing with no subscribers is a
//! no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The router classified a request
    RouteDecided {
        route: String,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed by the reasoning loop
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The judge scored an answer
    AnswerJudged {
        overall: f64,
        should_improve: bool,
        timestamp: DateTime<Utc>,
    },

    /// One stability run of a generated artifact finished
    StabilityRunCompleted {
        artifact_id: String,
        success: bool,
        successful_runs: u32,
        timestamp: DateTime<Utc>,
    },

    /// An artifact was regenerated after a failed stability run
    ArtifactRegenerated {
        artifact_id: String,
        fix_attempt: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Fire-and-forget: errors (no subscribers) are ignored.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::RouteDecided {
            route: "tool-use".into(),
            confidence: 0.9,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, DomainEvent::RouteDecided { .. }));
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::default();
        bus.publish(DomainEvent::ToolExecuted {
            tool_name: "calculator".into(),
            success: true,
            duration_ms: 3,
            timestamp: Utc::now(),
        });
    }
}
