//! Event types for the Drafter analysis event system
//!
//! **[DA-MS-010]** Analysis progress events broadcast over an in-process
//! bus and forwarded to SSE subscribers by the service layer.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Analysis lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    /// Session registered and queued
    SessionStarted {
        session_id: Uuid,
        file_name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress checkpoint reached
    ProgressUpdate {
        session_id: Uuid,
        percent: u8,
        stage: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session reached COMPLETED
    SessionCompleted {
        session_id: Uuid,
        processing_time_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session reached FAILED
    SessionFailed {
        session_id: Uuid,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AnalysisEvent {
    /// Session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            AnalysisEvent::SessionStarted { session_id, .. }
            | AnalysisEvent::ProgressUpdate { session_id, .. }
            | AnalysisEvent::SessionCompleted { session_id, .. }
            | AnalysisEvent::SessionFailed { session_id, .. } => *session_id,
        }
    }
}

/// Broadcast bus for analysis events
///
/// Thin wrapper over `tokio::sync::broadcast`; emitting with no
/// subscribers is not an error (events are simply dropped).
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AnalysisEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers
    pub fn emit(&self, event: AnalysisEvent) {
        // send() errors only when there are no receivers; that is normal
        // for a service with no SSE client connected
        let _ = self.tx.send(event);
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();
        bus.emit(AnalysisEvent::ProgressUpdate {
            session_id: id,
            percent: 30,
            stage: "Extracting entities".to_string(),
            timestamp: chrono::Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id(), id);
    }

    #[test]
    fn test_emit_without_subscribers_is_ok() {
        let bus = EventBus::new(4);
        bus.emit(AnalysisEvent::SessionStarted {
            session_id: Uuid::new_v4(),
            file_name: "plan.dxf".to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}
