//! Domain event system: decoupled communication between the pipeline and
//! whoever is watching it (review server, CLI, metrics).
//!
//! The orchestrator publishes an event for every stage it completes and
//! every status change; subscribers filter for what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::customer::CustomerMessage;
use crate::run::{PipelineRun, RunStatus, StageRecord};

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A customer message entered the pipeline
    RunStarted {
        run_id: String,
        message: CustomerMessage,
        timestamp: DateTime<Utc>,
    },

    /// A stage finished and was appended to the run
    StageCompleted {
        run_id: String,
        record: StageRecord,
    },

    /// The run's status changed
    StatusChanged {
        run_id: String,
        status: RunStatus,
        timestamp: DateTime<Utc>,
    },

    /// The run is suspended until an operator decides
    ReviewRequested {
        run_id: String,
        token: String,
        timestamp: DateTime<Utc>,
    },

    /// The run reached a terminal status
    RunFinished { run: Box<PipelineRun> },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::StageCompleted { .. } => "stage_completed",
            Self::StatusChanged { .. } => "status_changed",
            Self::ReviewRequested { .. } => "review_requested",
            Self::RunFinished { .. } => "run_finished",
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StageCompleted { run_id, .. }
            | Self::StatusChanged { run_id, .. }
            | Self::ReviewRequested { run_id, .. } => run_id,
            Self::RunFinished { run } => run.id.as_str(),
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
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
    use crate::run::StageName;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::StageCompleted {
            run_id: "run-1".into(),
            record: StageRecord::new(StageName::InitialSafety, "hi", "SAFE", 42.0),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "stage_completed");
        assert_eq!(event.run_id(), "run-1");
        match event.as_ref() {
            DomainEvent::StageCompleted { record, .. } => {
                assert_eq!(record.stage, StageName::InitialSafety);
            }
            _ => panic!("Expected StageCompleted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::StatusChanged {
            run_id: "run-1".into(),
            status: RunStatus::Running,
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = DomainEvent::ReviewRequested {
            run_id: "r".into(),
            token: "t".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"review_requested\""));
    }
}
