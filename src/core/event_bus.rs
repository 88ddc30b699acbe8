//! Orchestration events and the channel that carries them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Orchestration event, delivered to the UI collaborator.
///
/// Events of a superseded epoch are never emitted.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleEvent {
    StepDispatched {
        epoch: u64,
        group: String,
        workflow_id: String,
        timestamp: DateTime<Utc>,
    },
    StepCompleted {
        epoch: u64,
        group: String,
        workflow_id: String,
        timestamp: DateTime<Utc>,
    },
    StepFailed {
        epoch: u64,
        group: String,
        workflow_id: String,
        error: String,
        execute_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// The session must be torn down; handling is external.
    ForceLogout {
        epoch: u64,
        reason: String,
        execute_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

pub type EventSender = mpsc::UnboundedSender<ConsoleEvent>;

pub type EventReceiver = mpsc::UnboundedReceiver<ConsoleEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_channel() {
        let (sender, mut receiver) = create_event_channel();

        sender
            .send(ConsoleEvent::ForceLogout {
                epoch: 3,
                reason: "session expired".to_string(),
                execute_id: None,
                timestamp: Utc::now(),
            })
            .unwrap();

        let event = receiver.recv().await.unwrap();
        match event {
            ConsoleEvent::ForceLogout { epoch, reason, .. } => {
                assert_eq!(epoch, 3);
                assert_eq!(reason, "session expired");
            }
            _ => panic!("Unexpected event type"),
        }
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ConsoleEvent::StepDispatched {
            epoch: 1,
            group: "load".into(),
            workflow_id: "WF".into(),
            timestamp: Utc::now(),
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "step_dispatched");
    }
}
