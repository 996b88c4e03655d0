use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<String>,
    pub subject_id: Option<i64>,
    pub severity: Severity,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: String, actor_id: Option<String>, subject_id: Option<i64>, severity: Severity, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            severity,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Publish `"<entity>.<action>"` for any entity implementing `Loggable`.
///
/// Fire and forget: a bus without subscribers drops the event.
pub fn publish<T: Loggable>(event_bus: &EventBus, action: &str, actor_id: Option<&str>, entity: &T) {
    let event = DomainEvent::new(
        format!("{}.{}", T::entity_type(), action),
        actor_id.map(str::to_string),
        Some(entity.subject_id()),
        entity.severity_for_action(action),
        serde_json::to_value(entity).unwrap_or_default(),
    );

    let _ = event_bus.send(serde_json::to_value(event).unwrap_or_default());
}

/// Writes every published event to the log.
pub async fn start_event_listener(mut rx: broadcast::Receiver<Value>) {
    tracing::info!("Event listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
                let actor = event.get("actor_id").and_then(|v| v.as_str()).unwrap_or("system");
                let subject = event.get("subject_id").and_then(|v| v.as_i64());
                let severity = event.get("severity").and_then(|v| v.as_str()).unwrap_or("important");

                let description = match name {
                    "todo_item.created" => "Todo item created",
                    "todo_item.completed" => "Todo item completed",
                    "todo_item.deleted" => "Todo item deleted",
                    _ => "Domain event",
                };

                tracing::info!(event = name, actor, subject, severity, "{description}");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
