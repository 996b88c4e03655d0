use serde::{Deserialize, Serialize};

/// Severity levels for domain events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Destructive changes
    Critical,
    #[default]
    Important,
}

/// Trait for entities whose changes are published as domain events.
pub trait Loggable: Serialize + Send + Sync {
    /// The entity type name (e.g., "todo_item").
    /// This becomes the prefix in event names like "todo_item.created"
    fn entity_type() -> &'static str;

    /// The subject ID (usually the entity's primary key)
    fn subject_id(&self) -> i64;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Override severity based on action (e.g., "deleted" -> Critical)
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            "created" | "completed" => self.severity(),
            _ => Severity::Important,
        }
    }
}
