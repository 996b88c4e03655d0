use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::LookupDto;
use crate::errors::AppError;
use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PriorityLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 4] = [Self::None, Self::Low, Self::Medium, Self::High];

    pub fn as_i64(self) -> i64 {
        match self {
            PriorityLevel::None => 0,
            PriorityLevel::Low => 1,
            PriorityLevel::Medium => 2,
            PriorityLevel::High => 3,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            PriorityLevel::None => "None",
            PriorityLevel::Low => "Low",
            PriorityLevel::Medium => "Medium",
            PriorityLevel::High => "High",
        }
    }

    pub fn lookups() -> Vec<LookupDto> {
        Self::ALL
            .iter()
            .map(|p| LookupDto {
                id: p.as_i64(),
                title: p.title().to_string(),
            })
            .collect()
    }
}

impl TryFrom<i64> for PriorityLevel {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_i64() == value)
            .ok_or_else(|| AppError::internal(format!("invalid priority level {value}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TodoItem {
    pub id: i64,
    pub list_id: i64,
    pub title: String,
    pub note: Option<String>,
    pub priority: PriorityLevel,
    pub reminder: Option<DateTime<Utc>>,
    pub done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTodoItem {
    pub id: i64,
    pub list_id: i64,
    pub title: String,
    pub note: Option<String>,
    pub priority: i64,
    pub reminder: Option<DateTime<Utc>>,
    pub done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbTodoItem> for TodoItem {
    type Error = AppError;

    fn try_from(value: DbTodoItem) -> Result<Self, Self::Error> {
        Ok(TodoItem {
            id: value.id,
            list_id: value.list_id,
            title: value.title,
            note: value.note,
            priority: PriorityLevel::try_from(value.priority)?,
            reminder: value.reminder,
            done: value.done,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl Loggable for TodoItem {
    fn entity_type() -> &'static str {
        "todo_item"
    }

    fn subject_id(&self) -> i64 {
        self.id
    }

    fn severity(&self) -> Severity {
        if self.priority == PriorityLevel::High {
            Severity::Critical
        } else {
            Severity::Important
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TodoItemBrief {
    pub id: i64,
    pub list_id: i64,
    pub title: String,
    pub done: bool,
}

impl From<TodoItem> for TodoItemBrief {
    fn from(value: TodoItem) -> Self {
        Self {
            id: value.id,
            list_id: value.list_id,
            title: value.title,
            done: value.done,
        }
    }
}

/// One page of a list's items, ordered by title.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TodoItemPage {
    pub items: Vec<TodoItemBrief>,
    pub page_number: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

pub const SELECT_TODO_ITEM: &str =
    "SELECT id, list_id, title, note, priority, reminder, done, created_at, updated_at FROM todo_items";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_levels_round_trip_through_storage() {
        for level in PriorityLevel::ALL {
            assert_eq!(PriorityLevel::try_from(level.as_i64()).unwrap(), level);
        }
        assert!(PriorityLevel::try_from(7).is_err());
    }

    #[test]
    fn lookups_list_every_level_in_order() {
        let lookups = PriorityLevel::lookups();
        assert_eq!(lookups.len(), 4);
        assert_eq!(lookups[3], LookupDto { id: 3, title: "High".to_string() });
    }
}
