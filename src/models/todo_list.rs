use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::todo_item::TodoItem;
use super::LookupDto;

pub const DEFAULT_COLOUR: &str = "#FFFFFF";
pub const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TodoList {
    pub id: i64,
    pub title: String,
    pub colour: String,
    /// Provider subject id of the creator, who owns the list
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TodoListDto {
    pub id: i64,
    pub title: String,
    pub colour: String,
    pub items: Vec<TodoItem>,
}

impl TodoListDto {
    pub fn new(list: TodoList, items: Vec<TodoItem>) -> Self {
        Self {
            id: list.id,
            title: list.title,
            colour: list.colour,
            items,
        }
    }
}

/// The caller's lists plus the lookups a client needs to render them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TodosVm {
    pub priority_levels: Vec<LookupDto>,
    pub lists: Vec<TodoListDto>,
}

pub const SELECT_TODO_LIST: &str = "SELECT id, title, colour, created_by, created_at, updated_at FROM todo_lists";
