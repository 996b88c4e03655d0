use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use super::validate_title;
use crate::authz::HasResourceId;
use crate::errors::{AppError, AppResult};
use crate::mediator::{Handle, Request, RequestContext};
use crate::models::todo_item::{DbTodoItem, TodoItem, SELECT_TODO_ITEM};
use crate::models::todo_list::{TodoList, TodoListDto, TodosVm, DEFAULT_COLOUR, SELECT_TODO_LIST};
use crate::models::LookupDto;
use crate::models::todo_item::PriorityLevel;
use crate::utils::utc_now;

pub(crate) async fn fetch_list(pool: &SqlitePool, id: i64) -> AppResult<TodoList> {
    sqlx::query_as::<_, TodoList>(&format!("{SELECT_TODO_LIST} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("TodoList ({id}) was not found.")))
}

async fn fetch_items(pool: &SqlitePool, list_id: i64) -> AppResult<Vec<TodoItem>> {
    sqlx::query_as::<_, DbTodoItem>(&format!("{SELECT_TODO_ITEM} WHERE list_id = ? ORDER BY title"))
        .bind(list_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(TodoItem::try_from)
        .collect()
}

/// Titles are unique among one creator's lists.
async fn ensure_unique_title(pool: &SqlitePool, owner: &str, title: &str, except: Option<i64>) -> AppResult<()> {
    let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM todo_lists WHERE created_by = ? AND title = ?")
        .bind(owner)
        .bind(title)
        .fetch_optional(pool)
        .await?;

    match taken {
        Some(id) if Some(id) != except => Err(title_taken()),
        _ => Ok(()),
    }
}

fn title_taken() -> AppError {
    AppError::validation("Title", "'Title' must be unique.")
}

/// A writer that raced past `ensure_unique_title` hits the table's UNIQUE
/// constraint instead; report that the same way.
fn unique_title_violation(err: sqlx::Error) -> AppError {
    if err.as_database_error().is_some_and(|db| db.is_unique_violation()) {
        return title_taken();
    }
    AppError::Database(err)
}

/// The caller's lists with their items.
#[derive(Debug, Clone, Default)]
pub struct GetTodos;

impl Request for GetTodos {
    const NAME: &'static str = "GetTodos";
    type Response = TodosVm;
}

#[async_trait]
impl Handle for GetTodos {
    async fn handle(self, ctx: &RequestContext) -> AppResult<TodosVm> {
        let user_id = ctx.user_id()?;

        let lists = sqlx::query_as::<_, TodoList>(&format!("{SELECT_TODO_LIST} WHERE created_by = ? ORDER BY title"))
            .bind(user_id)
            .fetch_all(&ctx.pool)
            .await?;

        let rows = sqlx::query_as::<_, DbTodoItem>(
            "SELECT i.id, i.list_id, i.title, i.note, i.priority, i.reminder, i.done, i.created_at, i.updated_at \
             FROM todo_items i JOIN todo_lists l ON l.id = i.list_id WHERE l.created_by = ? ORDER BY i.title",
        )
        .bind(user_id)
        .fetch_all(&ctx.pool)
        .await?;

        let mut items: HashMap<i64, Vec<TodoItem>> = HashMap::new();
        for row in rows {
            let item = TodoItem::try_from(row)?;
            items.entry(item.list_id).or_default().push(item);
        }

        let lists = lists
            .into_iter()
            .map(|list| {
                let list_items = items.remove(&list.id).unwrap_or_default();
                TodoListDto::new(list, list_items)
            })
            .collect();

        Ok(TodosVm {
            priority_levels: PriorityLevel::lookups(),
            lists,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetPriorityLevels;

impl Request for GetPriorityLevels {
    const NAME: &'static str = "GetPriorityLevels";
    type Response = Vec<LookupDto>;
}

#[async_trait]
impl Handle for GetPriorityLevels {
    async fn handle(self, _ctx: &RequestContext) -> AppResult<Vec<LookupDto>> {
        Ok(PriorityLevel::lookups())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTodoList {
    #[schema(example = "Groceries")]
    pub title: String,
}

impl Request for CreateTodoList {
    const NAME: &'static str = "CreateTodoList";
    type Response = i64;
}

#[async_trait]
impl Handle for CreateTodoList {
    /// Persists the list, then registers it with the provider as owned by
    /// the caller. A failed registration deletes the list again.
    async fn handle(self, ctx: &RequestContext) -> AppResult<i64> {
        let owner = ctx.user_id()?.to_string();
        validate_title(&self.title)?;
        ensure_unique_title(&ctx.pool, &owner, &self.title, None).await?;

        let now = utc_now();
        let id = sqlx::query(
            "INSERT INTO todo_lists (title, colour, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&self.title)
        .bind(DEFAULT_COLOUR)
        .bind(&owner)
        .bind(now)
        .bind(now)
        .execute(&ctx.pool)
        .await
        .map_err(unique_title_violation)?
        .last_insert_rowid();

        let pool = ctx.pool.clone();
        ctx.registrar
            .register_or_compensate(&owner, id, move || async move {
                sqlx::query("DELETE FROM todo_lists WHERE id = ?")
                    .bind(id)
                    .execute(&pool)
                    .await?;
                Ok::<(), AppError>(())
            })
            .await?;

        Ok(id)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateTodoList {
    pub id: i64,
    #[schema(example = "Weekend groceries")]
    pub title: String,
}

impl HasResourceId for UpdateTodoList {
    fn resource_id(&self) -> String {
        self.id.to_string()
    }
}

impl Request for UpdateTodoList {
    const NAME: &'static str = "UpdateTodoList";
    type Response = TodoListDto;

    fn resource(&self) -> Option<&dyn HasResourceId> {
        Some(self)
    }
}

#[async_trait]
impl Handle for UpdateTodoList {
    async fn handle(self, ctx: &RequestContext) -> AppResult<TodoListDto> {
        validate_title(&self.title)?;
        let mut list = fetch_list(&ctx.pool, self.id).await?;
        ensure_unique_title(&ctx.pool, &list.created_by, &self.title, Some(list.id)).await?;

        let now = utc_now();
        sqlx::query("UPDATE todo_lists SET title = ?, updated_at = ? WHERE id = ?")
            .bind(&self.title)
            .bind(now)
            .bind(list.id)
            .execute(&ctx.pool)
            .await
            .map_err(unique_title_violation)?;

        list.title = self.title;
        list.updated_at = now;
        let items = fetch_items(&ctx.pool, list.id).await?;
        Ok(TodoListDto::new(list, items))
    }
}

#[derive(Debug, Clone)]
pub struct DeleteTodoList {
    pub id: i64,
}

impl HasResourceId for DeleteTodoList {
    fn resource_id(&self) -> String {
        self.id.to_string()
    }
}

impl Request for DeleteTodoList {
    const NAME: &'static str = "DeleteTodoList";
    type Response = ();

    fn resource(&self) -> Option<&dyn HasResourceId> {
        Some(self)
    }
}

#[async_trait]
impl Handle for DeleteTodoList {
    async fn handle(self, ctx: &RequestContext) -> AppResult<()> {
        let list = fetch_list(&ctx.pool, self.id).await?;

        sqlx::query("DELETE FROM todo_lists WHERE id = ?")
            .bind(list.id)
            .execute(&ctx.pool)
            .await?;

        ctx.registrar.unregister(list.id).await;
        Ok(())
    }
}

/// Removes every list of every user.
#[derive(Debug, Clone, Default)]
pub struct PurgeTodoLists;

impl Request for PurgeTodoLists {
    const NAME: &'static str = "PurgeTodoLists";
    type Response = ();
}

#[async_trait]
impl Handle for PurgeTodoLists {
    async fn handle(self, ctx: &RequestContext) -> AppResult<()> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM todo_lists")
            .fetch_all(&ctx.pool)
            .await?;

        sqlx::query("DELETE FROM todo_lists").execute(&ctx.pool).await?;
        tracing::info!(count = ids.len(), "todo lists purged");

        for id in ids {
            ctx.registrar.unregister(id).await;
        }
        Ok(())
    }
}
