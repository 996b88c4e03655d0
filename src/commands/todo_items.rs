//! Todo item commands.
//!
//! Items are not registered with the provider themselves; access follows the
//! owning list. Requests that only carry an item id resolve the list first and
//! check it from inside the handler.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use super::todo_lists::fetch_list;
use super::{list_policy, validate_title};
use crate::authz::{scopes, HasResourceId};
use crate::errors::{AppError, AppResult};
use crate::events::publish;
use crate::mediator::{Handle, Request, RequestContext};
use crate::models::todo_item::{DbTodoItem, PriorityLevel, TodoItem, TodoItemBrief, TodoItemPage, SELECT_TODO_ITEM};
use crate::utils::{total_pages, utc_now};

async fn fetch_item(pool: &SqlitePool, id: i64) -> AppResult<TodoItem> {
    let row = sqlx::query_as::<_, DbTodoItem>(&format!("{SELECT_TODO_ITEM} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("TodoItem ({id}) was not found.")))?;
    TodoItem::try_from(row)
}

fn default_page_number() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

pub const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GetTodoItemsWithPagination {
    pub list_id: i64,
    #[serde(default = "default_page_number")]
    pub page_number: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl HasResourceId for GetTodoItemsWithPagination {
    fn resource_id(&self) -> String {
        self.list_id.to_string()
    }
}

impl Request for GetTodoItemsWithPagination {
    const NAME: &'static str = "GetTodoItemsWithPagination";
    type Response = TodoItemPage;

    fn resource(&self) -> Option<&dyn HasResourceId> {
        Some(self)
    }
}

#[async_trait]
impl Handle for GetTodoItemsWithPagination {
    async fn handle(self, ctx: &RequestContext) -> AppResult<TodoItemPage> {
        if self.page_number < 1 {
            return Err(AppError::validation("PageNumber", "'Page Number' must be greater than or equal to '1'."));
        }
        if self.page_size < 1 {
            return Err(AppError::validation("PageSize", "'Page Size' must be greater than or equal to '1'."));
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::validation(
                "PageSize",
                format!("'Page Size' must be less than or equal to '{MAX_PAGE_SIZE}'."),
            ));
        }
        let offset = (self.page_number - 1)
            .checked_mul(self.page_size)
            .ok_or_else(|| AppError::validation("PageNumber", "'Page Number' is out of range."))?;

        let total_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM todo_items WHERE list_id = ?")
            .bind(self.list_id)
            .fetch_one(&ctx.pool)
            .await?;

        let rows = sqlx::query_as::<_, DbTodoItem>(&format!(
            "{SELECT_TODO_ITEM} WHERE list_id = ? ORDER BY title LIMIT ? OFFSET ?"
        ))
        .bind(self.list_id)
        .bind(self.page_size)
        .bind(offset)
        .fetch_all(&ctx.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| TodoItem::try_from(row).map(TodoItemBrief::from))
            .collect::<Result<Vec<_>, _>>()?;

        let pages = total_pages(total_count, self.page_size);
        Ok(TodoItemPage {
            items,
            page_number: self.page_number,
            total_pages: pages,
            total_count,
            has_previous_page: self.page_number > 1,
            has_next_page: self.page_number < pages,
        })
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTodoItem {
    pub list_id: i64,
    #[schema(example = "Buy milk")]
    pub title: String,
}

impl HasResourceId for CreateTodoItem {
    fn resource_id(&self) -> String {
        self.list_id.to_string()
    }
}

impl Request for CreateTodoItem {
    const NAME: &'static str = "CreateTodoItem";
    type Response = i64;

    fn resource(&self) -> Option<&dyn HasResourceId> {
        Some(self)
    }
}

#[async_trait]
impl Handle for CreateTodoItem {
    async fn handle(self, ctx: &RequestContext) -> AppResult<i64> {
        validate_title(&self.title)?;
        fetch_list(&ctx.pool, self.list_id).await?;

        let now = utc_now();
        let id = sqlx::query(
            "INSERT INTO todo_items (list_id, title, priority, done, created_at, updated_at) VALUES (?, ?, ?, 0, ?, ?)",
        )
        .bind(self.list_id)
        .bind(&self.title)
        .bind(PriorityLevel::None.as_i64())
        .bind(now)
        .bind(now)
        .execute(&ctx.pool)
        .await?
        .last_insert_rowid();

        let item = fetch_item(&ctx.pool, id).await?;
        publish(&ctx.events, "created", ctx.principal.as_ref().map(|p| p.user_id.as_str()), &item);
        Ok(id)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateTodoItem {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

impl Request for UpdateTodoItem {
    const NAME: &'static str = "UpdateTodoItem";
    type Response = ();
}

#[async_trait]
impl Handle for UpdateTodoItem {
    async fn handle(self, ctx: &RequestContext) -> AppResult<()> {
        validate_title(&self.title)?;
        let mut item = fetch_item(&ctx.pool, self.id).await?;
        ctx.authorize(&list_policy(item.list_id, scopes::EDIT)).await?;

        let completed = !item.done && self.done;
        let now = utc_now();
        sqlx::query("UPDATE todo_items SET title = ?, done = ?, updated_at = ? WHERE id = ?")
            .bind(&self.title)
            .bind(self.done)
            .bind(now)
            .bind(item.id)
            .execute(&ctx.pool)
            .await?;

        if completed {
            item.title = self.title;
            item.done = true;
            item.updated_at = now;
            publish(&ctx.events, "completed", Some(ctx.user_id()?), &item);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateTodoItemDetail {
    pub id: i64,
    /// Target list; moving an item needs edit access to both lists
    pub list_id: i64,
    #[serde(default)]
    pub priority: PriorityLevel,
    pub note: Option<String>,
}

impl Request for UpdateTodoItemDetail {
    const NAME: &'static str = "UpdateTodoItemDetail";
    type Response = ();
}

#[async_trait]
impl Handle for UpdateTodoItemDetail {
    async fn handle(self, ctx: &RequestContext) -> AppResult<()> {
        let item = fetch_item(&ctx.pool, self.id).await?;
        ctx.authorize(&list_policy(item.list_id, scopes::EDIT)).await?;

        if self.list_id != item.list_id {
            ctx.authorize(&list_policy(self.list_id, scopes::EDIT)).await?;
            fetch_list(&ctx.pool, self.list_id).await?;
        }

        sqlx::query("UPDATE todo_items SET list_id = ?, priority = ?, note = ?, updated_at = ? WHERE id = ?")
            .bind(self.list_id)
            .bind(self.priority.as_i64())
            .bind(&self.note)
            .bind(utc_now())
            .bind(item.id)
            .execute(&ctx.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeleteTodoItem {
    pub id: i64,
}

impl Request for DeleteTodoItem {
    const NAME: &'static str = "DeleteTodoItem";
    type Response = ();
}

#[async_trait]
impl Handle for DeleteTodoItem {
    async fn handle(self, ctx: &RequestContext) -> AppResult<()> {
        let item = fetch_item(&ctx.pool, self.id).await?;
        ctx.authorize(&list_policy(item.list_id, scopes::EDIT)).await?;

        sqlx::query("DELETE FROM todo_items WHERE id = ?")
            .bind(item.id)
            .execute(&ctx.pool)
            .await?;

        publish(&ctx.events, "deleted", Some(ctx.user_id()?), &item);
        Ok(())
    }
}
