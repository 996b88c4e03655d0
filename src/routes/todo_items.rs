use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::commands::todo_items::{
    CreateTodoItem, DeleteTodoItem, GetTodoItemsWithPagination, UpdateTodoItem, UpdateTodoItemDetail,
};
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::todo_item::TodoItemPage;

fn ensure_ids_match(path_id: i64, body_id: i64) -> AppResult<()> {
    if path_id != body_id {
        return Err(AppError::bad_request("path id does not match body id"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/todo-items",
    tag = "TodoItems",
    security(("bearerAuth" = [])),
    params(GetTodoItemsWithPagination),
    responses(
        (status = 200, description = "One page of a list's items", body = TodoItemPage),
        (status = 403, description = "Not allowed to read this list")
    )
)]
pub async fn get_todo_items(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<GetTodoItemsWithPagination>,
) -> AppResult<Json<TodoItemPage>> {
    let page = state.mediator.send(caller, query).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/todo-items",
    tag = "TodoItems",
    security(("bearerAuth" = [])),
    request_body = CreateTodoItem,
    responses(
        (status = 201, description = "Item created, returns its id", body = i64),
        (status = 403, description = "Not allowed to edit the target list"),
        (status = 404, description = "List not found")
    )
)]
pub async fn create_todo_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(payload): Json<CreateTodoItem>,
) -> AppResult<(StatusCode, Json<i64>)> {
    let id = state.mediator.send(caller, payload).await?;
    Ok((StatusCode::CREATED, Json(id)))
}

#[utoipa::path(
    put,
    path = "/todo-items/{id}",
    tag = "TodoItems",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Todo item id")),
    request_body = UpdateTodoItem,
    responses(
        (status = 204, description = "Item updated"),
        (status = 400, description = "Path and body ids differ, or invalid title"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_todo_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTodoItem>,
) -> AppResult<StatusCode> {
    ensure_ids_match(id, payload.id)?;
    state.mediator.send(caller, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/todo-items/{id}/detail",
    tag = "TodoItems",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Todo item id")),
    request_body = UpdateTodoItemDetail,
    responses(
        (status = 204, description = "Item details updated"),
        (status = 400, description = "Path and body ids differ"),
        (status = 404, description = "Item or target list not found")
    )
)]
pub async fn update_todo_item_detail(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTodoItemDetail>,
) -> AppResult<StatusCode> {
    ensure_ids_match(id, payload.id)?;
    state.mediator.send(caller, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/todo-items/{id}",
    tag = "TodoItems",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Todo item id")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn delete_todo_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.mediator.send(caller, DeleteTodoItem { id }).await?;
    Ok(StatusCode::NO_CONTENT)
}
