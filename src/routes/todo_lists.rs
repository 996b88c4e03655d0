use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::commands::todo_lists::{
    CreateTodoList, DeleteTodoList, GetPriorityLevels, GetTodos, PurgeTodoLists, UpdateTodoList,
};
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::todo_list::{TodoListDto, TodosVm};
use crate::models::LookupDto;

#[utoipa::path(
    get,
    path = "/todo-lists",
    tag = "TodoLists",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "The caller's lists with their items", body = TodosVm),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not allowed to list todos")
    )
)]
pub async fn get_todos(State(state): State<AppState>, Caller(caller): Caller) -> AppResult<Json<TodosVm>> {
    let vm = state.mediator.send(caller, GetTodos).await?;
    Ok(Json(vm))
}

#[utoipa::path(
    get,
    path = "/todo-lists/priority-levels",
    tag = "TodoLists",
    responses((status = 200, description = "Priority levels", body = [LookupDto]))
)]
pub async fn get_priority_levels(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> AppResult<Json<Vec<LookupDto>>> {
    let levels = state.mediator.send(caller, GetPriorityLevels).await?;
    Ok(Json(levels))
}

#[utoipa::path(
    post,
    path = "/todo-lists",
    tag = "TodoLists",
    security(("bearerAuth" = [])),
    request_body = CreateTodoList,
    responses(
        (status = 201, description = "List created, returns its id", body = i64),
        (status = 400, description = "Invalid title"),
        (status = 500, description = "Registration with the authorization provider failed")
    )
)]
pub async fn create_todo_list(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(payload): Json<CreateTodoList>,
) -> AppResult<(StatusCode, Json<i64>)> {
    let id = state.mediator.send(caller, payload).await?;
    Ok((StatusCode::CREATED, Json(id)))
}

#[utoipa::path(
    put,
    path = "/todo-lists/{id}",
    tag = "TodoLists",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Todo list id")),
    request_body = UpdateTodoList,
    responses(
        (status = 200, description = "List updated", body = TodoListDto),
        (status = 400, description = "Path and body ids differ, or invalid title"),
        (status = 403, description = "Not allowed to edit this list")
    )
)]
pub async fn update_todo_list(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTodoList>,
) -> AppResult<Json<TodoListDto>> {
    if payload.id != id {
        return Err(AppError::bad_request("path id does not match body id"));
    }

    let dto = state.mediator.send(caller, payload).await?;
    Ok(Json(dto))
}

#[utoipa::path(
    delete,
    path = "/todo-lists/{id}",
    tag = "TodoLists",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Todo list id")),
    responses(
        (status = 204, description = "List deleted"),
        (status = 403, description = "Not allowed to delete this list")
    )
)]
pub async fn delete_todo_list(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.mediator.send(caller, DeleteTodoList { id }).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/todo-lists",
    tag = "TodoLists",
    security(("bearerAuth" = [])),
    responses(
        (status = 204, description = "All lists removed"),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn purge_todo_lists(State(state): State<AppState>, Caller(caller): Caller) -> AppResult<StatusCode> {
    state.mediator.send(caller, PurgeTodoLists).await?;
    Ok(StatusCode::NO_CONTENT)
}
