//! Commands and queries of the todo API, and the authorization each one
//! declares.

pub mod todo_items;
pub mod todo_lists;

use crate::authz::{resources, roles, scopes, AuthorizationTable, ProtectedResourcePolicy, Requirement};
use crate::errors::{AppError, AppResult};
use crate::models::todo_list::MAX_TITLE_LENGTH;

use todo_items::{
    CreateTodoItem, DeleteTodoItem, GetTodoItemsWithPagination, UpdateTodoItem, UpdateTodoItemDetail,
};
use todo_lists::{CreateTodoList, DeleteTodoList, GetTodos, PurgeTodoLists, UpdateTodoList};

/// Requests not listed here (e.g. `GetPriorityLevels`) are public.
pub fn authorization_table() -> AuthorizationTable {
    AuthorizationTable::builder()
        .require::<GetTodos>(Requirement::protected(resources::TODO, scopes::LIST))
        .require::<CreateTodoList>(Requirement::protected(resources::TODO, scopes::CREATE))
        .require::<UpdateTodoList>(Requirement::protected(resources::TODO, scopes::EDIT))
        .require::<UpdateTodoList>(Requirement::protected_from_request(resources::TODO_ITEM, scopes::EDIT))
        .require::<DeleteTodoList>(Requirement::protected_from_request(resources::TODO_ITEM, scopes::DELETE))
        .require::<PurgeTodoLists>(Requirement::roles(&[roles::ADMINISTRATOR]))
        .require::<PurgeTodoLists>(Requirement::protected(resources::TODO, scopes::DELETE))
        .require::<GetTodoItemsWithPagination>(Requirement::protected(resources::TODO, scopes::LIST))
        .require::<GetTodoItemsWithPagination>(Requirement::protected_from_request(
            resources::TODO_ITEM,
            scopes::READ,
        ))
        .require::<CreateTodoItem>(Requirement::protected(resources::TODO, scopes::CREATE))
        .require::<CreateTodoItem>(Requirement::protected_from_request(resources::TODO_ITEM, scopes::EDIT))
        .require::<UpdateTodoItem>(Requirement::protected(resources::TODO, scopes::EDIT))
        .require::<UpdateTodoItemDetail>(Requirement::protected(resources::TODO, scopes::EDIT))
        .require::<DeleteTodoItem>(Requirement::protected(resources::TODO, scopes::EDIT))
        .build()
}

/// Policy for `verb` on todo list `list_id`.
pub(crate) fn list_policy(list_id: i64, verb: &str) -> String {
    ProtectedResourcePolicy::for_instance(
        resources::TODO_ITEM,
        &list_id.to_string(),
        &scopes::qualified(resources::TODO_ITEM, verb),
    )
}

pub(crate) fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation("Title", "'Title' must not be empty."));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::validation(
            "Title",
            format!("The length of 'Title' must be {MAX_TITLE_LENGTH} characters or fewer."),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::SecurityCatalog;

    #[test]
    fn table_matches_catalog() {
        let catalog = SecurityCatalog::todo().unwrap();
        authorization_table().validate(&catalog).unwrap();
    }

    #[test]
    fn priority_levels_are_public() {
        let table = authorization_table();
        assert!(table.requirements("GetPriorityLevels").is_empty());
        assert_eq!(table.requirements("PurgeTodoLists").len(), 2);
    }

    #[test]
    fn list_policy_names_the_instance() {
        assert_eq!(list_policy(12, scopes::EDIT), "TodoItem/12#TodoItem:Edit");
    }

    #[test]
    fn titles_are_bounded() {
        assert!(validate_title("Groceries").is_ok());
        assert!(matches!(validate_title("   "), Err(AppError::Validation(_))));
        assert!(matches!(validate_title(&"x".repeat(201)), Err(AppError::Validation(_))));
        assert!(validate_title(&"x".repeat(200)).is_ok());
    }
}
