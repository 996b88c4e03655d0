mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{admin_token, list_count, send, spawn_app, user_token, ADMIN, OTHER, OWNER};

#[tokio::test]
async fn anonymous_caller_is_rejected() -> Result<()> {
    let t = spawn_app().await?;

    let (status, body) = send(&t.app, "GET", "/todo-lists", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "body: {}", body);
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(t.provider.authorize_calls(), 0);

    let (status, _) = send(&t.app, "GET", "/todo-lists", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn priority_levels_need_no_authorization() -> Result<()> {
    let t = spawn_app().await?;

    let (status, body) = send(&t.app, "GET", "/todo-lists/priority-levels", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    let levels = body.as_array().cloned().unwrap_or_default();
    assert_eq!(levels.len(), 4);
    assert_eq!(levels[0], json!({"id": 0, "title": "None"}));
    assert_eq!(t.provider.authorize_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn created_list_is_registered_as_owned_by_creator() -> Result<()> {
    let t = spawn_app().await?;
    let token = user_token(OWNER);

    let (status, body) = send(&t.app, "POST", "/todo-lists", Some(&token), Some(json!({"title": "Groceries"}))).await?;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    let id = body.as_i64().expect("list id");

    let registration = t
        .provider
        .resource_by_name(&format!("TodoItem/{id}"))
        .expect("list registered with provider");
    assert_eq!(registration.owner, OWNER);
    assert_eq!(registration.attributes.get(OWNER), Some(&vec!["Owner".to_string()]));
    assert!(registration.resource_scopes.contains(&"TodoItem:Delete".to_string()));

    let (status, body) = send(&t.app, "GET", "/todo-lists", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lists"][0]["title"], "Groceries");
    assert_eq!(body["lists"][0]["colour"], "#FFFFFF");
    assert_eq!(body["priority_levels"].as_array().map(Vec::len), Some(4));
    Ok(())
}

#[tokio::test]
async fn failed_registration_removes_the_list() -> Result<()> {
    let t = spawn_app().await?;
    let token = user_token(OWNER);
    t.provider.fail_resource_creation(true);

    let (status, body) = send(&t.app, "POST", "/todo-lists", Some(&token), Some(json!({"title": "Doomed"}))).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "body: {}", body);
    assert_eq!(body["error"], "subprocess_failure");
    assert_eq!(body["subprocess"], "AuthResourceCreation");
    assert_eq!(body["context"], "TodoItem/1");

    assert_eq!(list_count(&t.pool).await?, 0);
    assert_eq!(t.provider.registrations(), 0);

    // The same title is free again once the provider recovers.
    t.provider.fail_resource_creation(false);
    let (status, _) = send(&t.app, "POST", "/todo-lists", Some(&token), Some(json!({"title": "Doomed"}))).await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn only_the_owner_may_delete_a_list() -> Result<()> {
    let t = spawn_app().await?;
    let owner = user_token(OWNER);
    let other = user_token(OTHER);

    let (_, body) = send(&t.app, "POST", "/todo-lists", Some(&owner), Some(json!({"title": "Mine"}))).await?;
    let id = body.as_i64().expect("list id");
    let uri = format!("/todo-lists/{id}");

    let (status, body) = send(&t.app, "DELETE", &uri, Some(&other), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "body: {}", body);
    assert_eq!(body["error"], "forbidden");
    assert_eq!(list_count(&t.pool).await?, 1);

    let (status, _) = send(&t.app, "DELETE", &uri, Some(&owner), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(list_count(&t.pool).await?, 0);
    assert!(t.provider.resource_by_name(&format!("TodoItem/{id}")).is_none());
    Ok(())
}

#[tokio::test]
async fn administrator_may_delete_any_list() -> Result<()> {
    let t = spawn_app().await?;
    let owner = user_token(OWNER);

    let (_, body) = send(&t.app, "POST", "/todo-lists", Some(&owner), Some(json!({"title": "Mine"}))).await?;
    let id = body.as_i64().expect("list id");

    let (status, _) = send(&t.app, "DELETE", &format!("/todo-lists/{id}"), Some(&admin_token(ADMIN)), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(list_count(&t.pool).await?, 0);
    Ok(())
}

#[tokio::test]
async fn update_checks_ids_then_ownership() -> Result<()> {
    let t = spawn_app().await?;
    let owner = user_token(OWNER);
    let other = user_token(OTHER);

    let (_, body) = send(&t.app, "POST", "/todo-lists", Some(&owner), Some(json!({"title": "Chores"}))).await?;
    let id = body.as_i64().expect("list id");
    let uri = format!("/todo-lists/{id}");
    let calls_before = t.provider.authorize_calls();

    let (status, body) = send(&t.app, "PUT", &uri, Some(&owner), Some(json!({"id": id + 1, "title": "x"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(t.provider.authorize_calls(), calls_before);

    let (status, _) = send(&t.app, "PUT", &uri, Some(&other), Some(json!({"id": id, "title": "Stolen"}))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&t.app, "PUT", &uri, Some(&owner), Some(json!({"id": id, "title": "Weekly chores"}))).await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["title"], "Weekly chores");
    assert_eq!(body["id"], id);

    // Authorization runs before the lookup, so an unknown list is a denial.
    let (status, _) = send(&t.app, "PUT", "/todo-lists/999", Some(&owner), Some(json!({"id": 999, "title": "x"}))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn titles_are_validated() -> Result<()> {
    let t = spawn_app().await?;
    let owner = user_token(OWNER);

    let (status, _) = send(&t.app, "POST", "/todo-lists", Some(&owner), Some(json!({"title": "Groceries"}))).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&t.app, "POST", "/todo-lists", Some(&owner), Some(json!({"title": "Groceries"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
    assert_eq!(body["error"], "validation");
    assert_eq!(body["errors"]["Title"][0], "'Title' must be unique.");

    let (status, body) = send(&t.app, "POST", "/todo-lists", Some(&owner), Some(json!({"title": ""}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["Title"][0], "'Title' must not be empty.");

    // Another user may reuse the title.
    let (status, _) = send(&t.app, "POST", "/todo-lists", Some(&user_token(OTHER)), Some(json!({"title": "Groceries"}))).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(t.provider.registrations(), 2);
    Ok(())
}

#[tokio::test]
async fn concurrent_duplicate_titles_yield_one_list() -> Result<()> {
    let t = spawn_app().await?;
    let owner = user_token(OWNER);
    let create = || send(&t.app, "POST", "/todo-lists", Some(&owner), Some(json!({"title": "Race"})));

    let (a, b, c, d) = tokio::join!(create(), create(), create(), create());
    let statuses: Vec<StatusCode> = [a?, b?, c?, d?].into_iter().map(|(status, _)| status).collect();

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1, "{statuses:?}");
    assert!(statuses.iter().all(|s| *s == StatusCode::CREATED || *s == StatusCode::BAD_REQUEST), "{statuses:?}");
    assert_eq!(list_count(&t.pool).await?, 1);
    Ok(())
}

#[tokio::test]
async fn purge_requires_administrator() -> Result<()> {
    let t = spawn_app().await?;
    let owner = user_token(OWNER);

    for title in ["One", "Two"] {
        let (status, _) = send(&t.app, "POST", "/todo-lists", Some(&owner), Some(json!({"title": title}))).await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = send(&t.app, "DELETE", "/todo-lists", Some(&owner), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(list_count(&t.pool).await?, 2);

    let (status, _) = send(&t.app, "DELETE", "/todo-lists", Some(&admin_token(ADMIN)), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(list_count(&t.pool).await?, 0);
    assert!(t.provider.resource_by_name("TodoItem/1").is_none());
    Ok(())
}

#[tokio::test]
async fn unreachable_provider_is_not_a_denial() -> Result<()> {
    let t = spawn_app().await?;
    t.provider.set_unavailable(true);

    let (status, body) = send(&t.app, "GET", "/todo-lists", Some(&user_token(OWNER)), None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "body: {}", body);
    assert_eq!(body["error"], Value::from("infrastructure_unavailable"));
    Ok(())
}
