use serde_json::Value;

#[test]
fn openapi_documents_todo_endpoints() -> anyhow::Result<()> {
    // Build the OpenAPI document the same way the server does
    let doc = todo_authz::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let paths = v.get("paths").and_then(Value::as_object).expect("paths must exist");
    for path in [
        "/api/health",
        "/todo-lists",
        "/todo-lists/priority-levels",
        "/todo-lists/{id}",
        "/todo-items",
        "/todo-items/{id}",
        "/todo-items/{id}/detail",
    ] {
        assert!(paths.contains_key(path), "OpenAPI missing path '{}'", path);
    }

    let list_ops = paths["/todo-lists"].as_object().expect("operations");
    for method in ["get", "post", "delete"] {
        assert!(list_ops.contains_key(method), "/todo-lists missing '{}'", method);
    }

    let props = v
        .pointer("/components/schemas/TodoItem/properties")
        .and_then(Value::as_object)
        .expect("components.schemas.TodoItem.properties must exist");
    for k in ["list_id", "title", "note", "priority", "done"] {
        assert!(props.contains_key(k), "OpenAPI TodoItem schema missing '{}'", k);
    }

    assert!(v.pointer("/components/securitySchemes/bearerAuth").is_some());
    Ok(())
}
