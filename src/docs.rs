use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::commands::{todo_items, todo_lists};
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::todo_lists::get_todos,
		routes::todo_lists::get_priority_levels,
		routes::todo_lists::create_todo_list,
		routes::todo_lists::update_todo_list,
		routes::todo_lists::delete_todo_list,
		routes::todo_lists::purge_todo_lists,
		routes::todo_items::get_todo_items,
		routes::todo_items::create_todo_item,
		routes::todo_items::update_todo_item,
		routes::todo_items::update_todo_item_detail,
		routes::todo_items::delete_todo_item
	),
	components(
		schemas(
			routes::health::HealthResponse,
			models::LookupDto,
			models::todo_item::PriorityLevel,
			models::todo_item::TodoItem,
			models::todo_item::TodoItemBrief,
			models::todo_item::TodoItemPage,
			models::todo_list::TodoList,
			models::todo_list::TodoListDto,
			models::todo_list::TodosVm,
			todo_lists::CreateTodoList,
			todo_lists::UpdateTodoList,
			todo_items::CreateTodoItem,
			todo_items::UpdateTodoItem,
			todo_items::UpdateTodoItemDetail
		)
	),
	tags(
		(name = "Health", description = "Service health"),
		(name = "TodoLists", description = "Todo lists, each registered as a protected resource"),
		(name = "TodoItems", description = "Items; access follows the owning list")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc)?;
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(doc: &mut Value) -> anyhow::Result<()> {
	let root = doc
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI root must be an object"))?;

	let schemes = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("components must be an object"))?
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("securitySchemes must be an object"))?;

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT",
			"description": "Access token issued by the identity provider"
		}),
	);

	Ok(())
}

fn add_examples(doc: &mut Value) {
	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else { continue; };
		for operation in operations.values_mut() {
			apply_request_example(operation);
		}
	}
}

fn apply_request_example(operation: &mut Value) {
	let Some(app_json) = operation
		.pointer_mut("/requestBody/content/application~1json")
		.and_then(Value::as_object_mut)
	else {
		return;
	};
	let Some(reference) = app_json.get("schema").and_then(|s| s.get("$ref")).and_then(Value::as_str) else {
		return;
	};

	let example = match reference {
		"#/components/schemas/CreateTodoList" => json!({ "title": "Groceries" }),
		"#/components/schemas/UpdateTodoList" => json!({ "id": 1, "title": "Weekend groceries" }),
		"#/components/schemas/CreateTodoItem" => json!({ "list_id": 1, "title": "Buy milk" }),
		"#/components/schemas/UpdateTodoItem" => json!({ "id": 1, "title": "Buy oat milk", "done": true }),
		"#/components/schemas/UpdateTodoItemDetail" => json!({
			"id": 1,
			"list_id": 1,
			"priority": "High",
			"note": "Before Friday"
		}),
		_ => return,
	};

	app_json.insert("example".to_string(), example);
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
