use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{resources, AuthorizationBehaviour, ProviderPolicyEvaluator, ResourceRegistrar, SecurityCatalog};
use crate::commands::authorization_table;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_event_listener};
use crate::jwt::JwtConfig;
use crate::mediator::Mediator;
use crate::provider::ProtectionApi;
use crate::routes::{health, todo_items, todo_lists};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub mediator: Mediator,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, mediator: Mediator) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            mediator,
        }
    }
}

/// Wires the authorization pipeline to `provider` and builds the router.
///
/// The authorization table is checked against the catalog here, so a request
/// naming an unknown resource, scope or role fails startup.
pub async fn create_app(pool: SqlitePool, provider: Arc<dyn ProtectionApi>) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;

    let catalog = SecurityCatalog::todo()?;
    let table = authorization_table();
    table.validate(&catalog)?;

    let list_definition = catalog
        .resource(resources::TODO_ITEM)
        .cloned()
        .ok_or_else(|| AppError::configuration(format!("resource '{}' missing from catalog", resources::TODO_ITEM)))?;

    let evaluator = Arc::new(ProviderPolicyEvaluator::new(provider.clone()));
    let authz = AuthorizationBehaviour::new(Arc::new(table), evaluator);
    let registrar = ResourceRegistrar::new(provider, list_definition);

    let (events, rx) = init_event_bus();
    tokio::spawn(start_event_listener(rx));

    let mediator = Mediator::new(pool.clone(), authz, registrar, events);
    let state = AppState::new(pool, jwt_config, mediator);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let list_routes = Router::new()
        .route(
            "/",
            get(todo_lists::get_todos)
                .post(todo_lists::create_todo_list)
                .delete(todo_lists::purge_todo_lists),
        )
        .route("/priority-levels", get(todo_lists::get_priority_levels))
        .route(
            "/:id",
            put(todo_lists::update_todo_list).delete(todo_lists::delete_todo_list),
        );

    let item_routes = Router::new()
        .route("/", get(todo_items::get_todo_items).post(todo_items::create_todo_item))
        .route(
            "/:id",
            put(todo_items::update_todo_item).delete(todo_items::delete_todo_item),
        )
        .route("/:id/detail", put(todo_items::update_todo_item_detail));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/todo-lists", list_routes)
        .nest("/todo-items", item_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
