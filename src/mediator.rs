//! Request dispatch.
//!
//! Every command and query implements [`Request`] (a stable name, a response
//! type and optionally the protected resource it targets) and [`Handle`].
//! [`Mediator::send`] wraps each dispatch in a tracing span, runs the
//! authorization step and then the handler.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::authz::{AuthorizationBehaviour, HasResourceId, Principal, ResourceRegistrar};
use crate::errors::{AppError, AppResult};
use crate::events::EventBus;

const LONG_RUNNING: Duration = Duration::from_millis(500);

pub trait Request: Send + Sync + 'static {
    /// Key into the authorization table.
    const NAME: &'static str;
    type Response: Send + 'static;

    /// The protected resource this request targets, for resource-scoped
    /// requirements.
    fn resource(&self) -> Option<&dyn HasResourceId> {
        None
    }
}

#[async_trait]
pub trait Handle: Request + Sized {
    async fn handle(self, ctx: &RequestContext) -> AppResult<Self::Response>;
}

/// What a handler gets to work with.
#[derive(Clone)]
pub struct RequestContext {
    pub pool: SqlitePool,
    pub principal: Option<Principal>,
    pub authz: AuthorizationBehaviour,
    pub registrar: ResourceRegistrar,
    pub events: EventBus,
}

impl RequestContext {
    pub fn principal(&self) -> AppResult<&Principal> {
        self.principal
            .as_ref()
            .ok_or_else(|| AppError::unauthorized("authentication required"))
    }

    pub fn user_id(&self) -> AppResult<&str> {
        self.principal().map(|p| p.user_id.as_str())
    }

    /// Resource-scoped check from inside a handler.
    pub async fn authorize(&self, policy: &str) -> AppResult<()> {
        let principal = self.principal()?;
        self.authz.authorize(principal, policy).await
    }
}

#[derive(Clone)]
pub struct Mediator {
    pool: SqlitePool,
    authz: AuthorizationBehaviour,
    registrar: ResourceRegistrar,
    events: EventBus,
}

impl Mediator {
    pub fn new(pool: SqlitePool, authz: AuthorizationBehaviour, registrar: ResourceRegistrar, events: EventBus) -> Self {
        Self {
            pool,
            authz,
            registrar,
            events,
        }
    }

    pub async fn send<R: Handle>(&self, principal: Option<Principal>, request: R) -> AppResult<R::Response> {
        let user_id = principal
            .as_ref()
            .map(|p| p.user_id.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        let span = tracing::info_span!("request", name = R::NAME, user_id = %user_id);

        async move {
            let started = Instant::now();

            self.authz.check(principal.as_ref(), &request).await?;

            let ctx = RequestContext {
                pool: self.pool.clone(),
                principal,
                authz: self.authz.clone(),
                registrar: self.registrar.clone(),
                events: self.events.clone(),
            };
            let result = request.handle(&ctx).await;

            let elapsed = started.elapsed();
            if elapsed > LONG_RUNNING {
                tracing::warn!(elapsed_ms = elapsed.as_millis() as u64, "long running request");
            }
            if let Err(e) = &result {
                tracing::debug!(error = %e, "request failed");
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{resources, scopes, AuthorizationTable, ProviderPolicyEvaluator, Requirement, SecurityCatalog};
    use crate::events::init_event_bus;
    use crate::provider::InMemoryProvider;
    use std::sync::Arc;

    struct Ping;
    impl Request for Ping {
        const NAME: &'static str = "Ping";
        type Response = &'static str;
    }

    #[async_trait]
    impl Handle for Ping {
        async fn handle(self, _ctx: &RequestContext) -> AppResult<&'static str> {
            Ok("pong")
        }
    }

    struct ListTodos;
    impl Request for ListTodos {
        const NAME: &'static str = "ListTodos";
        type Response = Option<String>;
    }

    #[async_trait]
    impl Handle for ListTodos {
        async fn handle(self, ctx: &RequestContext) -> AppResult<Option<String>> {
            Ok(ctx.principal.as_ref().map(|p| p.user_id.clone()))
        }
    }

    fn mediator() -> (Arc<InMemoryProvider>, Mediator) {
        let catalog = SecurityCatalog::todo().unwrap();
        let definition = catalog.resource(resources::TODO_ITEM).unwrap().clone();
        let provider = Arc::new(InMemoryProvider::new(catalog));

        let table = AuthorizationTable::builder()
            .require::<ListTodos>(Requirement::protected(resources::TODO, scopes::LIST))
            .build();
        let authz = AuthorizationBehaviour::new(
            Arc::new(table),
            Arc::new(ProviderPolicyEvaluator::new(provider.clone())),
        );
        let registrar = ResourceRegistrar::new(provider.clone(), definition);
        let pool = SqlitePool::connect_lazy("sqlite::memory:").unwrap();
        let (events, _rx) = init_event_bus();

        (provider, Mediator::new(pool, authz, registrar, events))
    }

    #[tokio::test]
    async fn public_request_reaches_handler() {
        let (provider, mediator) = mediator();
        assert_eq!(mediator.send(None, Ping).await.unwrap(), "pong");
        assert_eq!(provider.authorize_calls(), 0);
    }

    #[tokio::test]
    async fn protected_request_needs_a_caller() {
        let (_, mediator) = mediator();
        let err = mediator.send(None, ListTodos).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn handler_sees_the_caller() {
        let (_, mediator) = mediator();
        let user = Principal::new("u1", "t").with_roles(vec!["User".to_string()]);
        assert_eq!(mediator.send(Some(user), ListTodos).await.unwrap().as_deref(), Some("u1"));
    }
}
