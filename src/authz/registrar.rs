//! Registration of owned entities as protected resources on the provider.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use super::catalog::ResourceDefinition;
use crate::errors::AppError;
use crate::provider::{ProtectedResource, ProtectionApi};

/// Subprocess name reported when registration fails after the entity was
/// written.
pub const AUTH_RESOURCE_CREATION: &str = "AuthResourceCreation";

const OWNER_ATTRIBUTE: &str = "Owner";

#[derive(Clone)]
pub struct ResourceRegistrar {
    provider: Arc<dyn ProtectionApi>,
    definition: Arc<ResourceDefinition>,
}

impl ResourceRegistrar {
    pub fn new(provider: Arc<dyn ProtectionApi>, definition: ResourceDefinition) -> Self {
        Self {
            provider,
            definition: Arc::new(definition),
        }
    }

    /// `TodoItem/42`
    pub fn key(&self, id: impl Display) -> String {
        format!("{}/{}", self.definition.name, id)
    }

    fn registration(&self, owner: &str, key: String) -> ProtectedResource {
        ProtectedResource {
            id: None,
            name: key,
            resource_type: self.definition.type_urn.clone(),
            owner: owner.to_string(),
            owner_managed_access: true,
            resource_scopes: self.definition.scopes.clone(),
            attributes: HashMap::from([(owner.to_string(), vec![OWNER_ATTRIBUTE.to_string()])]),
        }
    }

    /// Register entity `id` owned by `owner`. Returns the provider's id for
    /// the registration.
    pub async fn register(&self, owner: &str, id: impl Display) -> Result<String, AppError> {
        let key = self.key(id);
        if owner.trim().is_empty() {
            return Err(AppError::invalid_operation(format!(
                "cannot register '{key}' without an owner"
            )));
        }

        let resource = self.registration(owner, key.clone());
        match self.provider.create_resource(&resource).await {
            Ok(provider_id) => {
                tracing::info!(resource = %key, owner = %owner, provider_id = %provider_id, "resource registered");
                Ok(provider_id)
            }
            Err(e) => Err(AppError::subprocess_failure(
                AUTH_RESOURCE_CREATION,
                format!("could not register resource: {e}"),
                Some(key),
                Some(e),
            )),
        }
    }

    /// Register an entity that is already persisted; on failure run
    /// `compensate` to remove it again and return the registration error.
    ///
    /// Both phases run on a separate task so that dropping the caller's
    /// future cannot leave the entity written but unregistered.
    pub async fn register_or_compensate<F, Fut>(&self, owner: &str, id: i64, compensate: F) -> Result<String, AppError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let registrar = self.clone();
        let owner = owner.to_string();

        let task = tokio::spawn(async move {
            match registrar.register(&owner, id).await {
                Ok(provider_id) => Ok(provider_id),
                Err(err) => {
                    let key = registrar.key(id);
                    match compensate().await {
                        Ok(()) => tracing::warn!(resource = %key, error = %err, "registration failed, entity removed"),
                        Err(rollback) => tracing::error!(
                            resource = %key,
                            error = %err,
                            rollback_error = %rollback,
                            "registration failed and entity could not be removed"
                        ),
                    }
                    Err(err)
                }
            }
        });

        task.await
            .map_err(|e| AppError::internal(format!("registration task failed: {e}")))?
    }

    /// Remove the registrations for entity `id`. Failures are logged.
    pub async fn unregister(&self, id: impl Display) {
        let key = self.key(id);
        let ids = match self.provider.find_resources(&key).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(resource = %key, error = %e, "could not look up registration for removal");
                return;
            }
        };

        for provider_id in ids {
            if let Err(e) = self.provider.delete_resource(&provider_id).await {
                tracing::warn!(resource = %key, provider_id = %provider_id, error = %e, "could not remove registration");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{resources, SecurityCatalog};
    use crate::provider::InMemoryProvider;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn registrar() -> (Arc<InMemoryProvider>, ResourceRegistrar) {
        let catalog = SecurityCatalog::todo().unwrap();
        let definition = catalog.resource(resources::TODO_ITEM).unwrap().clone();
        let provider = Arc::new(InMemoryProvider::new(catalog));
        (provider.clone(), ResourceRegistrar::new(provider, definition))
    }

    #[tokio::test]
    async fn registration_carries_owner_attribute() {
        let (provider, registrar) = registrar();
        registrar.register("user-1", 42).await.unwrap();

        let stored = provider.resource_by_name("TodoItem/42").unwrap();
        assert_eq!(stored.owner, "user-1");
        assert!(stored.owner_managed_access);
        assert_eq!(stored.resource_type, resources::TODO_ITEM_TYPE);
        assert_eq!(stored.attributes["user-1"], vec!["Owner".to_string()]);
        assert_eq!(stored.resource_scopes.len(), 5);
    }

    #[tokio::test]
    async fn empty_owner_is_invalid_operation() {
        let (provider, registrar) = registrar();
        let err = registrar.register("  ", 1).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
        assert_eq!(provider.registrations(), 0);
    }

    #[tokio::test]
    async fn failed_registration_runs_compensation() {
        let (provider, registrar) = registrar();
        provider.fail_resource_creation(true);

        let compensated = Arc::new(AtomicBool::new(false));
        let flag = compensated.clone();
        let err = registrar
            .register_or_compensate("user-1", 9, move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(compensated.load(Ordering::SeqCst));
        match err {
            AppError::SubprocessFailure { subprocess, context, .. } => {
                assert_eq!(subprocess, AUTH_RESOURCE_CREATION);
                assert_eq!(context.as_deref(), Some("TodoItem/9"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_registration_skips_compensation() {
        let (_, registrar) = registrar();
        let compensated = Arc::new(AtomicBool::new(false));
        let flag = compensated.clone();

        registrar
            .register_or_compensate("user-1", 3, move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert!(!compensated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unregister_removes_registration() {
        let (provider, registrar) = registrar();
        registrar.register("user-1", 5).await.unwrap();

        registrar.unregister(5).await;
        assert!(provider.resource_by_name("TodoItem/5").is_none());

        // Unknown keys are ignored.
        registrar.unregister(6).await;
    }
}
