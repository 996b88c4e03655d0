//! In-process provider that evaluates the security catalog directly.
//!
//! Used when `AUTH_PROVIDER=memory` and by the test suite. Decisions follow
//! what the remote server does with the seeded configuration: every
//! permission covering the requested resource and scope is evaluated with its
//! decision strategy, and all applicable permissions must grant.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::error::ProviderError;
use super::types::{
    ClientRepresentation, PolicyRepresentation, ProtectedResource, ResourceRepresentation, RoleRepresentation,
    ScopeRepresentation,
};
use super::{AdminApi, ProtectionApi};
use crate::authz::{
    Permission, PermissionTarget, Policy, PolicyKind, Principal, ProtectedResourcePolicy, SecurityCatalog,
};

/// True when `attributes` holds `user_id` with a value mentioning "owner"
/// (case-insensitive).
pub fn is_owner(attributes: &HashMap<String, Vec<String>>, user_id: &str) -> bool {
    attributes
        .get(user_id)
        .map(|values| values.iter().any(|v| v.to_lowercase().contains("owner")))
        .unwrap_or(false)
}

#[derive(Default)]
struct State {
    /// Protection API registrations by provider id
    resources: HashMap<String, ProtectedResource>,
    clients: Vec<ClientRepresentation>,
    roles: HashMap<String, Vec<RoleRepresentation>>,
    scopes: HashMap<String, Vec<ScopeRepresentation>>,
    resource_definitions: HashMap<String, Vec<ResourceRepresentation>>,
    policies: HashMap<String, Vec<PolicyRepresentation>>,

    fail_resource_creation: bool,
    unavailable: bool,
    failing_ops: Vec<&'static str>,
}

pub struct InMemoryProvider {
    catalog: SecurityCatalog,
    state: Mutex<State>,
    authorize_calls: AtomicUsize,
    registrations: AtomicUsize,
}

impl InMemoryProvider {
    pub fn new(catalog: SecurityCatalog) -> Self {
        Self {
            catalog,
            state: Mutex::new(State::default()),
            authorize_calls: AtomicUsize::new(0),
            registrations: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent `create_resource` call fail.
    pub fn fail_resource_creation(&self, fail: bool) {
        self.state().fail_resource_creation = fail;
    }

    /// Simulate an unreachable server: every call returns a 503.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Make one admin operation (e.g. `"create_role"`) fail with a 500.
    pub fn fail_on(&self, op: &'static str) {
        self.state().failing_ops.push(op);
    }

    /// Number of decision requests received.
    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    /// Number of successful resource registrations.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn resource_by_name(&self, name: &str) -> Option<ProtectedResource> {
        self.state().resources.values().find(|r| r.name == name).cloned()
    }

    pub fn roles_for(&self, client: &str) -> Vec<RoleRepresentation> {
        self.state().roles.get(client).cloned().unwrap_or_default()
    }

    pub fn policies_for(&self, client: &str) -> Vec<PolicyRepresentation> {
        self.state().policies.get(client).cloned().unwrap_or_default()
    }

    fn guard(&self, op: &'static str) -> Result<MutexGuard<'_, State>, ProviderError> {
        let state = self.state();
        if state.unavailable {
            return Err(ProviderError::api(503, "Service Unavailable"));
        }
        if state.failing_ops.contains(&op) {
            return Err(ProviderError::api(500, format!("{op} failed")));
        }
        Ok(state)
    }

    /// Resolve the resource a policy name targets: a registered instance, or
    /// a shared resource from the catalog.
    fn lookup(&self, state: &State, name: &str) -> Option<ProtectedResource> {
        if let Some(found) = state.resources.values().find(|r| r.name == name) {
            return Some(found.clone());
        }
        let shared = self.catalog.resource(name).filter(|r| r.shared)?;
        Some(ProtectedResource {
            id: Some(shared.name.clone()),
            name: shared.name.clone(),
            resource_type: shared.type_urn.clone(),
            owner: String::new(),
            owner_managed_access: false,
            resource_scopes: shared.scopes.clone(),
            attributes: HashMap::new(),
        })
    }

    fn evaluate_policy(&self, policy: &Policy, principal: &Principal, resource: Option<&ProtectedResource>) -> bool {
        match policy.kind {
            PolicyKind::Role => principal.has_any_role(&policy.roles),
            PolicyKind::Owner => resource
                .map(|r| is_owner(&r.attributes, &principal.user_id))
                .unwrap_or(false),
        }
    }

    fn evaluate_permission(&self, permission: &Permission, principal: &Principal, resource: &ProtectedResource) -> bool {
        let results: Vec<bool> = permission
            .policies
            .iter()
            .filter_map(|name| self.catalog.policy(name))
            .map(|policy| self.evaluate_policy(policy, principal, Some(resource)))
            .collect();
        permission.decision_strategy.combine(&results)
    }

    fn applies(permission: &Permission, resource: &ProtectedResource, scope: &str) -> bool {
        let targets = match &permission.target {
            PermissionTarget::ResourceType(urn) => *urn == resource.resource_type,
            PermissionTarget::Resources(names) => names.iter().any(|n| *n == resource.name),
        };
        targets && permission.scopes.iter().any(|s| s == scope)
    }
}

#[async_trait]
impl ProtectionApi for InMemoryProvider {
    async fn authorize(&self, principal: &Principal, policy: &str) -> Result<bool, ProviderError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.guard("authorize")?;

        let Some((resource_name, scope)) = ProtectedResourcePolicy::parse(policy) else {
            // A bare policy name is evaluated on its own.
            return Ok(self
                .catalog
                .policy(policy)
                .map(|p| self.evaluate_policy(p, principal, None))
                .unwrap_or(false));
        };

        let Some(resource) = self.lookup(&state, resource_name) else {
            debug!(resource = resource_name, "unknown resource");
            return Ok(false);
        };
        if !resource.resource_scopes.iter().any(|s| s == scope) {
            debug!(resource = resource_name, scope, "scope not offered by resource");
            return Ok(false);
        }

        let applicable: Vec<&Permission> = self
            .catalog
            .permissions()
            .iter()
            .filter(|p| Self::applies(p, &resource, scope))
            .collect();
        if applicable.is_empty() {
            return Ok(false);
        }

        Ok(applicable
            .into_iter()
            .all(|permission| self.evaluate_permission(permission, principal, &resource)))
    }

    async fn create_resource(&self, resource: &ProtectedResource) -> Result<String, ProviderError> {
        let mut state = self.guard("create_resource")?;
        if state.fail_resource_creation {
            return Err(ProviderError::api(500, "resource registration rejected"));
        }
        if state.resources.values().any(|r| r.name == resource.name) {
            return Err(ProviderError::api(409, format!("Resource with name [{}] already exists.", resource.name)));
        }

        let id = Uuid::new_v4().to_string();
        let mut stored = resource.clone();
        stored.id = Some(id.clone());
        state.resources.insert(id.clone(), stored);
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn find_resources(&self, name: &str) -> Result<Vec<String>, ProviderError> {
        let state = self.guard("find_resources")?;
        Ok(state
            .resources
            .iter()
            .filter(|(_, r)| r.name == name)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn delete_resource(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.guard("delete_resource")?;
        state
            .resources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ProviderError::api(404, format!("resource {id} not found")))
    }
}

#[async_trait]
impl AdminApi for InMemoryProvider {
    async fn find_client(&self, client_id: &str) -> Result<Option<ClientRepresentation>, ProviderError> {
        let state = self.guard("find_client")?;
        Ok(state.clients.iter().find(|c| c.client_id == client_id).cloned())
    }

    async fn create_client(&self, client: &ClientRepresentation) -> Result<(), ProviderError> {
        let mut state = self.guard("create_client")?;
        if state.clients.iter().any(|c| c.client_id == client.client_id) {
            return Err(ProviderError::api(409, "client already exists"));
        }
        let mut created = client.clone();
        created.id = Some(Uuid::new_v4().to_string());
        state.clients.push(created);
        Ok(())
    }

    async fn update_client(&self, client: &ClientRepresentation) -> Result<(), ProviderError> {
        let mut state = self.guard("update_client")?;
        let existing = state
            .clients
            .iter_mut()
            .find(|c| c.id.is_some() && c.id == client.id)
            .ok_or_else(|| ProviderError::api(404, "client not found"))?;
        *existing = client.clone();
        Ok(())
    }

    async fn list_roles(&self, client: &str) -> Result<Vec<RoleRepresentation>, ProviderError> {
        let state = self.guard("list_roles")?;
        Ok(state.roles.get(client).cloned().unwrap_or_default())
    }

    async fn create_role(&self, client: &str, role: &RoleRepresentation) -> Result<(), ProviderError> {
        let mut state = self.guard("create_role")?;
        let roles = state.roles.entry(client.to_string()).or_default();
        if roles.iter().any(|r| r.name == role.name) {
            return Err(ProviderError::api(409, "role already exists"));
        }
        let mut created = role.clone();
        created.id = Some(Uuid::new_v4().to_string());
        roles.push(created);
        Ok(())
    }

    async fn list_scopes(&self, client: &str) -> Result<Vec<ScopeRepresentation>, ProviderError> {
        let state = self.guard("list_scopes")?;
        Ok(state.scopes.get(client).cloned().unwrap_or_default())
    }

    async fn create_scope(&self, client: &str, scope: &ScopeRepresentation) -> Result<(), ProviderError> {
        let mut state = self.guard("create_scope")?;
        let scopes = state.scopes.entry(client.to_string()).or_default();
        if scopes.iter().any(|s| s.name == scope.name) {
            return Err(ProviderError::api(409, "scope already exists"));
        }
        let mut created = scope.clone();
        created.id = Some(Uuid::new_v4().to_string());
        scopes.push(created);
        Ok(())
    }

    async fn find_resource_definition(
        &self,
        client: &str,
        name: &str,
    ) -> Result<Option<ResourceRepresentation>, ProviderError> {
        let state = self.guard("find_resource_definition")?;
        Ok(state
            .resource_definitions
            .get(client)
            .and_then(|defs| defs.iter().find(|r| r.name == name).cloned()))
    }

    async fn create_resource_definition(
        &self,
        client: &str,
        resource: &ResourceRepresentation,
    ) -> Result<(), ProviderError> {
        let mut state = self.guard("create_resource_definition")?;
        let defs = state.resource_definitions.entry(client.to_string()).or_default();
        if defs.iter().any(|r| r.name == resource.name) {
            return Err(ProviderError::api(409, "resource already exists"));
        }
        let mut created = resource.clone();
        created.id = Some(Uuid::new_v4().to_string());
        defs.push(created);
        Ok(())
    }

    async fn list_policies(&self, client: &str) -> Result<Vec<PolicyRepresentation>, ProviderError> {
        let state = self.guard("list_policies")?;
        Ok(state.policies.get(client).cloned().unwrap_or_default())
    }

    async fn create_policy(&self, client: &str, policy: &PolicyRepresentation) -> Result<(), ProviderError> {
        let mut state = self.guard("create_policy")?;
        let policies = state.policies.entry(client.to_string()).or_default();
        if policies.iter().any(|p| p.name == policy.name) {
            return Err(ProviderError::api(409, "policy already exists"));
        }
        let mut created = policy.clone();
        created.id = Some(Uuid::new_v4().to_string());
        policies.push(created);
        Ok(())
    }
}
