//! Clients for the external identity and authorization provider.
//!
//! Two seams are exposed as traits:
//! - [`ProtectionApi`]: per-request policy decisions and protected resource
//!   registration
//! - [`AdminApi`]: the administrative calls used by bootstrap seeding
//!
//! [`KeycloakClient`] talks to a Keycloak-compatible server over HTTP;
//! [`InMemoryProvider`] implements the same contract in process.

mod error;
mod keycloak;
mod memory;
mod token;
pub mod types;

use async_trait::async_trait;

pub use error::ProviderError;
pub use keycloak::KeycloakClient;
pub use memory::{is_owner, InMemoryProvider};
pub use token::TokenCache;
pub use types::{
    ClientRepresentation, PolicyRepresentation, ProtectedResource, ResourceRepresentation,
    RolePolicyEntry, RoleRepresentation, ScopeRepresentation,
};

use crate::authz::Principal;

#[async_trait]
pub trait ProtectionApi: Send + Sync {
    /// Ask the provider whether `principal` is granted `policy`
    /// (`resource#scope`). `Ok(false)` is a denial; `Err` means no decision
    /// could be obtained.
    async fn authorize(&self, principal: &Principal, policy: &str) -> Result<bool, ProviderError>;

    /// Register a protected resource instance, returning its provider id.
    async fn create_resource(&self, resource: &ProtectedResource) -> Result<String, ProviderError>;

    /// Provider ids of resources registered under exactly `name`.
    async fn find_resources(&self, name: &str) -> Result<Vec<String>, ProviderError>;

    async fn delete_resource(&self, id: &str) -> Result<(), ProviderError>;
}

/// Administrative API. `client` arguments are the provider's internal client
/// id, not the public `clientId`.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn find_client(&self, client_id: &str) -> Result<Option<ClientRepresentation>, ProviderError>;
    async fn create_client(&self, client: &ClientRepresentation) -> Result<(), ProviderError>;
    async fn update_client(&self, client: &ClientRepresentation) -> Result<(), ProviderError>;

    async fn list_roles(&self, client: &str) -> Result<Vec<RoleRepresentation>, ProviderError>;
    async fn create_role(&self, client: &str, role: &RoleRepresentation) -> Result<(), ProviderError>;

    async fn list_scopes(&self, client: &str) -> Result<Vec<ScopeRepresentation>, ProviderError>;
    async fn create_scope(&self, client: &str, scope: &ScopeRepresentation) -> Result<(), ProviderError>;

    async fn find_resource_definition(
        &self,
        client: &str,
        name: &str,
    ) -> Result<Option<ResourceRepresentation>, ProviderError>;
    async fn create_resource_definition(
        &self,
        client: &str,
        resource: &ResourceRepresentation,
    ) -> Result<(), ProviderError>;

    /// Policies and permissions alike.
    async fn list_policies(&self, client: &str) -> Result<Vec<PolicyRepresentation>, ProviderError>;
    async fn create_policy(&self, client: &str, policy: &PolicyRepresentation) -> Result<(), ProviderError>;
}
