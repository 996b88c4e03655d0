//! Authorization module - resource-based authorization against an external
//! policy provider.
//!
//! This module contains:
//! - The static security catalog (roles, resources, policies, permissions)
//! - Declarative per-request requirements and the pipeline step enforcing them
//! - The policy evaluator that delegates decisions to the provider
//! - The resource registrar that registers owned resources with the provider

pub mod catalog;
mod evaluator;
mod pipeline;
mod principal;
mod registrar;
mod requirement;

pub use catalog::{
    CatalogError, DecisionStrategy, Permission, PermissionTarget, Policy, PolicyKind, PolicyTarget,
    ResourceDefinition, SecurityCatalog,
};
pub use evaluator::{PolicyEvaluator, ProviderPolicyEvaluator};
pub use pipeline::AuthorizationBehaviour;
pub use principal::Principal;
pub use registrar::{ResourceRegistrar, AUTH_RESOURCE_CREATION};
pub use requirement::{
    AuthorizationTable, AuthorizationTableBuilder, HasResourceId, ProtectedResourcePolicy, Requirement,
    ResourceAuthorizationMode,
};

/// Well-known role names
pub mod roles {
    pub const USER: &str = "User";
    pub const ADMINISTRATOR: &str = "Administrator";

    pub const ALL: [&str; 2] = [USER, ADMINISTRATOR];
}

/// Protected resource names and type URNs
pub mod resources {
    /// The shared todo collection
    pub const TODO: &str = "Todo";
    pub const TODO_TYPE: &str = "urn:Todo";
    /// Individually registered todo lists
    pub const TODO_ITEM: &str = "TodoItem";
    pub const TODO_ITEM_TYPE: &str = "urn:TodoItem-authz:resource:TodoItem";
}

/// Scope verbs
pub mod scopes {
    pub const LIST: &str = "List";
    pub const READ: &str = "Read";
    pub const CREATE: &str = "Create";
    pub const EDIT: &str = "Edit";
    pub const DELETE: &str = "Delete";

    pub const ALL: [&str; 5] = [LIST, READ, CREATE, EDIT, DELETE];

    /// `"Todo"` + `"Edit"` -> `"Todo:Edit"`
    pub fn qualified(resource: &str, verb: &str) -> String {
        format!("{resource}:{verb}")
    }
}
