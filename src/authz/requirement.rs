//! Declarative authorization requirements attached to request types.
//!
//! Each request type is identified by its `Request::NAME`; the table maps
//! that name to the checks the pipeline must pass before the handler runs.
//! Request types that carry the id of a protected resource implement
//! [`HasResourceId`] so resource-scoped requirements can bind to it.

use std::collections::HashMap;

use super::catalog::{CatalogError, SecurityCatalog};
use super::scopes;
use crate::errors::AppError;
use crate::mediator::Request;

/// Capability of requests that target a specific protected resource.
pub trait HasResourceId {
    fn resource_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAuthorizationMode {
    /// Check the scope on the resource as a whole
    Resource,
    /// Check the scope on the instance named by the request's resource id
    ResourceFromRequest,
}

/// Policy name convention understood by the provider's decision endpoint.
pub struct ProtectedResourcePolicy;

impl ProtectedResourcePolicy {
    /// `Todo#Todo:Create`
    pub fn from(resource: &str, scope: &str) -> String {
        format!("{resource}#{scope}")
    }

    /// `TodoItem/42#TodoItem:Read`
    pub fn for_instance(resource: &str, resource_id: &str, scope: &str) -> String {
        format!("{resource}/{resource_id}#{scope}")
    }

    /// Splits a policy name into (resource name, scope).
    pub fn parse(policy: &str) -> Option<(&str, &str)> {
        let (resource, scope) = policy.split_once('#')?;
        if resource.is_empty() || scope.is_empty() {
            return None;
        }
        Some((resource, scope))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Caller must hold at least one of these roles
    Roles(Vec<String>),
    /// A named provider policy
    Policy(String),
    ProtectedResource {
        resource: String,
        scope: String,
        mode: ResourceAuthorizationMode,
    },
}

impl Requirement {
    pub fn roles(roles: &[&str]) -> Self {
        Self::Roles(roles.iter().map(|r| r.to_string()).collect())
    }

    pub fn policy(name: impl Into<String>) -> Self {
        Self::Policy(name.into())
    }

    /// `verb` on the resource as a whole.
    pub fn protected(resource: &str, verb: &str) -> Self {
        Self::ProtectedResource {
            resource: resource.to_string(),
            scope: scopes::qualified(resource, verb),
            mode: ResourceAuthorizationMode::Resource,
        }
    }

    /// `verb` on the instance whose id the request carries.
    pub fn protected_from_request(resource: &str, verb: &str) -> Self {
        Self::ProtectedResource {
            resource: resource.to_string(),
            scope: scopes::qualified(resource, verb),
            mode: ResourceAuthorizationMode::ResourceFromRequest,
        }
    }

    /// Resolve to the provider policy name. Role requirements have none.
    pub fn policy_name(&self, resource: Option<&dyn HasResourceId>) -> Result<Option<String>, AppError> {
        match self {
            Requirement::Roles(_) => Ok(None),
            Requirement::Policy(name) => Ok(Some(name.clone())),
            Requirement::ProtectedResource {
                resource: name,
                scope,
                mode: ResourceAuthorizationMode::Resource,
            } => Ok(Some(ProtectedResourcePolicy::from(name, scope))),
            Requirement::ProtectedResource {
                resource: name,
                scope,
                mode: ResourceAuthorizationMode::ResourceFromRequest,
            } => {
                let id = resource.map(|r| r.resource_id()).ok_or_else(|| {
                    AppError::invalid_operation(format!(
                        "requirement on '{name}' needs a resource id but the request carries none"
                    ))
                })?;
                Ok(Some(ProtectedResourcePolicy::for_instance(name, &id, scope)))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthorizationTable {
    entries: HashMap<&'static str, Vec<Requirement>>,
}

impl AuthorizationTable {
    pub fn builder() -> AuthorizationTableBuilder {
        AuthorizationTableBuilder::default()
    }

    /// Requirements declared for a request name. Undeclared requests are public.
    pub fn requirements(&self, request: &str) -> &[Requirement] {
        self.entries.get(request).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check every declaration against the catalog.
    pub fn validate(&self, catalog: &SecurityCatalog) -> Result<(), CatalogError> {
        for (request, requirements) in &self.entries {
            for requirement in requirements {
                match requirement {
                    Requirement::Roles(roles) => {
                        if let Some(role) = roles.iter().find(|r| !catalog.roles().contains(r)) {
                            return Err(CatalogError::UnknownRequirementRole {
                                request: request.to_string(),
                                role: role.clone(),
                            });
                        }
                    }
                    Requirement::Policy(name) => {
                        if catalog.policy(name).is_none() {
                            return Err(CatalogError::UnknownRequirementPolicy {
                                request: request.to_string(),
                                policy: name.clone(),
                            });
                        }
                    }
                    Requirement::ProtectedResource { resource, scope, .. } => {
                        let definition = catalog.resource(resource).ok_or_else(|| {
                            CatalogError::UnknownRequirementResource {
                                request: request.to_string(),
                                resource: resource.clone(),
                            }
                        })?;
                        if !definition.has_scope(scope) {
                            return Err(CatalogError::UnknownRequirementScope {
                                request: request.to_string(),
                                scope: scope.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct AuthorizationTableBuilder {
    entries: HashMap<&'static str, Vec<Requirement>>,
}

impl AuthorizationTableBuilder {
    /// Declare a requirement for request type `R`. Repeated calls accumulate.
    pub fn require<R: Request>(mut self, requirement: Requirement) -> Self {
        self.entries.entry(R::NAME).or_default().push(requirement);
        self
    }

    pub fn build(self) -> AuthorizationTable {
        AuthorizationTable { entries: self.entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::catalog::policies;
    use crate::authz::resources;

    struct Audit;

    impl Request for Audit {
        const NAME: &'static str = "Audit";
        type Response = ();
    }

    struct ListId(i64);

    impl HasResourceId for ListId {
        fn resource_id(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn protected_policy_names() {
        let shared = Requirement::protected(resources::TODO, scopes::CREATE);
        assert_eq!(shared.policy_name(None).unwrap().unwrap(), "Todo#Todo:Create");

        let scoped = Requirement::protected_from_request(resources::TODO_ITEM, scopes::DELETE);
        let id = ListId(5);
        assert_eq!(
            scoped.policy_name(Some(&id)).unwrap().unwrap(),
            "TodoItem/5#TodoItem:Delete"
        );
    }

    #[test]
    fn resource_scoped_requirement_without_id_is_invalid() {
        let scoped = Requirement::protected_from_request(resources::TODO_ITEM, scopes::READ);
        assert!(matches!(scoped.policy_name(None), Err(AppError::InvalidOperation(_))));
    }

    #[test]
    fn role_requirements_have_no_policy_name() {
        let roles = Requirement::roles(&["Administrator"]);
        assert_eq!(roles.policy_name(None).unwrap(), None);
    }

    #[test]
    fn policy_requirement_must_name_a_catalog_policy() {
        let catalog = SecurityCatalog::todo().unwrap();

        let known = AuthorizationTable::builder()
            .require::<Audit>(Requirement::policy(policies::REQUIRE_ADMIN_ROLE))
            .build();
        assert!(known.validate(&catalog).is_ok());

        let unknown = AuthorizationTable::builder()
            .require::<Audit>(Requirement::policy("GhostPolicy"))
            .build();
        assert_eq!(
            unknown.validate(&catalog),
            Err(CatalogError::UnknownRequirementPolicy {
                request: "Audit".to_string(),
                policy: "GhostPolicy".to_string(),
            })
        );
    }

    #[test]
    fn parse_splits_resource_and_scope() {
        assert_eq!(
            ProtectedResourcePolicy::parse("TodoItem/5#TodoItem:Read"),
            Some(("TodoItem/5", "TodoItem:Read"))
        );
        assert_eq!(ProtectedResourcePolicy::parse("no-scope"), None);
        assert_eq!(ProtectedResourcePolicy::parse("#Todo:Read"), None);
    }
}
