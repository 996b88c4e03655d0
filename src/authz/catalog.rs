//! Static catalog of roles, protected resource definitions, policies and
//! permissions.
//!
//! The catalog is built once at startup and validated eagerly: a permission
//! that references an undefined policy, or a role policy naming an undefined
//! role, is a startup failure rather than a request-time surprise.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{resources, roles, scopes};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate policy '{0}'")]
    DuplicatePolicy(String),
    #[error("duplicate permission '{0}'")]
    DuplicatePermission(String),
    #[error("duplicate resource '{0}'")]
    DuplicateResource(String),
    #[error("permission '{permission}' references unknown policy '{policy}'")]
    UnknownPolicy { permission: String, policy: String },
    #[error("permission '{permission}' references unknown scope '{scope}'")]
    UnknownScope { permission: String, scope: String },
    #[error("policy '{policy}' references unknown role '{role}'")]
    UnknownRole { policy: String, role: String },
    #[error("request '{request}' requires unknown resource '{resource}'")]
    UnknownRequirementResource { request: String, resource: String },
    #[error("request '{request}' requires unknown scope '{scope}'")]
    UnknownRequirementScope { request: String, scope: String },
    #[error("request '{request}' requires unknown role '{role}'")]
    UnknownRequirementRole { request: String, role: String },
    #[error("request '{request}' requires unknown policy '{policy}'")]
    UnknownRequirementPolicy { request: String, policy: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyKind {
    /// Caller must hold one of the listed roles
    Role,
    /// Caller must be the registered owner of the resource
    Owner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyTarget {
    Resource(String),
    ResourceType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub kind: PolicyKind,
    pub target: PolicyTarget,
    pub roles: Vec<String>,
}

impl Policy {
    pub fn role(name: &str, target: PolicyTarget, roles: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: PolicyKind::Role,
            target,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn owner(name: &str, target: PolicyTarget) -> Self {
        Self {
            name: name.to_string(),
            kind: PolicyKind::Owner,
            target,
            roles: Vec::new(),
        }
    }
}

/// How the results of several policies combine into one permission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStrategy {
    /// Any policy grants
    Affirmative,
    /// All policies grant
    Unanimous,
    /// More grants than denials
    Consensus,
}

impl DecisionStrategy {
    /// Combine individual policy results. An empty set never grants.
    pub fn combine(&self, results: &[bool]) -> bool {
        if results.is_empty() {
            return false;
        }
        let granted = results.iter().filter(|r| **r).count();
        match self {
            DecisionStrategy::Affirmative => granted > 0,
            DecisionStrategy::Unanimous => granted == results.len(),
            DecisionStrategy::Consensus => granted * 2 > results.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionTarget {
    ResourceType(String),
    Resources(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub name: String,
    pub description: String,
    pub decision_strategy: DecisionStrategy,
    pub target: PermissionTarget,
    pub scopes: Vec<String>,
    pub policies: Vec<String>,
}

/// A protected resource known to the provider.
///
/// Shared resources (like the `Todo` collection) exist once and are created by
/// seeding. Non-shared definitions describe a resource type whose instances
/// are registered one by one as entities are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDefinition {
    pub name: String,
    pub type_urn: String,
    pub scopes: Vec<String>,
    pub shared: bool,
}

impl ResourceDefinition {
    pub fn new(name: &str, type_urn: &str, shared: bool) -> Self {
        Self {
            name: name.to_string(),
            type_urn: type_urn.to_string(),
            scopes: scopes::ALL.iter().map(|verb| scopes::qualified(name, verb)).collect(),
            shared,
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[derive(Debug, Clone)]
pub struct SecurityCatalog {
    roles: Vec<String>,
    resources: Vec<ResourceDefinition>,
    policies: Vec<Policy>,
    permissions: Vec<Permission>,
    policy_index: HashMap<String, usize>,
    permission_index: HashMap<String, usize>,
}

impl SecurityCatalog {
    pub fn new(
        roles: Vec<String>,
        resources: Vec<ResourceDefinition>,
        policies: Vec<Policy>,
        permissions: Vec<Permission>,
    ) -> Result<Self, CatalogError> {
        let mut resource_names = HashSet::new();
        for resource in &resources {
            if !resource_names.insert(resource.name.as_str()) {
                return Err(CatalogError::DuplicateResource(resource.name.clone()));
            }
        }

        let mut policy_index = HashMap::new();
        for (idx, policy) in policies.iter().enumerate() {
            if policy_index.insert(policy.name.clone(), idx).is_some() {
                return Err(CatalogError::DuplicatePolicy(policy.name.clone()));
            }
            for role in &policy.roles {
                if !roles.contains(role) {
                    return Err(CatalogError::UnknownRole {
                        policy: policy.name.clone(),
                        role: role.clone(),
                    });
                }
            }
        }

        let mut permission_index = HashMap::new();
        for (idx, permission) in permissions.iter().enumerate() {
            if permission_index.insert(permission.name.clone(), idx).is_some() {
                return Err(CatalogError::DuplicatePermission(permission.name.clone()));
            }
            for policy in &permission.policies {
                if !policy_index.contains_key(policy) {
                    return Err(CatalogError::UnknownPolicy {
                        permission: permission.name.clone(),
                        policy: policy.clone(),
                    });
                }
            }
            for scope in &permission.scopes {
                if !resources.iter().any(|r| r.has_scope(scope)) {
                    return Err(CatalogError::UnknownScope {
                        permission: permission.name.clone(),
                        scope: scope.clone(),
                    });
                }
            }
        }

        Ok(Self {
            roles,
            resources,
            policies,
            permissions,
            policy_index,
            permission_index,
        })
    }

    /// The todo application's catalog.
    pub fn todo() -> Result<Self, CatalogError> {
        let todo = ResourceDefinition::new(resources::TODO, resources::TODO_TYPE, true);
        let todo_item = ResourceDefinition::new(resources::TODO_ITEM, resources::TODO_ITEM_TYPE, false);

        let policies = vec![
            Policy::owner(
                policies::OWNERSHIP,
                PolicyTarget::ResourceType(resources::TODO_ITEM_TYPE.to_string()),
            ),
            Policy::role(
                policies::REQUIRE_USER_ROLE,
                PolicyTarget::Resource(resources::TODO.to_string()),
                &[roles::USER],
            ),
            Policy::role(
                policies::REQUIRE_ADMIN_ROLE,
                PolicyTarget::Resource(resources::TODO.to_string()),
                &[roles::ADMINISTRATOR],
            ),
        ];

        let todo_scope = |verb: &str| scopes::qualified(resources::TODO, verb);

        let permissions = vec![
            Permission {
                name: "TodoItemOwner".to_string(),
                description: "Permit only TodoItem owners to `use` them".to_string(),
                decision_strategy: DecisionStrategy::Affirmative,
                target: PermissionTarget::ResourceType(resources::TODO_ITEM_TYPE.to_string()),
                scopes: todo_item.scopes.clone(),
                policies: vec![policies::OWNERSHIP.to_string(), policies::REQUIRE_ADMIN_ROLE.to_string()],
            },
            Permission {
                name: "UseTodos".to_string(),
                description: "Permit all users to create/read/update todos".to_string(),
                decision_strategy: DecisionStrategy::Affirmative,
                target: PermissionTarget::Resources(vec![resources::TODO.to_string()]),
                scopes: vec![
                    todo_scope(scopes::CREATE),
                    todo_scope(scopes::READ),
                    todo_scope(scopes::EDIT),
                    todo_scope(scopes::LIST),
                ],
                policies: vec![
                    policies::REQUIRE_USER_ROLE.to_string(),
                    policies::REQUIRE_ADMIN_ROLE.to_string(),
                ],
            },
            Permission {
                name: "DeleteTodos".to_string(),
                description: "Permit admins to delete todos".to_string(),
                decision_strategy: DecisionStrategy::Consensus,
                target: PermissionTarget::Resources(vec![resources::TODO.to_string()]),
                scopes: vec![todo_scope(scopes::DELETE)],
                policies: vec![policies::REQUIRE_ADMIN_ROLE.to_string()],
            },
        ];

        Self::new(
            roles::ALL.iter().map(|r| r.to_string()).collect(),
            vec![todo, todo_item],
            policies,
            permissions,
        )
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn resources(&self) -> &[ResourceDefinition] {
        &self.resources
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn policy(&self, name: &str) -> Option<&Policy> {
        self.policy_index.get(name).map(|idx| &self.policies[*idx])
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn permission(&self, name: &str) -> Option<&Permission> {
        self.permission_index.get(name).map(|idx| &self.permissions[*idx])
    }
}

/// Well-known policy names
pub mod policies {
    pub const OWNERSHIP: &str = "OwnershipPolicy";
    pub const REQUIRE_USER_ROLE: &str = "RequireUserRolePolicy";
    pub const REQUIRE_ADMIN_ROLE: &str = "RequireAdminRolePolicy";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn todo_catalog_is_consistent() {
        let catalog = SecurityCatalog::todo().unwrap();
        assert_eq!(catalog.policies().len(), 3);
        assert_eq!(catalog.permissions().len(), 3);

        let owner = catalog.permission("TodoItemOwner").unwrap();
        assert_eq!(owner.scopes.len(), 5);
        assert!(owner.scopes.contains(&"TodoItem:Delete".to_string()));
        assert_eq!(catalog.policy(policies::OWNERSHIP).unwrap().kind, PolicyKind::Owner);
        assert!(catalog.resource(resources::TODO).unwrap().shared);
    }

    #[test]
    fn dangling_policy_reference_fails_fast() {
        let permission = Permission {
            name: "Broken".to_string(),
            description: String::new(),
            decision_strategy: DecisionStrategy::Unanimous,
            target: PermissionTarget::Resources(vec!["Todo".to_string()]),
            scopes: vec![],
            policies: vec!["Missing".to_string()],
        };

        let err = SecurityCatalog::new(vec![], vec![], vec![], vec![permission]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownPolicy {
                permission: "Broken".to_string(),
                policy: "Missing".to_string()
            }
        );
    }

    #[test]
    fn duplicate_policy_names_are_rejected() {
        let target = PolicyTarget::Resource("Todo".to_string());
        let policies = vec![
            Policy::owner("Same", target.clone()),
            Policy::owner("Same", target),
        ];
        let err = SecurityCatalog::new(vec![], vec![], policies, vec![]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicatePolicy("Same".to_string()));
    }

    #[test]
    fn role_policy_must_name_known_roles() {
        let policy = Policy::role("P", PolicyTarget::Resource("Todo".to_string()), &["Ghost"]);
        let err = SecurityCatalog::new(vec!["User".to_string()], vec![], vec![policy], vec![]).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownRole { .. }));
    }

    #[test]
    fn decision_strategies_combine_results() {
        assert!(DecisionStrategy::Affirmative.combine(&[false, true]));
        assert!(!DecisionStrategy::Unanimous.combine(&[true, false]));
        assert!(DecisionStrategy::Unanimous.combine(&[true, true]));
        assert!(!DecisionStrategy::Consensus.combine(&[true, false]));
        assert!(DecisionStrategy::Consensus.combine(&[true, true, false]));
        assert!(!DecisionStrategy::Affirmative.combine(&[]));
    }
}
