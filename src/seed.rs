//! Bootstrap of the provider's authorization configuration.
//!
//! Reconciles the provider with the security catalog by name: the client,
//! its roles, scopes and shared resources, policies and permissions. Each
//! step fails on its own; the outcome is collected in a [`SeedReport`]
//! instead of being raised, so seeding problems never stop the service.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::authz::{Permission, PermissionTarget, Policy, PolicyKind, PolicyTarget, SecurityCatalog};
use crate::provider::{
    AdminApi, ClientRepresentation, PolicyRepresentation, ProviderError, ResourceRepresentation, RolePolicyEntry,
    RoleRepresentation, ScopeRepresentation,
};

/// Provider policy type of the ownership script (`provider/is-owner-policy.js`).
pub const OWNER_POLICY_TYPE: &str = "script-is-owner-policy.js";
const ROLE_POLICY_TYPE: &str = "role";
const SCOPE_PERMISSION_TYPE: &str = "scope";

#[derive(Debug, Clone, Serialize)]
pub struct SeedFailure {
    pub step: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    /// `kind:name` of every object created in this run
    pub created: Vec<String>,
    /// `kind:name` of objects that were already present
    pub existing: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<SeedFailure>,
}

impl SeedReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    fn fail(&mut self, step: &'static str, item: Option<&str>, err: impl ToString) {
        let error = err.to_string();
        error!(step, item, error = %error, "seeding step failed");
        self.failures.push(SeedFailure {
            step,
            item: item.map(str::to_string),
            error,
        });
    }

    fn created(&mut self, kind: &str, name: &str) {
        info!(kind, name, "seeded");
        self.created.push(format!("{kind}:{name}"));
    }

    fn existing(&mut self, kind: &str, name: &str) {
        self.existing.push(format!("{kind}:{name}"));
    }

    fn skip(&mut self, item: String) {
        warn!(item = %item, "seeding skipped");
        self.skipped.push(item);
    }
}

pub struct Seeder {
    admin: Arc<dyn AdminApi>,
    catalog: SecurityCatalog,
    client_id: String,
}

impl Seeder {
    pub fn new(admin: Arc<dyn AdminApi>, catalog: SecurityCatalog, client_id: impl Into<String>) -> Self {
        Self {
            admin,
            catalog,
            client_id: client_id.into(),
        }
    }

    pub async fn run(&self) -> SeedReport {
        let mut report = SeedReport::default();
        info!(client_id = %self.client_id, "seeding authorization provider");

        let Some(client) = self.seed_client(&mut report).await else {
            for step in ["roles", "resources", "policies", "permissions"] {
                report.skip(format!("step:{step}"));
            }
            return report;
        };

        self.seed_roles(&client, &mut report).await;
        self.seed_resources(&client, &mut report).await;
        self.seed_policies(&client, &mut report).await;
        self.seed_permissions(&client, &mut report).await;

        info!(
            created = report.created.len(),
            existing = report.existing.len(),
            failures = report.failures.len(),
            "seeding finished"
        );
        report
    }

    /// Returns the internal id of a client with authorization services on.
    async fn seed_client(&self, report: &mut SeedReport) -> Option<String> {
        let found = match self.admin.find_client(&self.client_id).await {
            Ok(found) => found,
            Err(e) => {
                report.fail("client", Some(self.client_id.as_str()), e);
                return None;
            }
        };

        let mut client = match found {
            Some(client) => {
                report.existing("client", &self.client_id);
                client
            }
            None => {
                match self.admin.create_client(&ClientRepresentation::confidential(&self.client_id)).await {
                    Ok(()) => report.created("client", &self.client_id),
                    Err(e) if e.is_conflict() => report.existing("client", &self.client_id),
                    Err(e) => {
                        report.fail("client", Some(self.client_id.as_str()), e);
                        return None;
                    }
                }
                match self.admin.find_client(&self.client_id).await {
                    Ok(Some(client)) => client,
                    Ok(None) => {
                        report.fail("client", Some(self.client_id.as_str()), "client not found after creation");
                        return None;
                    }
                    Err(e) => {
                        report.fail("client", Some(self.client_id.as_str()), e);
                        return None;
                    }
                }
            }
        };

        let Some(id) = client.id.clone() else {
            report.fail("client", Some(self.client_id.as_str()), "provider returned a client without id");
            return None;
        };

        if !client.is_authorization_ready() {
            client.service_accounts_enabled = Some(true);
            client.authorization_services_enabled = Some(true);
            if let Err(e) = self.admin.update_client(&client).await {
                report.fail("client", Some(self.client_id.as_str()), e);
            }
        }

        Some(id)
    }

    async fn seed_roles(&self, client: &str, report: &mut SeedReport) {
        let existing: HashSet<String> = match self.admin.list_roles(client).await {
            Ok(roles) => roles.into_iter().map(|r| r.name).collect(),
            Err(e) => {
                report.fail("roles", None, e);
                return;
            }
        };

        for role in self.catalog.roles() {
            if existing.contains(role) {
                report.existing("role", role);
                continue;
            }
            let representation = RoleRepresentation {
                name: role.clone(),
                ..Default::default()
            };
            record(report, "roles", "role", role, self.admin.create_role(client, &representation).await);
        }
    }

    async fn seed_resources(&self, client: &str, report: &mut SeedReport) {
        match self.admin.list_scopes(client).await {
            Ok(scopes) => {
                let existing: HashSet<String> = scopes.into_iter().map(|s| s.name).collect();
                for resource in self.catalog.resources() {
                    for scope in &resource.scopes {
                        if existing.contains(scope) {
                            report.existing("scope", scope);
                            continue;
                        }
                        let result = self.admin.create_scope(client, &scope_representation(scope)).await;
                        record(report, "resources", "scope", scope, result);
                    }
                }
            }
            Err(e) => report.fail("resources", None, e),
        }

        for resource in self.catalog.resources().iter().filter(|r| r.shared) {
            match self.admin.find_resource_definition(client, &resource.name).await {
                Ok(Some(_)) => report.existing("resource", &resource.name),
                Ok(None) => {
                    let representation = ResourceRepresentation {
                        id: None,
                        name: resource.name.clone(),
                        resource_type: Some(resource.type_urn.clone()),
                        scopes: resource.scopes.iter().map(|s| scope_representation(s)).collect(),
                    };
                    let result = self.admin.create_resource_definition(client, &representation).await;
                    record(report, "resources", "resource", &resource.name, result);
                }
                Err(e) => report.fail("resources", Some(resource.name.as_str()), e),
            }
        }
    }

    async fn seed_policies(&self, client: &str, report: &mut SeedReport) {
        let existing = match self.existing_policies(client).await {
            Ok(existing) => existing,
            Err(e) => {
                report.fail("policies", None, e);
                return;
            }
        };

        // Role policies reference roles by provider id.
        let role_ids: HashMap<String, String> = match self.admin.list_roles(client).await {
            Ok(roles) => roles.into_iter().filter_map(|r| r.id.map(|id| (r.name, id))).collect(),
            Err(e) => {
                report.fail("policies", None, e);
                return;
            }
        };

        for policy in self.catalog.policies() {
            if existing.contains(&policy.name) {
                report.existing("policy", &policy.name);
                continue;
            }
            let Some(representation) = policy_representation(policy, &role_ids) else {
                report.skip(format!("policy:{}", policy.name));
                continue;
            };
            let result = self.admin.create_policy(client, &representation).await;
            record(report, "policies", "policy", &policy.name, result);
        }
    }

    async fn seed_permissions(&self, client: &str, report: &mut SeedReport) {
        let existing = match self.existing_policies(client).await {
            Ok(existing) => existing,
            Err(e) => {
                report.fail("permissions", None, e);
                return;
            }
        };

        for permission in self.catalog.permissions() {
            if existing.contains(&permission.name) {
                report.existing("permission", &permission.name);
                continue;
            }
            let result = self.admin.create_policy(client, &permission_representation(permission)).await;
            record(report, "permissions", "permission", &permission.name, result);
        }
    }

    async fn existing_policies(&self, client: &str) -> Result<HashSet<String>, ProviderError> {
        let policies = self.admin.list_policies(client).await?;
        Ok(policies.into_iter().map(|p| p.name).collect())
    }
}

/// A 409 means someone else created the object first; that is success.
fn record(report: &mut SeedReport, step: &'static str, kind: &str, name: &str, result: Result<(), ProviderError>) {
    match result {
        Ok(()) => report.created(kind, name),
        Err(e) if e.is_conflict() => report.existing(kind, name),
        Err(e) => report.fail(step, Some(name), e),
    }
}

fn scope_representation(scope: &str) -> ScopeRepresentation {
    // "Todo:Edit" is shown as "Edit Todo"
    let display_name = scope
        .split_once(':')
        .map(|(resource, verb)| format!("{verb} {resource}"));
    ScopeRepresentation {
        id: None,
        name: scope.to_string(),
        display_name,
    }
}

/// `None` when a role policy names no role the provider knows.
fn policy_representation(policy: &Policy, role_ids: &HashMap<String, String>) -> Option<PolicyRepresentation> {
    let mut representation = PolicyRepresentation {
        name: policy.name.clone(),
        logic: Some("POSITIVE".to_string()),
        ..Default::default()
    };

    match policy.kind {
        PolicyKind::Role => {
            let mut entries = Vec::new();
            for role in &policy.roles {
                match role_ids.get(role) {
                    Some(id) => entries.push(RolePolicyEntry {
                        id: id.clone(),
                        required: false,
                    }),
                    None => warn!(policy = %policy.name, role = %role, "role missing on provider"),
                }
            }
            if entries.is_empty() {
                return None;
            }
            representation.policy_type = ROLE_POLICY_TYPE.to_string();
            representation.roles = Some(entries);
        }
        PolicyKind::Owner => {
            representation.policy_type = OWNER_POLICY_TYPE.to_string();
        }
    }

    representation.description = Some(match &policy.target {
        PolicyTarget::Resource(name) => format!("applies to resource {name}"),
        PolicyTarget::ResourceType(urn) => format!("applies to resources of type {urn}"),
    });

    Some(representation)
}

fn permission_representation(permission: &Permission) -> PolicyRepresentation {
    let mut representation = PolicyRepresentation {
        name: permission.name.clone(),
        description: Some(permission.description.clone()),
        policy_type: SCOPE_PERMISSION_TYPE.to_string(),
        logic: Some("POSITIVE".to_string()),
        decision_strategy: Some(permission.decision_strategy),
        scopes: Some(permission.scopes.clone()),
        policies: Some(permission.policies.clone()),
        ..Default::default()
    };
    match &permission.target {
        PermissionTarget::ResourceType(urn) => representation.resource_type = Some(urn.clone()),
        PermissionTarget::Resources(names) => representation.resources = Some(names.clone()),
    }
    representation
}
