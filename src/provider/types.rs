//! Wire representations exchanged with the authorization provider.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::authz::DecisionStrategy;

/// A protected resource instance registered through the protection API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResource {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub owner: String,
    #[serde(rename = "ownerManagedAccess")]
    pub owner_managed_access: bool,
    pub resource_scopes: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_client: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_accounts_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_services_enabled: Option<bool>,
    /// Everything else the provider sends, preserved across updates.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClientRepresentation {
    /// A confidential OIDC client.
    pub fn confidential(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            name: Some(client_id.to_string()),
            enabled: Some(true),
            public_client: Some(false),
            protocol: Some("openid-connect".to_string()),
            ..Default::default()
        }
    }

    pub fn is_authorization_ready(&self) -> bool {
        self.service_accounts_enabled == Some(true) && self.authorization_services_enabled == Some(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A resource as managed through the admin API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRepresentation {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub scopes: Vec<ScopeRepresentation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePolicyEntry {
    pub id: String,
    pub required: bool,
}

/// Policies and permissions share one representation on the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_strategy: Option<DecisionStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RolePolicyEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionResponse {
    pub result: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn protected_resource_uses_provider_field_names() {
        let resource = ProtectedResource {
            id: None,
            name: "TodoItem/1".to_string(),
            resource_type: "urn:TodoItem-authz:resource:TodoItem".to_string(),
            owner: "u-1".to_string(),
            owner_managed_access: true,
            resource_scopes: vec!["TodoItem:Read".to_string()],
            attributes: HashMap::from([("u-1".to_string(), vec!["Owner".to_string()])]),
        };

        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["type"], "urn:TodoItem-authz:resource:TodoItem");
        assert_eq!(value["ownerManagedAccess"], true);
        assert_eq!(value["attributes"]["u-1"], json!(["Owner"]));
        assert!(value.get("_id").is_none());
    }

    #[test]
    fn client_keeps_unknown_fields() {
        let client: ClientRepresentation = serde_json::from_value(json!({
            "id": "abc",
            "clientId": "test-client",
            "redirectUris": ["http://localhost/*"]
        }))
        .unwrap();

        let back = serde_json::to_value(&client).unwrap();
        assert_eq!(back["redirectUris"], json!(["http://localhost/*"]));
        assert_eq!(back["clientId"], "test-client");
    }
}
