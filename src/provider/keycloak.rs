//! HTTP client for a Keycloak-compatible authorization server.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use super::error::ProviderError;
use super::token::TokenCache;
use super::types::{
    ClientRepresentation, DecisionResponse, OAuthErrorResponse, PolicyRepresentation, ProtectedResource,
    ResourceRepresentation, RoleRepresentation, ScopeRepresentation,
};
use super::{AdminApi, ProtectionApi};
use crate::authz::Principal;
use crate::config::ProviderConfig;

const UMA_TICKET_GRANT: &str = "urn:ietf:params:oauth:grant-type:uma-ticket";
const PAGE: [(&str, &str); 2] = [("first", "0"), ("max", "1000")];

#[derive(Clone)]
pub struct KeycloakClient {
    http: Client,
    config: ProviderConfig,
    tokens: Arc<TokenCache>,
}

impl std::fmt::Debug for KeycloakClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakClient")
            .field("base_url", &self.config.base_url)
            .field("realm", &self.config.realm)
            .field("client_id", &self.config.client_id)
            .finish_non_exhaustive()
    }
}

impl KeycloakClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.base_url.is_empty() {
            return Err(ProviderError::Config("provider base URL is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to create HTTP client: {e}")))?;
        let tokens = Arc::new(TokenCache::new(http.clone(), &config));

        Ok(Self { http, config, tokens })
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}{}", self.config.admin_endpoint(), path)
    }

    fn client_url(&self, client: &str, path: &str) -> String {
        self.admin_url(&format!("/clients/{client}{path}"))
    }

    async fn authed(&self, method: Method, url: &str) -> Result<RequestBuilder, ProviderError> {
        let token = self.tokens.token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            return Err(ProviderError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::api(status.as_u16(), body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, ProviderError> {
        let request = self.authed(Method::GET, url).await?.query(query);
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("{url}: {e}")))
    }

    async fn write_json<B: Serialize + ?Sized>(&self, method: Method, url: &str, body: &B) -> Result<Response, ProviderError> {
        let request = self.authed(method, url).await?.json(body);
        self.send(request).await
    }
}

fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        error!("provider request timed out");
        return ProviderError::Timeout;
    }
    error!(error = %e, "network error talking to provider");
    ProviderError::Network(e)
}

#[async_trait]
impl ProtectionApi for KeycloakClient {
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    async fn authorize(&self, principal: &Principal, policy: &str) -> Result<bool, ProviderError> {
        let response = self
            .http
            .post(self.config.token_endpoint())
            .bearer_auth(&principal.access_token)
            .form(&[
                ("grant_type", UMA_TICKET_GRANT),
                ("audience", self.config.client_id.as_str()),
                ("permission", policy),
                ("response_mode", "decision"),
            ])
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status.is_success() {
            let decision: DecisionResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(format!("decision response: {e}")))?;
            return Ok(decision.result);
        }

        match status {
            StatusCode::FORBIDDEN => {
                debug!("provider denied permission");
                Ok(false)
            }
            StatusCode::UNAUTHORIZED => {
                debug!("provider rejected the caller's token");
                Err(ProviderError::TokenRejected)
            }
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                let oauth: Option<OAuthErrorResponse> = serde_json::from_str(&body).ok();
                match oauth.as_ref().map(|e| e.error.as_str()) {
                    // The resource or scope is not registered: nothing can be granted on it.
                    Some("invalid_resource") | Some("invalid_scope") => {
                        debug!(body = %body, "provider does not know the requested permission");
                        Ok(false)
                    }
                    _ => Err(ProviderError::api(status.as_u16(), body)),
                }
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::api(status.as_u16(), body))
            }
        }
    }

    #[instrument(skip(self, resource), fields(name = %resource.name))]
    async fn create_resource(&self, resource: &ProtectedResource) -> Result<String, ProviderError> {
        let url = format!("{}/resource_set", self.config.protection_endpoint());
        let response = self.write_json(Method::POST, &url, resource).await?;
        let created: ProtectedResource = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("resource_set: {e}")))?;
        created
            .id
            .ok_or_else(|| ProviderError::InvalidResponse("resource_set response without _id".to_string()))
    }

    async fn find_resources(&self, name: &str) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/resource_set", self.config.protection_endpoint());
        self.get_json(&url, &[("name", name), ("exactName", "true")]).await
    }

    async fn delete_resource(&self, id: &str) -> Result<(), ProviderError> {
        let url = format!("{}/resource_set/{id}", self.config.protection_endpoint());
        let request = self.authed(Method::DELETE, &url).await?;
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl AdminApi for KeycloakClient {
    async fn find_client(&self, client_id: &str) -> Result<Option<ClientRepresentation>, ProviderError> {
        let clients: Vec<ClientRepresentation> = self
            .get_json(&self.admin_url("/clients"), &[("clientId", client_id)])
            .await?;
        Ok(clients.into_iter().find(|c| c.client_id == client_id))
    }

    async fn create_client(&self, client: &ClientRepresentation) -> Result<(), ProviderError> {
        self.write_json(Method::POST, &self.admin_url("/clients"), client)
            .await
            .map(|_| ())
    }

    async fn update_client(&self, client: &ClientRepresentation) -> Result<(), ProviderError> {
        let id = client
            .id
            .as_deref()
            .ok_or_else(|| ProviderError::Config("cannot update a client without id".to_string()))?;
        self.write_json(Method::PUT, &self.admin_url(&format!("/clients/{id}")), client)
            .await
            .map(|_| ())
    }

    async fn list_roles(&self, client: &str) -> Result<Vec<RoleRepresentation>, ProviderError> {
        self.get_json(&self.client_url(client, "/roles"), &[]).await
    }

    async fn create_role(&self, client: &str, role: &RoleRepresentation) -> Result<(), ProviderError> {
        self.write_json(Method::POST, &self.client_url(client, "/roles"), role)
            .await
            .map(|_| ())
    }

    async fn list_scopes(&self, client: &str) -> Result<Vec<ScopeRepresentation>, ProviderError> {
        self.get_json(&self.client_url(client, "/authz/resource-server/scope"), &PAGE)
            .await
    }

    async fn create_scope(&self, client: &str, scope: &ScopeRepresentation) -> Result<(), ProviderError> {
        self.write_json(
            Method::POST,
            &self.client_url(client, "/authz/resource-server/scope"),
            scope,
        )
        .await
        .map(|_| ())
    }

    async fn find_resource_definition(
        &self,
        client: &str,
        name: &str,
    ) -> Result<Option<ResourceRepresentation>, ProviderError> {
        let resources: Vec<ResourceRepresentation> = self
            .get_json(
                &self.client_url(client, "/authz/resource-server/resource"),
                &[("name", name), ("exactName", "true")],
            )
            .await?;
        Ok(resources.into_iter().find(|r| r.name == name))
    }

    async fn create_resource_definition(
        &self,
        client: &str,
        resource: &ResourceRepresentation,
    ) -> Result<(), ProviderError> {
        self.write_json(
            Method::POST,
            &self.client_url(client, "/authz/resource-server/resource"),
            resource,
        )
        .await
        .map(|_| ())
    }

    async fn list_policies(&self, client: &str) -> Result<Vec<PolicyRepresentation>, ProviderError> {
        self.get_json(&self.client_url(client, "/authz/resource-server/policy"), &PAGE)
            .await
    }

    async fn create_policy(&self, client: &str, policy: &PolicyRepresentation) -> Result<(), ProviderError> {
        let url = self.client_url(
            client,
            &format!("/authz/resource-server/policy/{}", policy.policy_type),
        );
        let response = self.write_json(Method::POST, &url, policy).await;
        if let Err(err) = &response {
            warn!(policy = %policy.name, error = %err, "policy creation rejected");
        }
        response.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_token() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/realms/Test/protocol/openid-connect/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "pat",
                "expires_in": 300
            })))
            .mount(&server)
            .await;
        server
    }

    fn client_for(server: &MockServer) -> KeycloakClient {
        KeycloakClient::new(ProviderConfig::keycloak(server.uri(), "Test", "test-client", "secret")).unwrap()
    }

    fn caller() -> Principal {
        Principal::new("user-1", "user-token")
    }

    #[tokio::test]
    async fn authorize_grants_on_positive_decision() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/realms/Test/protocol/openid-connect/token"))
            .and(header("authorization", "Bearer user-token"))
            .and(body_string_contains("response_mode=decision"))
            .and(body_string_contains("permission=TodoItem%2F5%23TodoItem%3ARead"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.authorize(&caller(), "TodoItem/5#TodoItem:Read").await.unwrap());
    }

    #[tokio::test]
    async fn authorize_maps_forbidden_to_denial() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": "access_denied",
                "error_description": "not_authorized"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(!client.authorize(&caller(), "Todo#Todo:Delete").await.unwrap());
    }

    #[tokio::test]
    async fn authorize_reports_rejected_caller_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid bearer token"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.authorize(&caller(), "Todo#Todo:Read").await.unwrap_err();
        assert!(matches!(err, ProviderError::TokenRejected));
        assert!(!err.is_unavailable());
    }

    #[tokio::test]
    async fn authorize_maps_unknown_resource_to_denial() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_resource",
                "error_description": "Resource with id [TodoItem/9] does not exist."
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(!client.authorize(&caller(), "TodoItem/9#TodoItem:Read").await.unwrap());
    }

    #[tokio::test]
    async fn authorize_surfaces_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.authorize(&caller(), "Todo#Todo:List").await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn create_resource_posts_with_service_token() {
        let server = server_with_token().await;
        Mock::given(method("POST"))
            .and(path("/realms/Test/authz/protection/resource_set"))
            .and(header("authorization", "Bearer pat"))
            .and(body_string_contains("\"name\":\"TodoItem/7\""))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "_id": "res-7",
                "name": "TodoItem/7",
                "type": "urn:TodoItem-authz:resource:TodoItem",
                "owner": "user-1",
                "ownerManagedAccess": true,
                "resource_scopes": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let resource = ProtectedResource {
            id: None,
            name: "TodoItem/7".to_string(),
            resource_type: "urn:TodoItem-authz:resource:TodoItem".to_string(),
            owner: "user-1".to_string(),
            owner_managed_access: true,
            resource_scopes: vec!["TodoItem:Read".to_string()],
            attributes: Default::default(),
        };
        assert_eq!(client.create_resource(&resource).await.unwrap(), "res-7");
    }

    #[tokio::test]
    async fn find_client_filters_by_client_id() {
        let server = server_with_token().await;
        Mock::given(method("GET"))
            .and(path("/admin/realms/Test/clients"))
            .and(query_param("clientId", "test-client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "uuid-1", "clientId": "test-client"}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let found = client.find_client("test-client").await.unwrap().unwrap();
        assert_eq!(found.id.as_deref(), Some("uuid-1"));
    }

    #[tokio::test]
    async fn admin_unauthorized_invalidates_token() {
        let server = server_with_token().await;
        Mock::given(method("GET"))
            .and(path("/admin/realms/Test/clients/uuid-1/roles"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.list_roles("uuid-1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unauthorized));
    }
}
