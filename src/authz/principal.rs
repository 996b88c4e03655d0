use std::collections::HashSet;

/// Principal represents the authenticated caller as asserted by the identity
/// provider's access token.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Provider-side subject id
    pub user_id: String,
    pub username: Option<String>,
    pub roles: HashSet<String>,
    /// Raw bearer token, forwarded to the provider for policy decisions
    pub access_token: String,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            roles: HashSet::new(),
            access_token: access_token.into(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = String>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.has_role(role.as_ref().trim()))
    }
}
