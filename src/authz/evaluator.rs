use std::sync::Arc;

use async_trait::async_trait;

use super::principal::Principal;
use crate::provider::{ProtectionApi, ProviderError};

/// Policy evaluator trait for pluggable authorization decisions
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Whether the principal is granted `policy`.
    ///
    /// `Ok(false)` is a denial. `Err` means the decision could not be
    /// obtained and must not be read as a denial.
    async fn authorize(&self, principal: &Principal, policy: &str) -> Result<bool, ProviderError>;
}

/// Evaluator that owns no decision logic: every policy is sent to the
/// provider's decision endpoint.
#[derive(Clone)]
pub struct ProviderPolicyEvaluator {
    provider: Arc<dyn ProtectionApi>,
}

impl ProviderPolicyEvaluator {
    pub fn new(provider: Arc<dyn ProtectionApi>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PolicyEvaluator for ProviderPolicyEvaluator {
    async fn authorize(&self, principal: &Principal, policy: &str) -> Result<bool, ProviderError> {
        match self.provider.authorize(principal, policy).await {
            Ok(granted) => {
                tracing::debug!(
                    user_id = %principal.user_id,
                    policy = %policy,
                    granted,
                    "policy evaluated"
                );
                Ok(granted)
            }
            Err(e) => {
                tracing::error!(
                    user_id = %principal.user_id,
                    policy = %policy,
                    error = %e,
                    "policy evaluation failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{roles, SecurityCatalog};
    use crate::provider::InMemoryProvider;

    fn evaluator() -> (Arc<InMemoryProvider>, ProviderPolicyEvaluator) {
        let provider = Arc::new(InMemoryProvider::new(SecurityCatalog::todo().unwrap()));
        (provider.clone(), ProviderPolicyEvaluator::new(provider))
    }

    #[tokio::test]
    async fn test_grant_and_deny_pass_through() {
        let (_, evaluator) = evaluator();
        let admin = Principal::new("a", "t").with_roles(vec![roles::ADMINISTRATOR.to_string()]);
        let user = Principal::new("u", "t").with_roles(vec![roles::USER.to_string()]);

        assert!(evaluator.authorize(&admin, "Todo#Todo:Delete").await.unwrap());
        assert!(!evaluator.authorize(&user, "Todo#Todo:Delete").await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_not_a_denial() {
        let (provider, evaluator) = evaluator();
        provider.set_unavailable(true);
        let user = Principal::new("u", "t");

        let err = evaluator.authorize(&user, "Todo#Todo:List").await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
