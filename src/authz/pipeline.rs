//! Authorization step run by the mediator before every handler.

use std::sync::Arc;

use super::evaluator::PolicyEvaluator;
use super::principal::Principal;
use super::requirement::{AuthorizationTable, Requirement};
use crate::errors::AppError;
use crate::mediator::Request;
use crate::provider::ProviderError;

/// Enforces the declared requirements of a request.
///
/// Order of checks:
/// 1. no declarations -> allow without consulting the evaluator
/// 2. no caller -> unauthorized
/// 3. role requirements (caller needs one of the listed roles)
/// 4. policy requirements, each delegated to the evaluator; a caller token
///    the provider rejects is unauthorized, not forbidden
///
/// The first failing check ends evaluation.
#[derive(Clone)]
pub struct AuthorizationBehaviour {
    table: Arc<AuthorizationTable>,
    evaluator: Arc<dyn PolicyEvaluator>,
}

impl AuthorizationBehaviour {
    pub fn new(table: Arc<AuthorizationTable>, evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        Self { table, evaluator }
    }

    pub async fn check<R: Request>(&self, principal: Option<&Principal>, request: &R) -> Result<(), AppError> {
        let requirements = self.table.requirements(R::NAME);
        if requirements.is_empty() {
            return Ok(());
        }

        let principal = principal.ok_or_else(|| AppError::unauthorized("authentication required"))?;

        for requirement in requirements {
            if let Requirement::Roles(roles) = requirement {
                if !principal.has_any_role(roles) {
                    tracing::debug!(
                        request = R::NAME,
                        user_id = %principal.user_id,
                        roles = ?roles,
                        "role requirement not met"
                    );
                    return Err(AppError::forbidden(format!("requires one of roles {}", roles.join(", "))));
                }
            }
        }

        for requirement in requirements {
            let Some(policy) = requirement.policy_name(request.resource())? else {
                continue;
            };
            self.authorize(principal, &policy).await.map_err(|e| {
                if matches!(e, AppError::Forbidden(_)) {
                    tracing::debug!(request = R::NAME, policy = %policy, "request denied");
                }
                e
            })?;
        }

        Ok(())
    }

    /// Evaluate one policy for a caller. Handlers use this for checks whose
    /// resource id is only known after a lookup.
    pub async fn authorize(&self, principal: &Principal, policy: &str) -> Result<(), AppError> {
        match self.evaluator.authorize(principal, policy).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::info!(user_id = %principal.user_id, policy = %policy, "policy denied");
                Err(AppError::forbidden(policy))
            }
            Err(ProviderError::TokenRejected) => {
                tracing::info!(user_id = %principal.user_id, policy = %policy, "provider rejected caller token");
                Err(AppError::unauthorized("access token rejected by the authorization provider"))
            }
            Err(e) => Err(AppError::infrastructure(e.to_string())),
        }
    }
}
