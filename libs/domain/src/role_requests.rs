//! Role request workflow
//!
//! Users petition for an elevated role with a reason; an admin approves or
//! rejects exactly once. Approval grants the role in the same atomic unit
//! as the decision.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::authz;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{Actor, NewRoleRequest, RoleKind, RoleRequest, RoleRequestFilter};
use crate::review::{Decision, ReviewStatus};
use crate::store::Store;
use crate::validation::required_text;

/// Validate a role request before it is stored.
///
/// The role must exist in the catalog and must not be admin; the reason
/// must not be blank. Every failure is a validation error.
pub fn validate_submission(role_name: &str, reason: &str) -> WorkflowResult<NewRoleRequest> {
    let role = RoleKind::from_name(role_name).ok_or_else(|| {
        WorkflowError::Validation(format!("Unknown role: {}", role_name.trim()))
    })?;

    if !role.is_requestable() {
        return Err(WorkflowError::Validation(format!(
            "The '{}' role cannot be requested",
            role.display_name()
        )));
    }

    Ok(NewRoleRequest {
        requested_role: role,
        reason: required_text("Reason", reason)?,
    })
}

#[derive(Clone)]
pub struct RoleRequestService {
    store: Arc<dyn Store>,
}

impl RoleRequestService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// File a new pending role request for the actor
    pub async fn submit(
        &self,
        actor: &Actor,
        role_name: &str,
        reason: &str,
    ) -> WorkflowResult<RoleRequest> {
        let request = validate_submission(role_name, reason)?;
        let request = self.store.insert_role_request(actor, request).await?;

        info!(
            "User {} requested role '{}' ({})",
            actor.user_id, request.requested_role, request.id
        );
        Ok(request)
    }

    /// Approve or reject a pending request. Admin only.
    pub async fn decide(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<RoleRequest> {
        match self.store.decide_role_request(actor, id, decision).await {
            Ok(request) => {
                info!(
                    "Admin {} {} role request {}",
                    actor.user_id, request.status, id
                );
                Ok(request)
            }
            Err(e) => {
                warn!("Decision on role request {} refused: {}", id, e);
                Err(e)
            }
        }
    }

    /// Requests awaiting a decision. Admin only.
    pub async fn pending(&self, actor: &Actor) -> WorkflowResult<Vec<RoleRequest>> {
        authz::require_admin(
            &self.store.roles_of(actor.user_id).await?,
            "review role requests",
        )?;

        self.store
            .list_role_requests(RoleRequestFilter {
                status: Some(ReviewStatus::Pending),
                user_id: None,
            })
            .await
    }

    /// The actor's own requests, whatever their status
    pub async fn own(&self, actor: &Actor) -> WorkflowResult<Vec<RoleRequest>> {
        self.store
            .list_role_requests(RoleRequestFilter {
                status: None,
                user_id: Some(actor.user_id),
            })
            .await
    }
}
