//! Role-based authorization checks
//!
//! Stores load the actor's roles inside the same atomic unit as the mutation
//! and pass them here, so a revoked role can never authorize a late write.

use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{Actor, RoleKind};

/// Fail unless the actor holds the admin role
pub fn require_admin(roles: &[RoleKind], action: &str) -> WorkflowResult<()> {
    if roles.contains(&RoleKind::Admin) {
        Ok(())
    } else {
        Err(WorkflowError::Permission(format!(
            "Only admins may {}",
            action
        )))
    }
}

/// Fail unless the actor holds `role` or is an admin
pub fn require_role(roles: &[RoleKind], role: RoleKind, action: &str) -> WorkflowResult<()> {
    if roles.contains(&role) || roles.contains(&RoleKind::Admin) {
        Ok(())
    } else {
        Err(WorkflowError::Permission(format!(
            "The '{}' role is required to {}",
            role.display_name(),
            action
        )))
    }
}

/// Fail unless the actor owns the record or is an admin
pub fn require_owner_or_admin(
    actor: &Actor,
    owner_id: Uuid,
    roles: &[RoleKind],
    action: &str,
) -> WorkflowResult<()> {
    if actor.user_id == owner_id || roles.contains(&RoleKind::Admin) {
        Ok(())
    } else {
        Err(WorkflowError::Permission(format!(
            "Only the owner or an admin may {}",
            action
        )))
    }
}
