//! Role request model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::RoleKind;
use crate::review::ReviewStatus;

/// A user's petition to be granted an elevated role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub requested_role: RoleKind,
    pub reason: String,
    pub status: ReviewStatus,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated role request payload
#[derive(Debug, Clone)]
pub struct NewRoleRequest {
    pub requested_role: RoleKind,
    pub reason: String,
}

/// Filter for role request listings
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleRequestFilter {
    pub status: Option<ReviewStatus>,
    pub user_id: Option<Uuid>,
}

impl RoleRequestFilter {
    pub fn matches(&self, request: &RoleRequest) -> bool {
        self.status.is_none_or(|status| request.status == status)
            && self.user_id.is_none_or(|user_id| request.user_id == user_id)
    }
}
