//! API models for request and response payloads

use domain::models::{Dashboard, RoleKind, RoleRequest, User};
use domain::{Decision, ReviewStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request for login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for register and login
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: User,
    pub roles: Vec<RoleKind>,
    pub dashboard: Dashboard,
}

/// Current user with roles and landing dashboard
#[derive(Serialize)]
pub struct MeResponse {
    pub user: User,
    pub roles: Vec<RoleKind>,
    pub dashboard: Dashboard,
}

/// Request to file a role request
#[derive(Deserialize)]
pub struct RoleRequestPayload {
    pub role: String,
    pub reason: String,
}

/// Request to assign or unassign a role
#[derive(Deserialize)]
pub struct RoleAssignmentPayload {
    pub user_id: Uuid,
    pub role: String,
}

/// Admin or owner decision
#[derive(Deserialize)]
pub struct DecisionPayload {
    pub decision: Decision,
}

/// Optional status filter for listings
#[derive(Deserialize, Default)]
pub struct StatusQuery {
    pub status: Option<ReviewStatus>,
}

/// Response for registration
#[derive(Serialize)]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub auth: AuthResponse,
    pub role_request: Option<RoleRequest>,
}
