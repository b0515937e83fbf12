//! Persistence seam for every workflow
//!
//! Each state-changing method is one atomic unit: it re-reads the governing
//! row (and the actor's roles), checks its preconditions and writes, all
//! inside a single transaction or lock acquisition. Concurrent callers can
//! therefore never both win the last project slot or both decide the same
//! request.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::WorkflowResult;
use crate::models::{
    Actor, Donation, DonationFilter, DonationPayload, DonationRequest, DonationRequestFilter,
    Membership, NewDonationRequest, NewProject, NewRoleRequest, NewUser, Project, ProjectFilter,
    ProjectSummary, RoleKind, RoleRequest, RoleRequestFilter, UpdateDonationRequest,
    UpdateProject, User, UserWithRoles,
};
use crate::review::Decision;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage backend used by the workflow services
#[async_trait]
pub trait Store: Send + Sync {
    // Identity & roles

    /// Insert a user, plus an optional role request created in the same unit
    async fn create_user(
        &self,
        user: NewUser,
        role_request: Option<NewRoleRequest>,
    ) -> WorkflowResult<(User, Option<RoleRequest>)>;

    async fn find_user(&self, id: Uuid) -> WorkflowResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> WorkflowResult<Option<User>>;

    async fn list_users(&self) -> WorkflowResult<Vec<UserWithRoles>>;

    async fn roles_of(&self, user_id: Uuid) -> WorkflowResult<Vec<RoleKind>>;

    /// Grant `role` to `user_id`; no-op when already held. Admin only.
    async fn assign_role(&self, actor: &Actor, user_id: Uuid, role: RoleKind)
    -> WorkflowResult<()>;

    /// Revoke `role` from `user_id`; no-op when not held. Admin only.
    async fn unassign_role(
        &self,
        actor: &Actor,
        user_id: Uuid,
        role: RoleKind,
    ) -> WorkflowResult<()>;

    /// Find or create the user by email and make admin their only role
    async fn bootstrap_admin(&self, user: NewUser) -> WorkflowResult<User>;

    // Role requests

    async fn insert_role_request(
        &self,
        actor: &Actor,
        request: NewRoleRequest,
    ) -> WorkflowResult<RoleRequest>;

    /// Decide a pending request; approval grants the role in the same unit
    async fn decide_role_request(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<RoleRequest>;

    async fn list_role_requests(&self, filter: RoleRequestFilter)
    -> WorkflowResult<Vec<RoleRequest>>;

    // Projects & membership

    async fn insert_project(&self, actor: &Actor, project: NewProject) -> WorkflowResult<Project>;

    async fn update_project(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: UpdateProject,
    ) -> WorkflowResult<Project>;

    async fn delete_project(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()>;

    async fn find_project(&self, id: Uuid) -> WorkflowResult<Option<ProjectSummary>>;

    async fn list_projects(&self, filter: ProjectFilter) -> WorkflowResult<Vec<ProjectSummary>>;

    async fn is_member(&self, user_id: Uuid, project_id: Uuid) -> WorkflowResult<bool>;

    async fn join_project(&self, actor: &Actor, project_id: Uuid) -> WorkflowResult<Membership>;

    /// Remove the actor's membership; no-op when absent
    async fn leave_project(&self, actor: &Actor, project_id: Uuid) -> WorkflowResult<()>;

    async fn participant_count(&self, project_id: Uuid) -> WorkflowResult<i64>;

    // Donation requests

    async fn insert_donation_request(
        &self,
        actor: &Actor,
        request: NewDonationRequest,
    ) -> WorkflowResult<DonationRequest>;

    async fn update_donation_request(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: UpdateDonationRequest,
    ) -> WorkflowResult<DonationRequest>;

    async fn delete_donation_request(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()>;

    async fn decide_donation_request(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<DonationRequest>;

    async fn find_donation_request(&self, id: Uuid) -> WorkflowResult<Option<DonationRequest>>;

    async fn list_donation_requests(
        &self,
        filter: DonationRequestFilter,
    ) -> WorkflowResult<Vec<DonationRequest>>;

    // Donations

    /// Record a donation against an approved request
    async fn insert_donation(
        &self,
        actor: &Actor,
        donation_request_id: Uuid,
        payload: DonationPayload,
    ) -> WorkflowResult<Donation>;

    async fn review_donation(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<Donation>;

    /// Replace the contributed values of a pending donation
    async fn update_donation(
        &self,
        actor: &Actor,
        id: Uuid,
        payload: DonationPayload,
    ) -> WorkflowResult<Donation>;

    async fn delete_donation(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()>;

    /// A request together with all of its donations, read as one snapshot
    async fn donation_ledger(
        &self,
        donation_request_id: Uuid,
    ) -> WorkflowResult<Option<(DonationRequest, Vec<Donation>)>>;

    async fn list_donations(&self, filter: DonationFilter) -> WorkflowResult<Vec<Donation>>;
}
