//! In-memory store
//!
//! All state sits behind one async mutex and every operation holds it for
//! its whole check-then-write sequence, which gives each call the same
//! atomicity a database transaction would.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::Store;
use crate::authz;
use crate::donation_requests;
use crate::donations;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{
    Actor, Donation, DonationFilter, DonationPayload, DonationRequest, DonationRequestFilter,
    Membership, NewDonationRequest, NewProject, NewRoleRequest, NewUser, Project, ProjectFilter,
    ProjectSummary, RoleKind, RoleRequest, RoleRequestFilter, UpdateDonationRequest,
    UpdateProject, User, UserWithRoles,
};
use crate::projects;
use crate::review::{Decision, ReviewStatus};
use crate::validation;

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<User>,
    user_roles: HashMap<Uuid, BTreeSet<RoleKind>>,
    role_requests: Vec<RoleRequest>,
    projects: Vec<Project>,
    memberships: Vec<Membership>,
    donation_requests: Vec<DonationRequest>,
    donations: Vec<Donation>,
}

impl MemoryState {
    fn roles(&self, user_id: Uuid) -> Vec<RoleKind> {
        self.user_roles
            .get(&user_id)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }

    fn user_exists(&self, user_id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    fn new_role_request(&self, user_id: Uuid, request: NewRoleRequest) -> RoleRequest {
        let now = Utc::now();
        RoleRequest {
            id: Uuid::new_v4(),
            user_id,
            requested_role: request.requested_role,
            reason: request.reason,
            status: ReviewStatus::Pending,
            decided_by: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn participant_count(&self, project_id: Uuid) -> i64 {
        self.memberships
            .iter()
            .filter(|m| m.project_id == project_id)
            .count() as i64
    }

    fn summary(&self, project: &Project) -> ProjectSummary {
        ProjectSummary {
            project: project.clone(),
            participant_count: self.participant_count(project.id),
        }
    }

    fn project_index(&self, id: Uuid) -> WorkflowResult<usize> {
        self.projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| WorkflowError::not_found("project", id))
    }

    fn donation_request_index(&self, id: Uuid) -> WorkflowResult<usize> {
        self.donation_requests
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| WorkflowError::not_found("donation request", id))
    }

    fn donation_index(&self, id: Uuid) -> WorkflowResult<usize> {
        self.donations
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| WorkflowError::not_found("donation", id))
    }
}

/// Store keeping everything in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(
        &self,
        user: NewUser,
        role_request: Option<NewRoleRequest>,
    ) -> WorkflowResult<(User, Option<RoleRequest>)> {
        let mut state = self.state.lock().await;

        if state
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(WorkflowError::Conflict(
                "Email is already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());

        let request = role_request.map(|request| state.new_role_request(user.id, request));
        if let Some(request) = &request {
            state.role_requests.push(request.clone());
        }

        Ok((user, request))
    }

    async fn find_user(&self, id: Uuid) -> WorkflowResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> WorkflowResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self) -> WorkflowResult<Vec<UserWithRoles>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .rev()
            .map(|user| UserWithRoles {
                user: user.clone(),
                roles: state.roles(user.id),
            })
            .collect())
    }

    async fn roles_of(&self, user_id: Uuid) -> WorkflowResult<Vec<RoleKind>> {
        let state = self.state.lock().await;
        Ok(state.roles(user_id))
    }

    async fn assign_role(
        &self,
        actor: &Actor,
        user_id: Uuid,
        role: RoleKind,
    ) -> WorkflowResult<()> {
        let mut state = self.state.lock().await;
        authz::require_admin(&state.roles(actor.user_id), "assign roles")?;

        if !state.user_exists(user_id) {
            return Err(WorkflowError::not_found("user", user_id));
        }

        state.user_roles.entry(user_id).or_default().insert(role);
        Ok(())
    }

    async fn unassign_role(
        &self,
        actor: &Actor,
        user_id: Uuid,
        role: RoleKind,
    ) -> WorkflowResult<()> {
        let mut state = self.state.lock().await;
        authz::require_admin(&state.roles(actor.user_id), "unassign roles")?;

        if !state.user_exists(user_id) {
            return Err(WorkflowError::not_found("user", user_id));
        }

        if let Some(roles) = state.user_roles.get_mut(&user_id) {
            roles.remove(&role);
        }
        Ok(())
    }

    async fn bootstrap_admin(&self, user: NewUser) -> WorkflowResult<User> {
        let mut state = self.state.lock().await;

        let existing = state
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(&user.email))
            .cloned();

        let admin = match existing {
            Some(admin) => admin,
            None => {
                let now = Utc::now();
                let admin = User {
                    id: Uuid::new_v4(),
                    name: user.name,
                    email: user.email,
                    password_hash: user.password_hash,
                    created_at: now,
                    updated_at: now,
                };
                state.users.push(admin.clone());
                admin
            }
        };

        state
            .user_roles
            .insert(admin.id, BTreeSet::from([RoleKind::Admin]));
        Ok(admin)
    }

    async fn insert_role_request(
        &self,
        actor: &Actor,
        request: NewRoleRequest,
    ) -> WorkflowResult<RoleRequest> {
        let mut state = self.state.lock().await;

        if !state.user_exists(actor.user_id) {
            return Err(WorkflowError::not_found("user", actor.user_id));
        }

        let request = state.new_role_request(actor.user_id, request);
        state.role_requests.push(request.clone());
        Ok(request)
    }

    async fn decide_role_request(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<RoleRequest> {
        let mut state = self.state.lock().await;
        authz::require_admin(&state.roles(actor.user_id), "decide role requests")?;

        let request = state
            .role_requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| WorkflowError::not_found("role request", id))?;

        request.status = request.status.decide(decision)?;
        request.decided_by = Some(actor.user_id);
        request.decided_at = Some(Utc::now());
        request.updated_at = Utc::now();
        let request = request.clone();

        if request.status == ReviewStatus::Approved {
            state
                .user_roles
                .entry(request.user_id)
                .or_default()
                .insert(request.requested_role);
            info!(
                "Granted role '{}' to user {}",
                request.requested_role, request.user_id
            );
        }

        Ok(request)
    }

    async fn list_role_requests(
        &self,
        filter: RoleRequestFilter,
    ) -> WorkflowResult<Vec<RoleRequest>> {
        let state = self.state.lock().await;
        Ok(state
            .role_requests
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert_project(&self, actor: &Actor, project: NewProject) -> WorkflowResult<Project> {
        let mut state = self.state.lock().await;
        authz::require_role(
            &state.roles(actor.user_id),
            RoleKind::ProjectManager,
            "create projects",
        )?;

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            manager_id: actor.user_id,
            name: project.name,
            description: project.description,
            is_active: project.is_active,
            start_date: project.start_date,
            required_participants: project.required_participants,
            image_url: project.image_url,
            created_at: now,
            updated_at: now,
        };
        state.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: UpdateProject,
    ) -> WorkflowResult<Project> {
        let mut state = self.state.lock().await;
        let index = state.project_index(id)?;
        let roles = state.roles(actor.user_id);
        authz::require_owner_or_admin(
            actor,
            state.projects[index].manager_id,
            &roles,
            "edit this project",
        )?;

        let mut updated = state.projects[index].clone();
        changes.apply_to(&mut updated);
        let updated = projects::check_update(updated, state.participant_count(id))?;

        state.projects[index] = updated.clone();
        Ok(updated)
    }

    async fn delete_project(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()> {
        let mut state = self.state.lock().await;
        let index = state.project_index(id)?;
        let roles = state.roles(actor.user_id);
        authz::require_owner_or_admin(
            actor,
            state.projects[index].manager_id,
            &roles,
            "delete this project",
        )?;

        state.projects.remove(index);
        state.memberships.retain(|m| m.project_id != id);
        Ok(())
    }

    async fn find_project(&self, id: Uuid) -> WorkflowResult<Option<ProjectSummary>> {
        let state = self.state.lock().await;
        Ok(state
            .projects
            .iter()
            .find(|p| p.id == id)
            .map(|p| state.summary(p)))
    }

    async fn list_projects(&self, filter: ProjectFilter) -> WorkflowResult<Vec<ProjectSummary>> {
        let state = self.state.lock().await;
        Ok(state
            .projects
            .iter()
            .rev()
            .filter(|p| filter.manager_id.is_none_or(|m| p.manager_id == m))
            .filter(|p| {
                filter.member_id.is_none_or(|member| {
                    state
                        .memberships
                        .iter()
                        .any(|m| m.project_id == p.id && m.user_id == member)
                })
            })
            .map(|p| state.summary(p))
            .collect())
    }

    async fn is_member(&self, user_id: Uuid, project_id: Uuid) -> WorkflowResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .memberships
            .iter()
            .any(|m| m.user_id == user_id && m.project_id == project_id))
    }

    async fn join_project(&self, actor: &Actor, project_id: Uuid) -> WorkflowResult<Membership> {
        let mut state = self.state.lock().await;
        let index = state.project_index(project_id)?;

        let already_joined = state
            .memberships
            .iter()
            .any(|m| m.user_id == actor.user_id && m.project_id == project_id);
        let count = state.participant_count(project_id);
        projects::check_join(&state.projects[index], already_joined, count)?;

        let membership = Membership {
            user_id: actor.user_id,
            project_id,
            joined_at: Utc::now(),
        };
        state.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn leave_project(&self, actor: &Actor, project_id: Uuid) -> WorkflowResult<()> {
        let mut state = self.state.lock().await;
        state
            .memberships
            .retain(|m| !(m.user_id == actor.user_id && m.project_id == project_id));
        Ok(())
    }

    async fn participant_count(&self, project_id: Uuid) -> WorkflowResult<i64> {
        let state = self.state.lock().await;
        state.project_index(project_id)?;
        Ok(state.participant_count(project_id))
    }

    async fn insert_donation_request(
        &self,
        actor: &Actor,
        request: NewDonationRequest,
    ) -> WorkflowResult<DonationRequest> {
        let mut state = self.state.lock().await;
        authz::require_role(
            &state.roles(actor.user_id),
            RoleKind::DonationReceiver,
            "create donation requests",
        )?;

        let now = Utc::now();
        let request = DonationRequest {
            id: Uuid::new_v4(),
            user_id: actor.user_id,
            title: request.title,
            description: request.description,
            category: request.category,
            kind: request.kind,
            target_amount: request.target_amount,
            target_items: request.target_items,
            status: ReviewStatus::Pending,
            decided_by: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        };
        state.donation_requests.push(request.clone());
        Ok(request)
    }

    async fn update_donation_request(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: UpdateDonationRequest,
    ) -> WorkflowResult<DonationRequest> {
        let mut state = self.state.lock().await;
        let index = state.donation_request_index(id)?;
        let roles = state.roles(actor.user_id);
        let current = &state.donation_requests[index];
        authz::require_owner_or_admin(
            actor,
            current.user_id,
            &roles,
            "edit this donation request",
        )?;
        donation_requests::check_editable(current)?;

        let merged = validation::validate_donation_request(changes.merge(current))?;
        let request = &mut state.donation_requests[index];
        request.title = merged.title;
        request.description = merged.description;
        request.category = merged.category;
        request.kind = merged.kind;
        request.target_amount = merged.target_amount;
        request.target_items = merged.target_items;
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    async fn delete_donation_request(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()> {
        let mut state = self.state.lock().await;
        let index = state.donation_request_index(id)?;
        let roles = state.roles(actor.user_id);
        authz::require_owner_or_admin(
            actor,
            state.donation_requests[index].user_id,
            &roles,
            "delete this donation request",
        )?;

        state.donation_requests.remove(index);
        state.donations.retain(|d| d.donation_request_id != id);
        Ok(())
    }

    async fn decide_donation_request(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<DonationRequest> {
        let mut state = self.state.lock().await;
        authz::require_admin(&state.roles(actor.user_id), "decide donation requests")?;
        let index = state.donation_request_index(id)?;

        let request = &mut state.donation_requests[index];
        request.status = request.status.decide(decision)?;
        request.decided_by = Some(actor.user_id);
        request.decided_at = Some(Utc::now());
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    async fn find_donation_request(&self, id: Uuid) -> WorkflowResult<Option<DonationRequest>> {
        let state = self.state.lock().await;
        Ok(state.donation_requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_donation_requests(
        &self,
        filter: DonationRequestFilter,
    ) -> WorkflowResult<Vec<DonationRequest>> {
        let state = self.state.lock().await;
        Ok(state
            .donation_requests
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert_donation(
        &self,
        actor: &Actor,
        donation_request_id: Uuid,
        payload: DonationPayload,
    ) -> WorkflowResult<Donation> {
        let mut state = self.state.lock().await;
        let index = state.donation_request_index(donation_request_id)?;
        let request = &state.donation_requests[index];
        donation_requests::check_accepts_donations(request)?;

        let donation = payload
            .into_contribution(request.kind)?
            .into_donation(donation_request_id, actor.user_id);
        state.donations.push(donation.clone());
        Ok(donation)
    }

    async fn review_donation(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<Donation> {
        let mut state = self.state.lock().await;
        let roles = state.roles(actor.user_id);
        let index = state.donation_index(id)?;

        let request_id = state.donations[index].donation_request_id;
        let owner = state.donation_requests[state.donation_request_index(request_id)?].user_id;
        authz::require_owner_or_admin(actor, owner, &roles, "review this donation")?;

        let donation = &mut state.donations[index];
        donation.status = donation.status.decide(decision)?;
        donation.updated_at = Utc::now();
        Ok(donation.clone())
    }

    async fn update_donation(
        &self,
        actor: &Actor,
        id: Uuid,
        payload: DonationPayload,
    ) -> WorkflowResult<Donation> {
        let mut state = self.state.lock().await;
        let roles = state.roles(actor.user_id);
        let index = state.donation_index(id)?;
        let donation = &state.donations[index];
        authz::require_owner_or_admin(actor, donation.user_id, &roles, "edit this donation")?;
        donations::check_editable(donation)?;

        let request_index = state.donation_request_index(donation.donation_request_id)?;
        let contribution = payload.into_contribution(state.donation_requests[request_index].kind)?;

        let donation = &mut state.donations[index];
        donation.apply(contribution);
        Ok(donation.clone())
    }

    async fn delete_donation(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()> {
        let mut state = self.state.lock().await;
        let roles = state.roles(actor.user_id);
        let index = state.donation_index(id)?;
        authz::require_owner_or_admin(
            actor,
            state.donations[index].user_id,
            &roles,
            "delete this donation",
        )?;

        state.donations.remove(index);
        Ok(())
    }

    async fn donation_ledger(
        &self,
        donation_request_id: Uuid,
    ) -> WorkflowResult<Option<(DonationRequest, Vec<Donation>)>> {
        let state = self.state.lock().await;
        let Some(request) = state
            .donation_requests
            .iter()
            .find(|r| r.id == donation_request_id)
            .cloned()
        else {
            return Ok(None);
        };

        let donations = state
            .donations
            .iter()
            .rev()
            .filter(|d| d.donation_request_id == donation_request_id)
            .cloned()
            .collect();
        Ok(Some((request, donations)))
    }

    async fn list_donations(&self, filter: DonationFilter) -> WorkflowResult<Vec<Donation>> {
        let state = self.state.lock().await;
        Ok(state
            .donations
            .iter()
            .rev()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }
}
