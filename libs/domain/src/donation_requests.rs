//! Donation request approval workflow
//!
//! Campaigns start pending and are approved or rejected once by an admin.
//! Only approved campaigns are publicly listed and accept donations.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::authz;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{
    Actor, DonationRequest, DonationRequestFilter, NewDonationRequest, UpdateDonationRequest,
};
use crate::review::{Decision, ReviewStatus};
use crate::store::Store;
use crate::validation;

/// Fail unless the request still awaits its decision
pub fn check_editable(request: &DonationRequest) -> WorkflowResult<()> {
    if request.status != ReviewStatus::Pending {
        return Err(WorkflowError::State(format!(
            "Donation request is {} and can no longer be edited",
            request.status
        )));
    }
    Ok(())
}

/// Fail unless the request has been approved
pub fn check_accepts_donations(request: &DonationRequest) -> WorkflowResult<()> {
    if request.status != ReviewStatus::Approved {
        return Err(WorkflowError::State(format!(
            "Donation request is {} and does not accept donations",
            request.status
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct DonationRequestService {
    store: Arc<dyn Store>,
}

impl DonationRequestService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Open a new campaign owned by the actor, pending admin approval
    pub async fn create(
        &self,
        actor: &Actor,
        request: NewDonationRequest,
    ) -> WorkflowResult<DonationRequest> {
        let request = validation::validate_donation_request(request)?;
        let request = self.store.insert_donation_request(actor, request).await?;
        info!(
            "User {} created {} donation request {}",
            actor.user_id, request.kind, request.id
        );
        Ok(request)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: UpdateDonationRequest,
    ) -> WorkflowResult<DonationRequest> {
        let request = self.store.update_donation_request(actor, id, changes).await?;
        info!("User {} updated donation request {}", actor.user_id, id);
        Ok(request)
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()> {
        self.store.delete_donation_request(actor, id).await?;
        info!("User {} deleted donation request {}", actor.user_id, id);
        Ok(())
    }

    /// Approve or reject a pending campaign. Admin only.
    pub async fn decide(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<DonationRequest> {
        match self.store.decide_donation_request(actor, id, decision).await {
            Ok(request) => {
                info!(
                    "Admin {} {} donation request {}",
                    actor.user_id, request.status, id
                );
                Ok(request)
            }
            Err(e) => {
                warn!("Decision on donation request {} refused: {}", id, e);
                Err(e)
            }
        }
    }

    /// Approved campaigns, visible to everyone
    pub async fn public(&self) -> WorkflowResult<Vec<DonationRequest>> {
        self.store
            .list_donation_requests(DonationRequestFilter {
                status: Some(ReviewStatus::Approved),
                user_id: None,
            })
            .await
    }

    /// Campaigns awaiting a decision. Admin only.
    pub async fn pending(&self, actor: &Actor) -> WorkflowResult<Vec<DonationRequest>> {
        authz::require_admin(
            &self.store.roles_of(actor.user_id).await?,
            "review donation requests",
        )?;

        self.store
            .list_donation_requests(DonationRequestFilter {
                status: Some(ReviewStatus::Pending),
                user_id: None,
            })
            .await
    }

    /// The actor's own campaigns, optionally narrowed to one status
    pub async fn own(
        &self,
        actor: &Actor,
        status: Option<ReviewStatus>,
    ) -> WorkflowResult<Vec<DonationRequest>> {
        self.store
            .list_donation_requests(DonationRequestFilter {
                status,
                user_id: Some(actor.user_id),
            })
            .await
    }
}
