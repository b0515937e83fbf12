//! Donations and campaign progress

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{Actor, Donation, DonationFilter, DonationPayload, DonationRequest, RoleKind};
use crate::progress::{self, DonationProgress, ProgressPolicy};
use crate::review::{Decision, ReviewStatus};
use crate::store::Store;

/// A campaign with its computed progress and donation records
#[derive(Debug, Clone, Serialize)]
pub struct DonationRequestDetail {
    pub request: DonationRequest,
    pub progress: DonationProgress,
    pub donations: Vec<Donation>,
}

/// Fail unless the donation is still awaiting review
pub fn check_editable(donation: &Donation) -> WorkflowResult<()> {
    if donation.status != ReviewStatus::Pending {
        return Err(WorkflowError::State(format!(
            "Donation is {} and can no longer be edited",
            donation.status
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct DonationService {
    store: Arc<dyn Store>,
    policy: ProgressPolicy,
}

impl DonationService {
    pub fn new(store: Arc<dyn Store>, policy: ProgressPolicy) -> Self {
        Self { store, policy }
    }

    /// Record a donation against an approved campaign
    pub async fn add_donation(
        &self,
        actor: &Actor,
        donation_request_id: Uuid,
        payload: DonationPayload,
    ) -> WorkflowResult<Donation> {
        match self
            .store
            .insert_donation(actor, donation_request_id, payload)
            .await
        {
            Ok(donation) => {
                info!(
                    "User {} donated {} {} to request {}",
                    actor.user_id,
                    donation.units(),
                    donation.kind,
                    donation_request_id
                );
                Ok(donation)
            }
            Err(e) => {
                warn!(
                    "Donation by user {} to request {} refused: {}",
                    actor.user_id, donation_request_id, e
                );
                Err(e)
            }
        }
    }

    /// Progress of a campaign, recomputed from its records on every call
    pub async fn progress(&self, donation_request_id: Uuid) -> WorkflowResult<DonationProgress> {
        let (request, donations) = self
            .store
            .donation_ledger(donation_request_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("donation request", donation_request_id))?;

        Ok(progress::compute(&request, &donations, self.policy))
    }

    /// Campaign detail. Unapproved campaigns are only visible to their owner
    /// and to admins; anyone else gets not-found.
    pub async fn detail(
        &self,
        viewer: Option<&Actor>,
        donation_request_id: Uuid,
    ) -> WorkflowResult<DonationRequestDetail> {
        let not_found = || WorkflowError::not_found("donation request", donation_request_id);

        let (request, donations) = self
            .store
            .donation_ledger(donation_request_id)
            .await?
            .ok_or_else(not_found)?;

        if request.status != ReviewStatus::Approved {
            let Some(actor) = viewer else {
                return Err(not_found());
            };
            if actor.user_id != request.user_id
                && !self
                    .store
                    .roles_of(actor.user_id)
                    .await?
                    .contains(&RoleKind::Admin)
            {
                return Err(not_found());
            }
        }

        let progress = progress::compute(&request, &donations, self.policy);
        Ok(DonationRequestDetail {
            request,
            progress,
            donations,
        })
    }

    /// Approve or reject a pending donation. Campaign owner or admin.
    pub async fn review(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: Decision,
    ) -> WorkflowResult<Donation> {
        let donation = self.store.review_donation(actor, id, decision).await?;
        info!("User {} {} donation {}", actor.user_id, donation.status, id);
        Ok(donation)
    }

    /// Edit a pending donation. Donor or admin; the payload must match the
    /// campaign's kind.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        payload: DonationPayload,
    ) -> WorkflowResult<Donation> {
        let donation = self.store.update_donation(actor, id, payload).await?;
        info!("User {} updated donation {}", actor.user_id, id);
        Ok(donation)
    }

    /// Delete a donation. Donor or admin.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> WorkflowResult<()> {
        self.store.delete_donation(actor, id).await?;
        info!("User {} deleted donation {}", actor.user_id, id);
        Ok(())
    }

    /// Donations made by the actor
    pub async fn own(&self, actor: &Actor) -> WorkflowResult<Vec<Donation>> {
        self.store
            .list_donations(DonationFilter {
                user_id: Some(actor.user_id),
                donation_request_id: None,
            })
            .await
    }
}
