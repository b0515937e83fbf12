//! Application state shared across handlers

use domain::store::Store;
use domain::{
    DonationRequestService, DonationService, IdentityService, ProgressPolicy, ProjectService,
    RoleRequestService,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::jwt::JwtService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Present only when running on PostgreSQL
    pub db_pool: Option<PgPool>,
    pub jwt_service: JwtService,
    pub identity: IdentityService,
    pub role_requests: RoleRequestService,
    pub projects: ProjectService,
    pub donation_requests: DonationRequestService,
    pub donations: DonationService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        db_pool: Option<PgPool>,
        jwt_service: JwtService,
        policy: ProgressPolicy,
    ) -> Self {
        Self {
            db_pool,
            jwt_service,
            identity: IdentityService::new(store.clone()),
            role_requests: RoleRequestService::new(store.clone()),
            projects: ProjectService::new(store.clone()),
            donation_requests: DonationRequestService::new(store.clone()),
            donations: DonationService::new(store, policy),
        }
    }
}
