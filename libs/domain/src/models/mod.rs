//! Domain models

pub mod donation;
pub mod project;
pub mod role;
pub mod role_request;
pub mod user;

// Re-export for convenience
pub use donation::{
    Contribution, Donation, DonationFilter, DonationKind, DonationPayload, DonationRequest,
    DonationRequestFilter, NewDonationRequest, UpdateDonationRequest,
};
pub use project::{Membership, NewProject, Project, ProjectFilter, ProjectSummary, UpdateProject};
pub use role::{Dashboard, Role, RoleKind};
pub use role_request::{NewRoleRequest, RoleRequest, RoleRequestFilter};
pub use user::{Actor, NewUser, User, UserWithRoles};
