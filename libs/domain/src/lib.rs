//! Domain library for the Gotong donation and volunteer platform
//!
//! This crate holds the workflows of the platform: identity and roles, role
//! requests, project membership, donation requests and the donation
//! aggregation engine. Every operation takes the acting user explicitly and
//! persists through a [`store::Store`], backed either by PostgreSQL or by
//! process memory.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use domain::store::MemoryStore;
//! use domain::ProjectService;
//!
//! let store = Arc::new(MemoryStore::new());
//! let projects = ProjectService::new(store);
//! ```

pub mod authz;
pub mod donation_requests;
pub mod donations;
pub mod error;
pub mod identity;
pub mod models;
pub mod progress;
pub mod projects;
pub mod review;
pub mod role_requests;
pub mod store;
pub mod validation;

pub use donation_requests::DonationRequestService;
pub use donations::{DonationRequestDetail, DonationService};
pub use error::{WorkflowError, WorkflowResult};
pub use identity::{IdentityService, Registration};
pub use progress::{DonationProgress, ProgressPolicy};
pub use projects::{ProjectDetail, ProjectService};
pub use review::{Decision, ReviewStatus};
pub use role_requests::RoleRequestService;
