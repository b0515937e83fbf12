//! Identity and role store
//!
//! Registration, login, admin bootstrap and role assignment. Role names
//! arriving from clients are resolved against the static catalog here; an
//! unknown name is a not-found error.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::authz;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{
    Actor, Dashboard, NewUser, Role, RoleKind, RoleRequest, User, UserWithRoles,
};
use crate::role_requests;
use crate::store::Store;
use crate::validation::{validate_email, validate_name, validate_password};

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Optional role to request right away
    #[serde(default)]
    pub requested_role: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Hash a password into an argon2 PHC string
pub fn hash_password(password: &str) -> WorkflowResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WorkflowError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored argon2 hash
pub fn verify_password(password: &str, password_hash: &str) -> WorkflowResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| WorkflowError::Internal(format!("Failed to parse password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Users, credentials and role assignments
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn Store>,
}

impl IdentityService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Register a user, optionally filing a role request in the same step
    pub async fn register(
        &self,
        registration: Registration,
    ) -> WorkflowResult<(User, Option<RoleRequest>)> {
        let email = normalize_email(&registration.email);
        validate_name(&registration.name).map_err(WorkflowError::Validation)?;
        validate_email(&email).map_err(WorkflowError::Validation)?;
        validate_password(&registration.password).map_err(WorkflowError::Validation)?;

        let role_request = match registration.requested_role.as_deref() {
            Some(role) if !role.trim().is_empty() => Some(role_requests::validate_submission(
                role,
                registration.reason.as_deref().unwrap_or_default(),
            )?),
            _ => None,
        };

        let new_user = NewUser {
            name: registration.name.trim().to_string(),
            email,
            password_hash: hash_password(&registration.password)?,
        };

        let (user, request) = self.store.create_user(new_user, role_request).await?;
        info!("Registered user {} ({})", user.id, user.email);
        if let Some(request) = &request {
            info!(
                "User {} requested role '{}' at registration",
                user.id, request.requested_role
            );
        }

        Ok((user, request))
    }

    /// Verify credentials; unknown email and wrong password look the same
    pub async fn authenticate(&self, email: &str, password: &str) -> WorkflowResult<Option<User>> {
        let Some(user) = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
        else {
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            warn!("Failed login attempt for user {}", user.id);
            Ok(None)
        }
    }

    /// Find or create the admin account and make admin its only role
    pub async fn bootstrap_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> WorkflowResult<User> {
        let email = normalize_email(email);
        validate_name(name).map_err(WorkflowError::Validation)?;
        validate_email(&email).map_err(WorkflowError::Validation)?;
        validate_password(password).map_err(WorkflowError::Validation)?;

        let admin = self
            .store
            .bootstrap_admin(NewUser {
                name: name.trim().to_string(),
                email,
                password_hash: hash_password(password)?,
            })
            .await?;

        info!("Admin account ready: {}", admin.email);
        Ok(admin)
    }

    pub async fn find_user(&self, id: Uuid) -> WorkflowResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("user", id))
    }

    /// Add `role_name` to the user; re-assigning a held role is a no-op
    pub async fn assign_role(
        &self,
        actor: &Actor,
        user_id: Uuid,
        role_name: &str,
    ) -> WorkflowResult<()> {
        let role = RoleKind::from_str(role_name)?;
        self.store.assign_role(actor, user_id, role).await?;
        info!("Admin {} assigned role '{}' to user {}", actor.user_id, role, user_id);
        Ok(())
    }

    /// Remove `role_name` from the user; removing an absent role is a no-op
    pub async fn unassign_role(
        &self,
        actor: &Actor,
        user_id: Uuid,
        role_name: &str,
    ) -> WorkflowResult<()> {
        let role = RoleKind::from_str(role_name)?;
        self.store.unassign_role(actor, user_id, role).await?;
        info!(
            "Admin {} unassigned role '{}' from user {}",
            actor.user_id, role, user_id
        );
        Ok(())
    }

    pub async fn has_role(&self, user_id: Uuid, role_name: &str) -> WorkflowResult<bool> {
        let role = RoleKind::from_str(role_name)?;
        Ok(self.store.roles_of(user_id).await?.contains(&role))
    }

    pub async fn roles_of(&self, user_id: Uuid) -> WorkflowResult<Vec<RoleKind>> {
        self.store.roles_of(user_id).await
    }

    /// Every user with their roles. Admin only.
    pub async fn list_users(&self, actor: &Actor) -> WorkflowResult<Vec<UserWithRoles>> {
        authz::require_admin(&self.store.roles_of(actor.user_id).await?, "list users")?;
        self.store.list_users().await
    }

    /// Dashboard the user lands on after login
    pub async fn dashboard_for(&self, user_id: Uuid) -> WorkflowResult<Dashboard> {
        Ok(Dashboard::for_roles(&self.store.roles_of(user_id).await?))
    }

    /// The static role catalog
    pub fn catalog(&self) -> Vec<Role> {
        RoleKind::ALL.into_iter().map(Role::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("rahasia123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("rahasia123", &hash).unwrap());
        assert!(!verify_password("salah-sandi", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        let err = verify_password("rahasia123", "not-a-hash").unwrap_err();
        assert_eq!(err.kind(), "internal");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Relawan@Donasi.COM "), "relawan@donasi.com");
    }
}
