//! Role catalog and related functionality

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WorkflowError;

/// Closed set of role kinds known to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleKind {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "pengelola proyek")]
    ProjectManager,
    #[serde(rename = "donatur receiver")]
    DonationReceiver,
}

impl RoleKind {
    /// Every role in the static catalog
    pub const ALL: [RoleKind; 3] = [
        RoleKind::Admin,
        RoleKind::ProjectManager,
        RoleKind::DonationReceiver,
    ];

    /// Machine name as stored in the `roles` table
    pub fn name(self) -> &'static str {
        match self {
            RoleKind::Admin => "admin",
            RoleKind::ProjectManager => "pengelola proyek",
            RoleKind::DonationReceiver => "donatur receiver",
        }
    }

    /// Human-readable label
    pub fn display_name(self) -> &'static str {
        match self {
            RoleKind::Admin => "Admin",
            RoleKind::ProjectManager => "Project Manager",
            RoleKind::DonationReceiver => "Penerima Donasi",
        }
    }

    /// Look up a role by machine name, ignoring case and surrounding spaces
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        RoleKind::ALL
            .into_iter()
            .find(|role| role.name().eq_ignore_ascii_case(name))
    }

    /// Whether users may ask for this role through a role request
    pub fn is_requestable(self) -> bool {
        !matches!(self, RoleKind::Admin)
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoleKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleKind::from_name(s).ok_or_else(|| WorkflowError::not_found("role", s.trim()))
    }
}

/// Role catalog entry as exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub name: &'static str,
    pub display_name: &'static str,
}

impl From<RoleKind> for Role {
    fn from(kind: RoleKind) -> Self {
        Self {
            name: kind.name(),
            display_name: kind.display_name(),
        }
    }
}

/// Landing dashboard selected from the roles a user holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dashboard {
    Admin,
    ProjectManager,
    DonationReceiver,
    User,
}

impl Dashboard {
    /// Admin wins over project manager, which wins over donation receiver
    pub fn for_roles(roles: &[RoleKind]) -> Self {
        if roles.contains(&RoleKind::Admin) {
            Dashboard::Admin
        } else if roles.contains(&RoleKind::ProjectManager) {
            Dashboard::ProjectManager
        } else if roles.contains(&RoleKind::DonationReceiver) {
            Dashboard::DonationReceiver
        } else {
            Dashboard::User
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_is_lenient_about_case_and_spaces() {
        assert_eq!(RoleKind::from_name("admin"), Some(RoleKind::Admin));
        assert_eq!(
            RoleKind::from_name("  Pengelola Proyek "),
            Some(RoleKind::ProjectManager)
        );
        assert_eq!(
            RoleKind::from_name("donatur receiver"),
            Some(RoleKind::DonationReceiver)
        );
        assert_eq!(RoleKind::from_name("superuser"), None);
    }

    #[test]
    fn test_unknown_role_parses_to_not_found() {
        let err = "superuser".parse::<RoleKind>().unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_admin_is_not_requestable() {
        assert!(!RoleKind::Admin.is_requestable());
        assert!(RoleKind::ProjectManager.is_requestable());
        assert!(RoleKind::DonationReceiver.is_requestable());
    }

    #[test]
    fn test_serde_uses_machine_names() {
        let json = serde_json::to_string(&RoleKind::ProjectManager).unwrap();
        assert_eq!(json, "\"pengelola proyek\"");
        let parsed: RoleKind = serde_json::from_str("\"donatur receiver\"").unwrap();
        assert_eq!(parsed, RoleKind::DonationReceiver);
    }

    #[test]
    fn test_dashboard_priority() {
        assert_eq!(Dashboard::for_roles(&[]), Dashboard::User);
        assert_eq!(
            Dashboard::for_roles(&[RoleKind::DonationReceiver, RoleKind::ProjectManager]),
            Dashboard::ProjectManager
        );
        assert_eq!(
            Dashboard::for_roles(&[RoleKind::DonationReceiver, RoleKind::Admin]),
            Dashboard::Admin
        );
        assert_eq!(
            Dashboard::for_roles(&[RoleKind::DonationReceiver]),
            Dashboard::DonationReceiver
        );
    }
}
