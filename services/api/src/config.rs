//! Server configuration loaded from `APP_*` environment variables

use config::{Config, ConfigError, Environment};
use domain::ProgressPolicy;
use serde::Deserialize;

/// Storage backend selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Postgres,
    Memory,
}

/// Credentials of the admin account seeded at startup
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Server configuration
///
/// # Environment Variables
/// - `APP_BIND_ADDRESS`: listen address (default: 0.0.0.0:3001)
/// - `APP_STORAGE`: `postgres` or `memory` (default: postgres)
/// - `APP_PROGRESS_POLICY`: `all_donations` or `approved_only` (default: all_donations)
/// - `APP_ADMIN_EMAIL`, `APP_ADMIN_PASSWORD`, `APP_ADMIN_NAME`: optional admin bootstrap
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub progress_policy: ProgressPolicy,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub admin_name: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("bind_address", "0.0.0.0:3001")?
            .add_source(Environment::with_prefix("APP"))
            .build()?
            .try_deserialize()
    }

    /// Admin seed, present only when both email and password are configured
    pub fn admin_seed(&self) -> Option<AdminSeed> {
        let email = self.admin_email.clone().filter(|e| !e.trim().is_empty())?;
        let password = self.admin_password.clone().filter(|p| !p.is_empty())?;

        Some(AdminSeed {
            name: self
                .admin_name
                .clone()
                .unwrap_or_else(|| "Admin".to_string()),
            email,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "APP_BIND_ADDRESS",
        "APP_STORAGE",
        "APP_PROGRESS_POLICY",
        "APP_ADMIN_EMAIL",
        "APP_ADMIN_PASSWORD",
        "APP_ADMIN_NAME",
    ];

    fn clear() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3001");
        assert_eq!(config.storage, StorageKind::Postgres);
        assert_eq!(config.progress_policy, ProgressPolicy::AllDonations);
        assert!(config.admin_seed().is_none());
    }

    #[test]
    #[serial]
    fn test_from_environment() {
        clear();
        unsafe {
            std::env::set_var("APP_BIND_ADDRESS", "127.0.0.1:8080");
            std::env::set_var("APP_STORAGE", "memory");
            std::env::set_var("APP_PROGRESS_POLICY", "approved_only");
            std::env::set_var("APP_ADMIN_EMAIL", "admin@gotong.id");
            std::env::set_var("APP_ADMIN_PASSWORD", "rahasia123");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.progress_policy, ProgressPolicy::ApprovedOnly);

        let seed = config.admin_seed().unwrap();
        assert_eq!(seed.email, "admin@gotong.id");
        assert_eq!(seed.name, "Admin");

        clear();
    }

    #[test]
    #[serial]
    fn test_unknown_storage_is_rejected() {
        clear();
        unsafe {
            std::env::set_var("APP_STORAGE", "cassandra");
        }

        assert!(ServerConfig::from_env().is_err());

        clear();
    }
}
