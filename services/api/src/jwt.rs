//! JWT access tokens
//!
//! Tokens are signed with RS256 when an RSA key pair is configured and with
//! HS256 from a shared secret otherwise. The subject is the user id.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Signing material
#[derive(Debug, Clone)]
pub enum JwtKeys {
    Rsa {
        private_key: String,
        public_key: String,
    },
    Secret(String),
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub keys: JwtKeys,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
}

/// Read a PEM value, or a path to one (tried from the CWD, then the crate root)
fn read_key(value: String, name: &str) -> anyhow::Result<String> {
    if value.starts_with("-----BEGIN") {
        return Ok(value);
    }

    let key = std::fs::read_to_string(&value)
        .or_else(|_| {
            let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push(&value);
            std::fs::read_to_string(path)
        })
        .map_err(|e| anyhow::anyhow!("Failed to read {} file: {}", name, e))?;

    Ok(key.trim().to_string())
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PRIVATE_KEY` / `JWT_PUBLIC_KEY`: RSA key pair (PEM or path), selects RS256
    /// - `JWT_SECRET`: shared secret, used for HS256 when no key pair is set
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: access token expiry in seconds (default: 900)
    pub fn from_env() -> anyhow::Result<Self> {
        let keys = match (
            std::env::var("JWT_PRIVATE_KEY"),
            std::env::var("JWT_PUBLIC_KEY"),
        ) {
            (Ok(private_key), Ok(public_key)) => JwtKeys::Rsa {
                private_key: read_key(private_key, "private key")?,
                public_key: read_key(public_key, "public key")?,
            },
            _ => {
                let secret = std::env::var("JWT_SECRET").map_err(|_| {
                    anyhow::anyhow!("Set JWT_PRIVATE_KEY and JWT_PUBLIC_KEY, or JWT_SECRET")
                })?;
                if secret.is_empty() {
                    anyhow::bail!("JWT_SECRET must not be empty");
                }
                JwtKeys::Secret(secret)
            }
        };

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);

        Ok(JwtConfig {
            keys,
            access_token_expiry,
        })
    }

    #[cfg(test)]
    pub fn with_secret(secret: &str, access_token_expiry: u64) -> Self {
        Self {
            keys: JwtKeys::Secret(secret.to_string()),
            access_token_expiry,
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Issues and validates access tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    access_token_expiry: u64,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> anyhow::Result<Self> {
        let (encoding_key, decoding_key, algorithm) = match &config.keys {
            JwtKeys::Rsa {
                private_key,
                public_key,
            } => (
                EncodingKey::from_rsa_pem(private_key.as_bytes())?,
                DecodingKey::from_rsa_pem(public_key.as_bytes())?,
                Algorithm::RS256,
            ),
            JwtKeys::Secret(secret) => (
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
                Algorithm::HS256,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            algorithm,
            validation,
            access_token_expiry: config.access_token_expiry,
        })
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
            .as_secs();

        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now + self.access_token_expiry,
        };

        Ok(encode(
            &Header::new(self.algorithm),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> anyhow::Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    pub fn access_token_expiry(&self) -> u64 {
        self.access_token_expiry
    }
}
