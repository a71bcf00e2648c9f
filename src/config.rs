/// Configuration management for Warden
use crate::error::{WardenError, WardenResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Lowest work factor bcrypt accepts
pub const MIN_BCRYPT_COST: u32 = 4;

/// Highest work factor bcrypt accepts
pub const MAX_BCRYPT_COST: u32 = 31;

/// Upper bound on token lifetimes: ten years
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 86400;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub oauth: Option<GoogleOAuthConfig>,
    pub rpc: RpcConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL of the web client; OAuth callbacks redirect here
    pub client_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub account_db: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl: u64,
    pub bcrypt_cost: u32,
}

/// Google OAuth client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

/// Internal RPC listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub enabled: bool,
    pub hostname: String,
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> WardenResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("WARDEN_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("WARDEN_PORT")
            .unwrap_or_else(|_| "3333".to_string())
            .parse()
            .map_err(|_| WardenError::Validation("Invalid port number".to_string()))?;
        let client_url = env::var("WARDEN_CLIENT_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let data_directory: PathBuf = env::var("WARDEN_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let account_db = env::var("WARDEN_ACCOUNT_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("account.sqlite"));

        let jwt_secret = env::var("WARDEN_JWT_SECRET")
            .map_err(|_| WardenError::Validation("JWT secret required".to_string()))?;
        let access_token_ttl = parse_duration_secs(
            &env::var("WARDEN_JWT_EXPIRE_ACCESS_TOKEN").unwrap_or_else(|_| "15m".to_string()),
        )?;
        let refresh_token_ttl = parse_duration_secs(
            &env::var("WARDEN_JWT_EXPIRE_REFRESH_TOKEN").unwrap_or_else(|_| "7d".to_string()),
        )?;
        let bcrypt_cost = env::var("WARDEN_BCRYPT_COST")
            .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
            .parse()
            .map_err(|_| WardenError::Validation("Invalid bcrypt cost".to_string()))?;

        // Google login is only offered when a client is configured
        let oauth = match (
            env::var("WARDEN_GOOGLE_CLIENT_ID"),
            env::var("WARDEN_GOOGLE_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                callback_url: env::var("WARDEN_GOOGLE_CALLBACK_URL").unwrap_or_else(|_| {
                    format!("http://localhost:{}/api/auth/google/callback", port)
                }),
            }),
            _ => None,
        };

        let rpc_enabled = env::var("WARDEN_RPC_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let rpc_hostname =
            env::var("WARDEN_RPC_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let rpc_port = env::var("WARDEN_RPC_PORT")
            .unwrap_or_else(|_| "3334".to_string())
            .parse()
            .map_err(|_| WardenError::Validation("Invalid RPC port number".to_string()))?;

        let log_level = env::var("WARDEN_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                client_url,
            },
            storage: StorageConfig {
                data_directory,
                account_db,
            },
            authentication: AuthConfig {
                jwt_secret,
                access_token_ttl,
                refresh_token_ttl,
                bcrypt_cost,
            },
            oauth,
            rpc: RpcConfig {
                enabled: rpc_enabled,
                hostname: rpc_hostname,
                port: rpc_port,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> WardenResult<()> {
        if self.service.hostname.is_empty() {
            return Err(WardenError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(WardenError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        for ttl in [
            self.authentication.access_token_ttl,
            self.authentication.refresh_token_ttl,
        ] {
            if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl) {
                return Err(WardenError::Validation(format!(
                    "Token lifetimes must be between 1 and {} seconds",
                    MAX_TOKEN_TTL_SECS
                )));
            }
        }

        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.authentication.bcrypt_cost) {
            return Err(WardenError::Validation(format!(
                "bcrypt cost must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            )));
        }

        Ok(())
    }
}

/// Parse a lifetime given as plain seconds or with an `s`/`m`/`h`/`d` suffix
pub fn parse_duration_secs(value: &str) -> WardenResult<u64> {
    let value = value.trim();
    let invalid = || WardenError::Validation(format!("Invalid duration: {:?}", value));

    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 's')) => (&value[..idx], 1),
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 'h')) => (&value[..idx], 3600),
        Some((idx, 'd')) => (&value[..idx], 86400),
        Some(_) => (value, 1),
        None => return Err(invalid()),
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}
