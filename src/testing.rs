/// Shared fixtures for unit tests
use crate::{
    account::AccountManager,
    config::*,
    context::AppContext,
    db,
    identity::{FederatedIdentity, IdentityProvider},
    error::{WardenError, WardenResult},
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::{path::PathBuf, str::FromStr, sync::Arc};

pub const TEST_PASSWORD: &str = "Abcdef12";
pub const TEST_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Minimal configuration with a cheap bcrypt cost
pub fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 3333,
            client_url: "http://localhost:3000".to_string(),
        },
        storage: StorageConfig {
            data_directory: PathBuf::from("./data"),
            account_db: PathBuf::from(":memory:"),
        },
        authentication: AuthConfig {
            jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 7 * 86400,
            bcrypt_cost: MIN_BCRYPT_COST,
        },
        oauth: None,
        rpc: RpcConfig {
            enabled: false,
            hostname: "127.0.0.1".to_string(),
            port: 3334,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}

/// In-memory database with migrations applied
///
/// A single connection that never expires keeps the in-memory database alive
/// for the whole test.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();

    db::run_migrations(&pool).await.unwrap();
    pool
}

pub async fn test_manager() -> AccountManager {
    AccountManager::new(test_pool().await, Arc::new(test_config()))
}

/// Identity provider returning a fixed identity for any code
pub struct StaticIdentityProvider {
    pub identity: FederatedIdentity,
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    fn authorize_url(&self) -> String {
        "https://accounts.example.com/o/oauth2/auth?client_id=test".to_string()
    }

    async fn exchange(&self, code: &str) -> WardenResult<FederatedIdentity> {
        if code.is_empty() {
            return Err(WardenError::Upstream("empty code".to_string()));
        }
        Ok(self.identity.clone())
    }
}

pub async fn test_context() -> AppContext {
    let identity = FederatedIdentity {
        email: "federated@example.com".to_string(),
        first_name: Some("Fed".to_string()),
        last_name: Some("Erated".to_string()),
        image: None,
    };

    let provider: Arc<dyn IdentityProvider> = Arc::new(StaticIdentityProvider { identity });
    AppContext::with_pool(test_config(), test_pool().await, Some(provider))
}

/// Insert a role assignment for an account
pub async fn insert_profile(pool: &SqlitePool, account_id: &str, role: &str) {
    sqlx::query("INSERT INTO profile (id, account_id, title, role) VALUES (?1, ?2, ?3, ?4)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(account_id)
        .bind(format!("{} profile", role))
        .bind(role)
        .execute(pool)
        .await
        .unwrap();
}
