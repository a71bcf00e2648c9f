/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db,
    error::{WardenError, WardenResult},
    identity::{GoogleProvider, IdentityProvider},
    rpc::ProtectService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub account_db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub protect: Arc<ProtectService>,
    /// Absent when no OAuth client is configured
    pub identity_provider: Option<Arc<dyn IdentityProvider>>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> WardenResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let account_db =
            db::create_pool(&config.storage.account_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&account_db).await?;
        db::test_connection(&account_db).await?;

        let identity_provider: Option<Arc<dyn IdentityProvider>> = match &config.oauth {
            Some(oauth) => {
                tracing::info!("Google sign-in enabled");
                let provider: Arc<dyn IdentityProvider> =
                    Arc::new(GoogleProvider::new(oauth.clone())?);
                Some(provider)
            }
            None => {
                tracing::info!("Google sign-in disabled - no OAuth client configured");
                None
            }
        };

        Ok(Self::with_pool(config, account_db, identity_provider))
    }

    /// Build the context around an existing pool
    pub fn with_pool(
        config: ServerConfig,
        account_db: SqlitePool,
        identity_provider: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        let config = Arc::new(config);
        let account_manager = Arc::new(AccountManager::new(account_db.clone(), config.clone()));
        let protect = Arc::new(ProtectService::new(
            account_db.clone(),
            &config.authentication,
        ));

        Self {
            config,
            account_db,
            account_manager,
            protect,
            identity_provider,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> WardenResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                WardenError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Configured identity provider, or 404 when sign-in is disabled
    pub fn identity_provider(&self) -> WardenResult<&Arc<dyn IdentityProvider>> {
        self.identity_provider
            .as_ref()
            .ok_or_else(|| WardenError::NotFound("Google sign-in is not configured".to_string()))
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
