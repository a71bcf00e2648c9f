/// Account manager: the authentication flows
///
/// Composes hashing, lockout, token issuance, the session store and reset
/// codes. Queries are built at runtime with sqlx.
use crate::{
    account::{
        hasher::PasswordHasher,
        lockout,
        reset::ResetCodes,
        sessions::{find_by_refresh_token, SessionStore},
        tokens::{TokenIssuer, TokenPair},
        RegisterRequest,
    },
    config::ServerConfig,
    db::account::{Account, DeviceSession, Profile, SecurityState, ACCOUNT_COLUMNS},
    error::{WardenError, WardenResult},
    identity::FederatedIdentity,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Account as returned to clients; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub profiles: Vec<Profile>,
}

impl AccountView {
    fn new(account: &Account, profiles: Vec<Profile>) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            image: account.image.clone(),
            verified: account.verified,
            created_at: account.created_at,
            profiles,
        }
    }
}

/// Result of a successful register or login
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedAccount {
    #[serde(flatten)]
    pub account: AccountView,
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthenticatedAccount {
    fn new(account: AccountView, tokens: TokenPair) -> Self {
        Self {
            account,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }
}

/// Fields of a new account row
struct NewAccount<'a> {
    email: &'a str,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    image: Option<String>,
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    hasher: Arc<PasswordHasher>,
    tokens: TokenIssuer,
    sessions: SessionStore,
    resets: ResetCodes,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        let hasher = Arc::new(PasswordHasher::new(config.authentication.bcrypt_cost));

        Self {
            tokens: TokenIssuer::new(&config.authentication),
            sessions: SessionStore::new(db.clone()),
            resets: ResetCodes::new(db.clone(), hasher.clone()),
            hasher,
            db,
        }
    }

    /// Register a new account and open its first device session
    pub async fn register(
        &self,
        request: RegisterRequest,
        device_model: &str,
    ) -> WardenResult<AuthenticatedAccount> {
        if self.get_account_by_email(&request.email).await?.is_some() {
            return Err(WardenError::DuplicateAccount);
        }

        let password_hash = self.hasher.hash(&request.password).await?;
        let account = self
            .insert_account(NewAccount {
                email: &request.email,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
                image: None,
            })
            .await?;

        tracing::info!(account_id = %account.id, "account registered");

        let tokens = self.open_session(&account, device_model).await?;
        Ok(AuthenticatedAccount::new(AccountView::new(&account, Vec::new()), tokens))
    }

    /// Password login
    ///
    /// Unknown email and wrong password produce the same error. Lockout checks
    /// run before the password is looked at.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_model: &str,
    ) -> WardenResult<AuthenticatedAccount> {
        let account = match self.get_account_by_email(email).await? {
            Some(account) => account,
            None => {
                self.hasher.verify_dummy(password).await;
                return Err(WardenError::InvalidCredentials);
            }
        };

        let now = Utc::now();
        if let Err(e) = lockout::check(&account.security, now) {
            tracing::warn!(account_id = %account.id, error = %e, "login rejected by lockout policy");
            return Err(e);
        }

        if !self.hasher.verify(password, &account.password_hash).await? {
            let next = lockout::record_failure(&account.security, device_model, now);
            self.update_security(&account.id, &next).await?;

            if next.is_block {
                tracing::warn!(account_id = %account.id, attempts = ?next.login_attempts, "account blocked after repeated failures");
            } else if next.login_time != account.security.login_time {
                tracing::warn!(account_id = %account.id, attempts = ?next.login_attempts, "lockout window opened");
            } else {
                tracing::info!(account_id = %account.id, attempts = ?next.login_attempts, "failed login");
            }

            return Err(WardenError::InvalidCredentials);
        }

        self.update_security(&account.id, &lockout::cleared(&account.security))
            .await?;

        self.sweep_sessions(&account.id).await?;
        let tokens = self.open_session(&account, device_model).await?;
        let profiles = self.list_profiles(&account.id).await?;

        tracing::debug!(account_id = %account.id, device = device_model, "login succeeded");

        Ok(AuthenticatedAccount::new(AccountView::new(&account, profiles), tokens))
    }

    /// Login with an identity already verified by an external provider
    ///
    /// Only the block flag is checked; no password is evaluated so lockout
    /// accounting is untouched.
    pub async fn federated_login(
        &self,
        identity: FederatedIdentity,
        device_model: &str,
    ) -> WardenResult<AuthenticatedAccount> {
        if let Some(account) = self.get_account_by_email(&identity.email).await? {
            if let Err(e) = lockout::ensure_not_blocked(&account.security) {
                tracing::warn!(account_id = %account.id, "federated login for blocked account");
                return Err(e);
            }

            self.sweep_sessions(&account.id).await?;
            let tokens = self.open_session(&account, device_model).await?;
            let profiles = self.list_profiles(&account.id).await?;

            return Ok(AuthenticatedAccount::new(AccountView::new(&account, profiles), tokens));
        }

        // Random password that is never disclosed
        let password_hash = self.hasher.hash(&Uuid::new_v4().to_string()).await?;
        let account = self
            .insert_account(NewAccount {
                email: &identity.email,
                password_hash,
                first_name: identity.first_name,
                last_name: identity.last_name,
                image: identity.image,
            })
            .await?;

        tracing::info!(account_id = %account.id, "account created from federated identity");

        let tokens = self.open_session(&account, device_model).await?;
        Ok(AuthenticatedAccount::new(AccountView::new(&account, Vec::new()), tokens))
    }

    /// Resolve the account and device session owning a refresh token
    pub async fn resolve_refresh_session(
        &self,
        refresh_token: &str,
    ) -> WardenResult<(Account, DeviceSession)> {
        let claims = self.tokens.verify(refresh_token).map_err(|e| {
            tracing::warn!(error = %e, "refresh token rejected");
            WardenError::NotAuthorized
        })?;

        let account = self
            .get_account(&claims.id)
            .await?
            .ok_or(WardenError::NotAuthorized)?;

        let sessions = self.sessions.list_for_account(&account.id).await?;
        let session = find_by_refresh_token(&sessions, refresh_token)
            .cloned()
            .ok_or(WardenError::NotAuthorized)?;

        Ok((account, session))
    }

    /// Rotate the token pair of a resolved session
    ///
    /// The caller's device descriptor must equal the one the session was
    /// issued to.
    pub async fn refresh(
        &self,
        account: &Account,
        session: &DeviceSession,
        device_model: &str,
    ) -> WardenResult<TokenPair> {
        if session.device_model.as_deref() != Some(device_model) {
            tracing::warn!(
                account_id = %account.id,
                session_id = %session.id,
                expected = ?session.device_model,
                actual = device_model,
                "refresh from untrusted device"
            );
            return Err(WardenError::UntrustedDevice);
        }

        lockout::ensure_not_blocked(&account.security)?;

        let tokens = self.tokens.issue_pair(&account.id, &account.email)?;
        self.sessions.update_tokens(&session.id, &tokens).await?;

        Ok(tokens)
    }

    /// Delete the resolved session only
    pub async fn logout(&self, session: &DeviceSession) -> WardenResult<()> {
        self.sessions.delete(&session.id).await?;
        tracing::debug!(account_id = %session.account_id, session_id = %session.id, "logged out");
        Ok(())
    }

    /// Store a fresh reset code for the account with this email
    pub async fn issue_reset_code(&self, email: &str) -> WardenResult<String> {
        let account = self
            .get_account_by_email(email)
            .await?
            .ok_or_else(|| WardenError::NotFound("Account not found".to_string()))?;

        self.resets.issue(&account.id).await
    }

    /// Consume a reset code and set a new password
    pub async fn restore_password(&self, code: &str, new_password: &str) -> WardenResult<()> {
        self.resets.consume(code, new_password).await
    }

    /// Get account by ID
    pub async fn get_account(&self, id: &str) -> WardenResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    /// Get account by email
    pub async fn get_account_by_email(&self, email: &str) -> WardenResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE email = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    /// Role assignments of an account
    pub async fn list_profiles(&self, account_id: &str) -> WardenResult<Vec<Profile>> {
        let profiles = sqlx::query_as::<_, Profile>(
            "SELECT id, title, role FROM profile WHERE account_id = ?1",
        )
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(profiles)
    }

    async fn update_security(&self, account_id: &str, security: &SecurityState) -> WardenResult<()> {
        sqlx::query(
            "UPDATE account SET login_attempts = ?1, login_time = ?2, is_block = ?3, device_try = ?4 WHERE id = ?5",
        )
        .bind(security.login_attempts)
        .bind(security.login_time)
        .bind(security.is_block)
        .bind(&security.device_try)
        .bind(account_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn insert_account(&self, new: NewAccount<'_>) -> WardenResult<Account> {
        let account = Account {
            id: Uuid::new_v4().to_string(),
            email: new.email.to_string(),
            password_hash: new.password_hash,
            first_name: Some(new.first_name.unwrap_or_else(default_first_name)),
            last_name: new.last_name,
            image: new.image,
            verified: false,
            created_at: Utc::now(),
            security: SecurityState::default(),
            actions: Default::default(),
        };

        let result = sqlx::query(
            "INSERT INTO account (id, email, password_hash, first_name, last_name, image, verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.image)
        .bind(account.verified)
        .bind(account.created_at)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(account),
            // Concurrent registration with the same email
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(WardenError::DuplicateAccount)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn sweep_sessions(&self, account_id: &str) -> WardenResult<()> {
        let existing = self.sessions.list_for_account(account_id).await?;
        self.sessions.sweep_expired(&existing).await;
        Ok(())
    }

    async fn open_session(&self, account: &Account, device_model: &str) -> WardenResult<TokenPair> {
        let tokens = self.tokens.issue_pair(&account.id, &account.email)?;
        let device_model = (!device_model.is_empty()).then_some(device_model);
        self.sessions.create(&account.id, device_model, &tokens).await?;
        Ok(tokens)
    }
}

/// `user` followed by five random digits
fn default_first_name() -> String {
    format!("user{}", rand::thread_rng().gen_range(10000..100000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::tokens::Claims;
    use crate::testing::{insert_profile, test_manager, TEST_PASSWORD};
    use chrono::Duration;

    const DEVICE: &str = "Linux Linux Chrome";

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            password: TEST_PASSWORD.to_string(),
        }
    }

    async fn registered(manager: &AccountManager) -> AuthenticatedAccount {
        manager
            .register(register_request("a@x.com"), DEVICE)
            .await
            .unwrap()
    }

    async fn fail_logins(manager: &AccountManager, n: usize) {
        for _ in 0..n {
            assert!(matches!(
                manager.login("a@x.com", "Wrongpass1", DEVICE).await,
                Err(WardenError::InvalidCredentials)
            ));
        }
    }

    async fn security_of(manager: &AccountManager, email: &str) -> SecurityState {
        manager
            .get_account_by_email(email)
            .await
            .unwrap()
            .unwrap()
            .security
    }

    async fn sessions_of(manager: &AccountManager, account_id: &str) -> Vec<DeviceSession> {
        manager.sessions.list_for_account(account_id).await.unwrap()
    }

    /// Move the lockout window start back in time
    async fn rewind_login_time(manager: &AccountManager, by: Duration) {
        let security = security_of(manager, "a@x.com").await;
        let moved = SecurityState {
            login_time: security.login_time.map(|t| t - by),
            ..security
        };
        let account = manager.get_account_by_email("a@x.com").await.unwrap().unwrap();
        manager.update_security(&account.id, &moved).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_scrubs_password_and_issues_tokens() {
        let manager = test_manager().await;
        let result = registered(&manager).await;

        assert_eq!(result.account.email, "a@x.com");
        assert_eq!(result.account.first_name.as_deref(), Some("Jane"));
        assert_eq!(result.account.last_name.as_deref(), Some("Doe"));

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("accessToken").is_some());

        let claims = manager.tokens.verify(&result.access_token).unwrap();
        assert_eq!(claims.id, result.account.id);
        assert_eq!(claims.email, "a@x.com");
        manager.tokens.verify(&result.refresh_token).unwrap();

        let sessions = sessions_of(&manager, &result.account.id).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].device_model.as_deref(), Some(DEVICE));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let manager = test_manager().await;
        registered(&manager).await;

        assert!(matches!(
            manager.register(register_request("a@x.com"), DEVICE).await,
            Err(WardenError::DuplicateAccount)
        ));
    }

    #[tokio::test]
    async fn test_register_default_first_name() {
        let manager = test_manager().await;
        let mut request = register_request("b@x.com");
        request.first_name = None;

        let result = manager.register(request, DEVICE).await.unwrap();
        let name = result.account.first_name.unwrap();
        assert!(name.starts_with("user"));
        assert_eq!(name.len(), 9);
        assert!(name[4..].parse::<u32>().unwrap() >= 10000);
    }

    #[tokio::test]
    async fn test_login_success_opens_new_session() {
        let manager = test_manager().await;
        let reg = registered(&manager).await;
        insert_profile(&manager.db, &reg.account.id, "student").await;

        let result = manager.login("a@x.com", TEST_PASSWORD, DEVICE).await.unwrap();
        assert_eq!(result.account.id, reg.account.id);
        assert_eq!(result.account.profiles.len(), 1);
        assert_eq!(result.account.profiles[0].role, "student");

        assert_eq!(sessions_of(&manager, &reg.account.id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let manager = test_manager().await;
        registered(&manager).await;

        let unknown = manager.login("nobody@x.com", TEST_PASSWORD, DEVICE).await.unwrap_err();
        let wrong = manager.login("a@x.com", "Wrongpass1", DEVICE).await.unwrap_err();

        assert!(matches!(unknown, WardenError::InvalidCredentials));
        assert!(matches!(wrong, WardenError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.status(), wrong.status());
    }

    #[tokio::test]
    async fn test_failed_login_records_attempt_and_device() {
        let manager = test_manager().await;
        registered(&manager).await;
        fail_logins(&manager, 1).await;

        let security = security_of(&manager, "a@x.com").await;
        assert_eq!(security.login_attempts, Some(1));
        assert_eq!(security.device_try.as_deref(), Some(DEVICE));
        assert!(security.login_time.is_none());
    }

    #[tokio::test]
    async fn test_sixth_attempt_within_hour_is_cooldown_even_with_correct_password() {
        let manager = test_manager().await;
        registered(&manager).await;
        fail_logins(&manager, 5).await;

        match manager.login("a@x.com", TEST_PASSWORD, DEVICE).await {
            Err(WardenError::CooldownActive { minutes }) => {
                assert!(minutes > 0 && minutes <= 60, "minutes = {}", minutes)
            }
            other => panic!("Expected cooldown, got {:?}", other.map(|r| r.account.id)),
        }

        // Password was not checked, so nothing was counted
        assert_eq!(security_of(&manager, "a@x.com").await.login_attempts, Some(5));
    }

    #[tokio::test]
    async fn test_login_allowed_after_window_elapses() {
        let manager = test_manager().await;
        registered(&manager).await;
        fail_logins(&manager, 5).await;
        rewind_login_time(&manager, Duration::hours(1)).await;

        manager.login("a@x.com", TEST_PASSWORD, DEVICE).await.unwrap();
    }

    #[tokio::test]
    async fn test_fifteenth_failure_blocks_permanently() {
        let manager = test_manager().await;
        registered(&manager).await;

        fail_logins(&manager, 5).await;
        rewind_login_time(&manager, Duration::hours(2)).await;
        fail_logins(&manager, 5).await;
        rewind_login_time(&manager, Duration::hours(2)).await;
        fail_logins(&manager, 4).await;
        assert!(!security_of(&manager, "a@x.com").await.is_block);

        fail_logins(&manager, 1).await;
        let security = security_of(&manager, "a@x.com").await;
        assert_eq!(security.login_attempts, Some(15));
        assert!(security.is_block);

        assert!(matches!(
            manager.login("a@x.com", TEST_PASSWORD, DEVICE).await,
            Err(WardenError::AccountBlocked)
        ));
        assert!(matches!(
            manager.login("a@x.com", "Wrongpass1", DEVICE).await,
            Err(WardenError::AccountBlocked)
        ));
    }

    #[tokio::test]
    async fn test_success_resets_attempt_counter() {
        let manager = test_manager().await;
        registered(&manager).await;
        fail_logins(&manager, 3).await;

        manager.login("a@x.com", TEST_PASSWORD, DEVICE).await.unwrap();
        let security = security_of(&manager, "a@x.com").await;
        assert_eq!(security.login_attempts, None);
        assert_eq!(security.login_time, None);

        fail_logins(&manager, 1).await;
        assert_eq!(security_of(&manager, "a@x.com").await.login_attempts, Some(1));
    }

    #[tokio::test]
    async fn test_login_sweeps_expired_sessions() {
        let manager = test_manager().await;
        let reg = registered(&manager).await;

        let now = Utc::now().timestamp();
        let stale = manager
            .tokens
            .sign_claims(&Claims {
                id: reg.account.id.clone(),
                email: "a@x.com".to_string(),
                iat: now - 100,
                exp: now - 10,
                jti: Uuid::new_v4().to_string(),
            })
            .unwrap();
        manager
            .sessions
            .create(
                &reg.account.id,
                Some(DEVICE),
                &TokenPair {
                    access_token: stale.clone(),
                    refresh_token: stale.clone(),
                },
            )
            .await
            .unwrap();
        assert_eq!(sessions_of(&manager, &reg.account.id).await.len(), 2);

        manager.login("a@x.com", TEST_PASSWORD, DEVICE).await.unwrap();

        let sessions = sessions_of(&manager, &reg.account.id).await;
        assert_eq!(sessions.len(), 2);
        assert!(find_by_refresh_token(&sessions, &stale).is_none());
    }

    #[tokio::test]
    async fn test_login_survives_failed_sweep() {
        let manager = test_manager().await;
        let reg = registered(&manager).await;

        let now = Utc::now().timestamp();
        let mut stale_tokens = Vec::new();
        for age in [10, 20] {
            let stale = manager
                .tokens
                .sign_claims(&Claims {
                    id: reg.account.id.clone(),
                    email: "a@x.com".to_string(),
                    iat: now - age - 100,
                    exp: now - age,
                    jti: Uuid::new_v4().to_string(),
                })
                .unwrap();
            let session = manager
                .sessions
                .create(
                    &reg.account.id,
                    Some(DEVICE),
                    &TokenPair {
                        access_token: stale.clone(),
                        refresh_token: stale.clone(),
                    },
                )
                .await
                .unwrap();
            stale_tokens.push((session.id, stale));
        }

        sqlx::query(&format!(
            "CREATE TRIGGER keep_session BEFORE DELETE ON device_session
             WHEN old.id = '{}' BEGIN SELECT RAISE(ABORT, 'locked'); END",
            stale_tokens[0].0
        ))
        .execute(&manager.db)
        .await
        .unwrap();

        manager.login("a@x.com", TEST_PASSWORD, DEVICE).await.unwrap();

        // Registration session, the undeletable one, and the new login
        let sessions = sessions_of(&manager, &reg.account.id).await;
        assert_eq!(sessions.len(), 3);
        assert!(find_by_refresh_token(&sessions, &stale_tokens[0].1).is_some());
        assert!(find_by_refresh_token(&sessions, &stale_tokens[1].1).is_none());
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_old_token_dies() {
        let manager = test_manager().await;
        let reg = registered(&manager).await;

        let (account, session) = manager
            .resolve_refresh_session(&reg.refresh_token)
            .await
            .unwrap();
        let rotated = manager.refresh(&account, &session, DEVICE).await.unwrap();
        assert_ne!(rotated.refresh_token, reg.refresh_token);

        // Same row was updated
        let sessions = sessions_of(&manager, &account.id).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, session.id);

        assert!(matches!(
            manager.resolve_refresh_session(&reg.refresh_token).await,
            Err(WardenError::NotAuthorized)
        ));
        manager
            .resolve_refresh_session(&rotated.refresh_token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_from_other_device_is_untrusted() {
        let manager = test_manager().await;
        let reg = registered(&manager).await;

        let (account, session) = manager
            .resolve_refresh_session(&reg.refresh_token)
            .await
            .unwrap();
        assert!(matches!(
            manager.refresh(&account, &session, "iPhone iOS Safari").await,
            Err(WardenError::UntrustedDevice)
        ));
    }

    #[tokio::test]
    async fn test_refresh_checks_device_before_block() {
        let manager = test_manager().await;
        let reg = registered(&manager).await;
        let (account, session) = manager
            .resolve_refresh_session(&reg.refresh_token)
            .await
            .unwrap();

        let blocked = SecurityState {
            is_block: true,
            ..SecurityState::default()
        };
        manager.update_security(&account.id, &blocked).await.unwrap();
        let (account, _) = manager
            .resolve_refresh_session(&reg.refresh_token)
            .await
            .unwrap();

        assert!(matches!(
            manager.refresh(&account, &session, "iPhone iOS Safari").await,
            Err(WardenError::UntrustedDevice)
        ));
        assert!(matches!(
            manager.refresh(&account, &session, DEVICE).await,
            Err(WardenError::AccountBlocked)
        ));
    }

    #[tokio::test]
    async fn test_resolve_rejects_garbage_token() {
        let manager = test_manager().await;
        assert!(matches!(
            manager.resolve_refresh_session("garbage").await,
            Err(WardenError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_logout_deletes_only_that_session() {
        let manager = test_manager().await;
        let reg = registered(&manager).await;
        let second = manager.login("a@x.com", TEST_PASSWORD, DEVICE).await.unwrap();

        let (_, session) = manager
            .resolve_refresh_session(&reg.refresh_token)
            .await
            .unwrap();
        manager.logout(&session).await.unwrap();

        let sessions = sessions_of(&manager, &reg.account.id).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn test_reset_revokes_every_session_and_old_password() {
        let manager = test_manager().await;
        let reg = registered(&manager).await;
        manager.login("a@x.com", TEST_PASSWORD, DEVICE).await.unwrap();
        manager.login("a@x.com", TEST_PASSWORD, "iPhone iOS Safari").await.unwrap();
        assert_eq!(sessions_of(&manager, &reg.account.id).await.len(), 3);

        let code = manager.issue_reset_code("a@x.com").await.unwrap();
        manager.restore_password(&code, "Newpass12").await.unwrap();

        assert!(sessions_of(&manager, &reg.account.id).await.is_empty());

        let account = manager.get_account(&reg.account.id).await.unwrap().unwrap();
        assert!(!manager.hasher.verify(TEST_PASSWORD, &account.password_hash).await.unwrap());
        assert!(account.actions.code.is_none());
        assert!(account.actions.time_at.is_none());

        assert!(matches!(
            manager.login("a@x.com", TEST_PASSWORD, DEVICE).await,
            Err(WardenError::InvalidCredentials)
        ));
        manager.login("a@x.com", "Newpass12", DEVICE).await.unwrap();
    }

    #[tokio::test]
    async fn test_federated_login_new_account() {
        let manager = test_manager().await;
        let identity = FederatedIdentity {
            email: "g@x.com".to_string(),
            first_name: Some("Gabe".to_string()),
            last_name: None,
            image: Some("https://img.example.com/g.png".to_string()),
        };

        let result = manager.federated_login(identity, DEVICE).await.unwrap();
        assert_eq!(result.account.first_name.as_deref(), Some("Gabe"));
        assert_eq!(result.account.image.as_deref(), Some("https://img.example.com/g.png"));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE email = 'g@x.com'")
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(sessions_of(&manager, &result.account.id).await.len(), 1);

        // The generated password is unknown to everyone
        for guess in ["", TEST_PASSWORD, "Password1"] {
            assert!(matches!(
                manager.login("g@x.com", guess, DEVICE).await,
                Err(WardenError::InvalidCredentials)
            ));
        }
    }

    #[tokio::test]
    async fn test_federated_login_existing_account() {
        let manager = test_manager().await;
        let reg = registered(&manager).await;
        fail_logins(&manager, 2).await;

        let identity = FederatedIdentity {
            email: "a@x.com".to_string(),
            first_name: Some("Other".to_string()),
            last_name: None,
            image: None,
        };
        let result = manager.federated_login(identity, DEVICE).await.unwrap();
        assert_eq!(result.account.id, reg.account.id);
        assert_eq!(result.account.first_name.as_deref(), Some("Jane"));

        // No password was checked, so lockout state is untouched
        assert_eq!(security_of(&manager, "a@x.com").await.login_attempts, Some(2));
        assert_eq!(sessions_of(&manager, &reg.account.id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_federated_login_ignores_cooldown_but_not_block() {
        let manager = test_manager().await;
        registered(&manager).await;
        fail_logins(&manager, 5).await;

        let identity = FederatedIdentity {
            email: "a@x.com".to_string(),
            first_name: None,
            last_name: None,
            image: None,
        };
        manager.federated_login(identity.clone(), DEVICE).await.unwrap();

        let account = manager.get_account_by_email("a@x.com").await.unwrap().unwrap();
        let blocked = SecurityState {
            is_block: true,
            ..account.security
        };
        manager.update_security(&account.id, &blocked).await.unwrap();

        assert!(matches!(
            manager.federated_login(identity, DEVICE).await,
            Err(WardenError::AccountBlocked)
        ));
    }

    #[tokio::test]
    async fn test_issue_reset_code_for_unknown_email() {
        let manager = test_manager().await;
        assert!(matches!(
            manager.issue_reset_code("nobody@x.com").await,
            Err(WardenError::NotFound(_))
        ));
    }
}
