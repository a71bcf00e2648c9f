/// Password reset codes
///
/// A code is single-use and valid for five minutes after issuance. Consuming
/// it replaces the password, clears the code and deletes every device session
/// of the account in a single transaction.
use crate::{
    account::{hasher::PasswordHasher, lockout},
    db::account::{Account, ACCOUNT_COLUMNS},
    error::{WardenError, WardenResult},
};
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::SqlitePool;
use std::sync::Arc;

pub const RESET_CODE_LENGTH: usize = 32;

/// How long an issued code stays valid (inclusive)
pub fn reset_code_lifetime() -> Duration {
    Duration::minutes(5)
}

/// Generate an opaque alphanumeric code
pub fn generate_reset_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_CODE_LENGTH)
        .map(char::from)
        .collect()
}

pub struct ResetCodes {
    db: SqlitePool,
    hasher: Arc<PasswordHasher>,
}

impl ResetCodes {
    pub fn new(db: SqlitePool, hasher: Arc<PasswordHasher>) -> Self {
        Self { db, hasher }
    }

    /// Store a fresh code for the account, replacing any previous one
    pub async fn issue(&self, account_id: &str) -> WardenResult<String> {
        self.issue_at(account_id, Utc::now()).await
    }

    pub(crate) async fn issue_at(
        &self,
        account_id: &str,
        issued_at: DateTime<Utc>,
    ) -> WardenResult<String> {
        let code = generate_reset_code();

        let result = sqlx::query(
            "UPDATE account SET reset_code = ?1, reset_code_at = ?2, reset_number_tries = 0 WHERE id = ?3",
        )
        .bind(&code)
        .bind(issued_at)
        .bind(account_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WardenError::NotFound(format!("Account {} not found", account_id)));
        }

        Ok(code)
    }

    /// Consume a code and set a new password
    pub async fn consume(&self, code: &str, new_password: &str) -> WardenResult<()> {
        self.consume_at(code, new_password, Utc::now()).await
    }

    pub(crate) async fn consume_at(
        &self,
        code: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> WardenResult<()> {
        let account = self
            .find_by_code(code)
            .await?
            .ok_or(WardenError::InvalidOrExpiredLink)?;

        lockout::ensure_not_blocked(&account.security)?;

        match account.actions.time_at {
            Some(issued) if now - issued <= reset_code_lifetime() => {}
            _ => return Err(WardenError::ResetLinkExpired),
        }

        // Hash before opening the transaction so the write lock is held briefly
        let password_hash = self.hasher.hash(new_password).await?;

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            "UPDATE account
             SET password_hash = ?1, reset_code = NULL, reset_code_at = NULL, reset_number_tries = 0
             WHERE id = ?2 AND reset_code = ?3",
        )
        .bind(&password_hash)
        .bind(&account.id)
        .bind(code)
        .execute(&mut *tx)
        .await?;

        // Lost a race with a concurrent consume of the same code
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(WardenError::InvalidOrExpiredLink);
        }

        let sessions = sqlx::query("DELETE FROM device_session WHERE account_id = ?1")
            .bind(&account.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::info!(account_id = %account.id, sessions, "password reset, all sessions revoked");

        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> WardenResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE reset_code = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }
}
