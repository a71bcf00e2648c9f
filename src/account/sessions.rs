/// Device session store
///
/// One row per issued token pair. Refresh rotates the pair in place; logout,
/// the expiry sweep and password resets delete rows.
use crate::{
    account::tokens::{unverified_expiry, TokenPair},
    db::account::DeviceSession,
    error::WardenResult,
};
use chrono::Utc;
use futures::future::join_all;
use sqlx::SqlitePool;
use uuid::Uuid;

const SESSION_COLUMNS: &str =
    "id, account_id, device_model, access_token, refresh_token, created_at, updated_at";

#[derive(Clone)]
pub struct SessionStore {
    db: SqlitePool,
}

impl SessionStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a new session for an account
    pub async fn create(
        &self,
        account_id: &str,
        device_model: Option<&str>,
        tokens: &TokenPair,
    ) -> WardenResult<DeviceSession> {
        let now = Utc::now();
        let session = DeviceSession {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            device_model: device_model.map(str::to_string),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO device_session (id, account_id, device_model, access_token, refresh_token, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&session.id)
        .bind(&session.account_id)
        .bind(&session.device_model)
        .bind(&session.access_token)
        .bind(&session.refresh_token)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.db)
        .await?;

        Ok(session)
    }

    /// All sessions owned by an account
    pub async fn list_for_account(&self, account_id: &str) -> WardenResult<Vec<DeviceSession>> {
        let sessions = sqlx::query_as::<_, DeviceSession>(&format!(
            "SELECT {} FROM device_session WHERE account_id = ?1 ORDER BY created_at",
            SESSION_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(sessions)
    }

    /// Overwrite both tokens of an existing session
    pub async fn update_tokens(&self, session_id: &str, tokens: &TokenPair) -> WardenResult<()> {
        sqlx::query(
            "UPDATE device_session SET access_token = ?1, refresh_token = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(Utc::now())
        .bind(session_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Delete one session
    pub async fn delete(&self, session_id: &str) -> WardenResult<()> {
        sqlx::query("DELETE FROM device_session WHERE id = ?1")
            .bind(session_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Delete sessions whose refresh token has expired
    ///
    /// Each deletion runs independently; a failure is logged and does not
    /// affect the others. Returns how many sessions were removed.
    pub async fn sweep_expired(&self, sessions: &[DeviceSession]) -> usize {
        let now = Utc::now().timestamp();

        let sweeps = sessions.iter().map(|session| async move {
            match unverified_expiry(&session.refresh_token) {
                Some(exp) if exp > now => return false,
                _ => {}
            }

            match self.delete(&session.id).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(session_id = %session.id, error = %e, "failed to delete expired session");
                    false
                }
            }
        });

        let removed = join_all(sweeps).await.into_iter().filter(|r| *r).count();
        if removed > 0 {
            tracing::debug!(removed, "swept expired device sessions");
        }
        removed
    }
}

/// Session holding this exact refresh token, if any
pub fn find_by_refresh_token<'a>(
    sessions: &'a [DeviceSession],
    refresh_token: &str,
) -> Option<&'a DeviceSession> {
    sessions.iter().find(|s| s.refresh_token == refresh_token)
}
