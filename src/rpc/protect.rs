/// Token verification for other internal services
use crate::{
    account::tokens::TokenIssuer,
    config::AuthConfig,
    db::account::Profile,
    error::{WardenError, WardenResult},
};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Non-sensitive projection of an account plus its roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedAccount {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image: Option<String>,
    pub email: String,
    pub verified: bool,
    pub profiles: Vec<Profile>,
}

pub struct ProtectService {
    db: SqlitePool,
    tokens: TokenIssuer,
}

impl ProtectService {
    pub fn new(db: SqlitePool, config: &AuthConfig) -> Self {
        Self {
            db,
            tokens: TokenIssuer::new(config),
        }
    }

    /// Verify a bearer token and return the identity behind it
    pub async fn check_auth(&self, token: &str) -> WardenResult<VerifiedAccount> {
        if token.is_empty() {
            return Err(WardenError::MissingToken);
        }

        let claims = self.tokens.verify(token).map_err(|e| {
            tracing::warn!(error = %e, "check-auth token rejected");
            WardenError::NotAuthorized
        })?;

        let row = sqlx::query(
            "SELECT id, first_name, last_name, image, email, verified FROM account WHERE id = ?1",
        )
        .bind(&claims.id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(WardenError::NotAuthorized)?;

        let profiles = sqlx::query_as::<_, Profile>(
            "SELECT id, title, role FROM profile WHERE account_id = ?1",
        )
        .bind(&claims.id)
        .fetch_all(&self.db)
        .await?;

        Ok(VerifiedAccount {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            image: row.try_get("image")?,
            email: row.try_get("email")?,
            verified: row.try_get("verified")?,
            profiles,
        })
    }
}
