/// Account database models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};

/// Column list matching [`Account::from_row`]
pub const ACCOUNT_COLUMNS: &str = "id, email, password_hash, first_name, last_name, image, verified, created_at,
     login_attempts, login_time, is_block, device_try,
     reset_code, reset_code_at, reset_number_tries";

/// Account record in the database
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub security: SecurityState,
    pub actions: ActionState,
}

/// Lockout bookkeeping owned by an account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityState {
    pub login_attempts: Option<i64>,
    /// Start of the current lockout window
    pub login_time: Option<DateTime<Utc>>,
    /// Terminal until cleared by an operator
    pub is_block: bool,
    /// Device descriptor of the last failed attempt
    pub device_try: Option<String>,
}

/// Password-reset bookkeeping owned by an account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionState {
    pub code: Option<String>,
    pub time_at: Option<DateTime<Utc>>,
    pub number_tries: i64,
}

impl<'r> FromRow<'r, SqliteRow> for Account {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Account {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            image: row.try_get("image")?,
            verified: row.try_get("verified")?,
            created_at: row.try_get("created_at")?,
            security: SecurityState {
                login_attempts: row.try_get("login_attempts")?,
                login_time: row.try_get("login_time")?,
                is_block: row.try_get("is_block")?,
                device_try: row.try_get("device_try")?,
            },
            actions: ActionState {
                code: row.try_get("reset_code")?,
                time_at: row.try_get("reset_code_at")?,
                number_tries: row.try_get("reset_number_tries")?,
            },
        })
    }
}

/// Device session record: the live token pair for one account/device
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DeviceSession {
    pub id: String,
    pub account_id: String,
    pub device_model: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role assignment (read-only here)
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub title: Option<String>,
    pub role: String,
}
