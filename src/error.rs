/// Unified error types for Warden
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum WardenError {
    /// Registration with an email that already has an account
    #[error("Such a user already exists")]
    DuplicateAccount,

    /// Unknown email or wrong password; the two are never distinguished
    #[error("Username or password is wrong")]
    InvalidCredentials,

    /// Account permanently blocked by the lockout policy
    #[error("User blocked")]
    AccountBlocked,

    /// Login rejected inside a lockout window
    #[error("Try again in {minutes} minutes")]
    CooldownActive { minutes: i64 },

    /// Refresh attempted from a device other than the one the session was issued to
    #[error("Login from an untrusted device")]
    UntrustedDevice,

    /// Missing, invalid or expired token, or the identity behind it is gone
    #[error("Not authorized")]
    NotAuthorized,

    /// No account holds the supplied reset code
    #[error("Incorrect or outdated link")]
    InvalidOrExpiredLink,

    /// Reset code found but its time box has passed
    #[error("The waiting time has expired. Your link is no longer valid.")]
    ResetLinkExpired,

    /// Signature or expiry check failed
    #[error("Token verification failed: {0}")]
    TokenVerification(String),

    /// Verification request without a token
    #[error("Not token")]
    MissingToken,

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Password hashing errors
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// JWT encoding errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Identity provider errors
    #[error("Identity provider error: {0}")]
    Upstream(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error body shared by the HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub timestamp: String,
    pub path: String,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, message: String, path: String) -> Self {
        Self {
            status_code: status.as_u16(),
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            path,
            message,
        }
    }
}

/// Status and message of an error response, left in the response extensions
/// so the envelope middleware can re-render the body with the request path.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
}

/// Fault returned over the internal RPC transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcFault {
    pub status_code: u16,
    pub message: String,
}

impl WardenError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            WardenError::DuplicateAccount => StatusCode::CONFLICT,
            WardenError::InvalidCredentials
            | WardenError::UntrustedDevice
            | WardenError::NotAuthorized
            | WardenError::TokenVerification(_) => StatusCode::UNAUTHORIZED,
            WardenError::AccountBlocked => StatusCode::LOCKED,
            WardenError::CooldownActive { .. } => {
                StatusCode::from_u16(425).unwrap_or(StatusCode::TOO_MANY_REQUESTS)
            }
            WardenError::InvalidOrExpiredLink
            | WardenError::ResetLinkExpired
            | WardenError::MissingToken
            | WardenError::Validation(_) => StatusCode::BAD_REQUEST,
            WardenError::NotFound(_) => StatusCode::NOT_FOUND,
            WardenError::Upstream(_) => StatusCode::BAD_GATEWAY,
            WardenError::Database(_)
            | WardenError::Hashing(_)
            | WardenError::Jwt(_)
            | WardenError::Internal(_)
            | WardenError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> String {
        match self {
            // Verification details are logged where they happen, never surfaced
            WardenError::TokenVerification(_) => WardenError::NotAuthorized.to_string(),
            WardenError::Upstream(_) => "Identity provider unavailable".to_string(),
            WardenError::Database(_)
            | WardenError::Hashing(_)
            | WardenError::Jwt(_)
            | WardenError::Internal(_)
            | WardenError::Io(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Structured fault for the RPC surface
    pub fn rpc_fault(&self) -> RpcFault {
        RpcFault {
            status_code: self.status().as_u16(),
            message: self.public_message(),
        }
    }
}

/// Convert WardenError to HTTP response
impl IntoResponse for WardenError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let message = self.public_message();
        let body = Json(ErrorEnvelope::new(status, message.clone(), String::new()));

        let mut response = (status, body).into_response();
        response
            .extensions_mut()
            .insert(ErrorReport { status, message });
        response
    }
}

/// Result type alias for Warden operations
pub type WardenResult<T> = Result<T, WardenError>;
