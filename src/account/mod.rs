/// Account management system
///
/// Registration, password and federated login, device session rotation,
/// lockout and password reset.

pub mod device;
pub mod hasher;
pub mod lockout;
mod manager;
pub mod reset;
pub mod sessions;
pub mod tokens;

pub use manager::{AccountManager, AuthenticatedAccount};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 30;

/// Account creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 2, max = 30))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 30))]
    pub last_name: Option<String>,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

/// Login request
///
/// No field rules: any well-formed body reaches the credential check, so a
/// malformed email fails the same way as an unknown one.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// New password supplied with a reset code
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RestorePasswordRequest {
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

/// 8-30 ASCII letters or digits with at least one digit and one capital
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LENGTH || password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::new("password_length"));
    }

    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new("password_charset"));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("password_missing_digit"));
    }

    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::new("password_missing_uppercase"));
    }

    Ok(())
}
