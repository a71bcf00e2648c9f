/// Access/refresh token signing and verification (HS256)
use crate::{
    config::AuthConfig,
    error::{WardenError, WardenResult},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims embedded in both token kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique per token so two pairs minted in the same second differ
    pub jti: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Freshly minted token pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies tokens with the process-wide secret
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: i64::try_from(config.access_token_ttl).unwrap_or(i64::MAX),
            refresh_ttl: i64::try_from(config.refresh_token_ttl).unwrap_or(i64::MAX),
        }
    }

    /// Sign a token of the given kind for an account
    pub fn sign(&self, id: &str, email: &str, kind: TokenKind) -> WardenResult<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let now = Utc::now().timestamp();
        let exp = now
            .checked_add(ttl)
            .ok_or_else(|| WardenError::Jwt("Token lifetime out of range".to_string()))?;

        self.sign_claims(&Claims {
            id: id.to_string(),
            email: email.to_string(),
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        })
    }

    /// Sign an explicit claim set
    pub fn sign_claims(&self, claims: &Claims) -> WardenResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| WardenError::Jwt(format!("Failed to sign token: {}", e)))
    }

    /// Mint an access/refresh pair
    pub fn issue_pair(&self, id: &str, email: &str) -> WardenResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign(id, email, TokenKind::Access)?,
            refresh_token: self.sign(id, email, TokenKind::Refresh)?,
        })
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> WardenResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| WardenError::TokenVerification(e.to_string()))
    }
}

/// Expiry claim read without checking the signature
#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Read a token's `exp` without verifying it
///
/// Only the session sweep uses this. `None` means the claim could not be read,
/// which the sweep treats as expired.
pub fn unverified_expiry(token: &str) -> Option<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims.exp)
        .ok()
}
