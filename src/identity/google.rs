/// Google OAuth 2.0 authorization-code flow
use crate::{
    config::GoogleOAuthConfig,
    error::{WardenError, WardenResult},
    identity::{FederatedIdentity, IdentityProvider},
};
use async_trait::async_trait;
use serde::Deserialize;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const SCOPES: &str = "email profile";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OpenID Connect userinfo claims
#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    email_verified: Option<bool>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

impl UserInfo {
    fn into_identity(self) -> WardenResult<FederatedIdentity> {
        let email = self
            .email
            .ok_or_else(|| WardenError::Upstream("Provider did not return an email".to_string()))?;

        if self.email_verified == Some(false) {
            return Err(WardenError::Upstream("Provider email is not verified".to_string()));
        }

        Ok(FederatedIdentity {
            email,
            first_name: self.given_name,
            last_name: self.family_name,
            image: self.picture,
        })
    }
}

pub struct GoogleProvider {
    config: GoogleOAuthConfig,
    http_client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(config: GoogleOAuthConfig) -> WardenResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent("Warden/0.1")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| WardenError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn fetch_access_token(&self, code: &str) -> WardenResult<String> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.callback_url.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http_client
            .post(TOKEN_ENDPOINT)
            .form(&params)
            .send()
            .await
            .map_err(|e| WardenError::Upstream(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(WardenError::Upstream(format!(
                "Token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| WardenError::Upstream(format!("Invalid token response: {}", e)))?;

        Ok(token.access_token)
    }

    async fn fetch_user_info(&self, access_token: &str) -> WardenResult<UserInfo> {
        let response = self
            .http_client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| WardenError::Upstream(format!("Userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(WardenError::Upstream(format!(
                "Userinfo endpoint returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| WardenError::Upstream(format!("Invalid userinfo response: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}",
            AUTHORIZE_ENDPOINT,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.callback_url),
            urlencoding::encode(SCOPES),
        )
    }

    async fn exchange(&self, code: &str) -> WardenResult<FederatedIdentity> {
        if code.is_empty() {
            return Err(WardenError::Validation("Missing authorization code".to_string()));
        }

        let access_token = self.fetch_access_token(code).await?;
        let identity = self.fetch_user_info(&access_token).await?.into_identity()?;

        tracing::debug!(email = %identity.email, "federated identity received");
        Ok(identity)
    }
}
