/// Authentication extractors
use crate::{
    account::device::device_model,
    context::AppContext,
    db::account::{Account, DeviceSession},
    error::WardenError,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::USER_AGENT, request::Parts},
};
use axum_extra::extract::CookieJar;
use std::convert::Infallible;

/// Name of the cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Caller resolved from the refresh-token cookie: the account and the exact
/// device session holding that token
#[derive(Debug, Clone)]
pub struct RefreshSession {
    pub account: Account,
    pub session: DeviceSession,
}

#[async_trait]
impl FromRequestParts<AppContext> for RefreshSession {
    type Rejection = WardenError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(REFRESH_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(WardenError::NotAuthorized)?;

        let (account, session) = state
            .account_manager
            .resolve_refresh_session(&token)
            .await?;

        Ok(RefreshSession { account, session })
    }
}

/// Device descriptor of the calling client, from its User-Agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDevice(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientDevice {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok());

        Ok(ClientDevice(device_model(user_agent)))
    }
}
