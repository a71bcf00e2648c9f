/// /api/auth/* endpoints
use crate::{
    account::{tokens::TokenPair, AuthenticatedAccount, LoginRequest, RegisterRequest, RestorePasswordRequest},
    api::ValidatedJson,
    auth::{ClientDevice, RefreshSession, REFRESH_COOKIE},
    context::AppContext,
    error::{WardenError, WardenResult},
};
use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;

/// Lifetime of the refresh-token cookie
const REFRESH_COOKIE_DAYS: i64 = 7;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/google", get(google_login))
        .route("/google/callback", get(google_callback))
        .route("/refresh", get(refresh))
        .route("/logout", get(logout))
        .route("/restore-pass/:key", patch(restore_password))
}

fn refresh_cookie(token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::days(REFRESH_COOKIE_DAYS))
        .build()
}

async fn register(
    State(ctx): State<AppContext>,
    ClientDevice(device): ClientDevice,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> WardenResult<(StatusCode, CookieJar, Json<AuthenticatedAccount>)> {
    let result = ctx.account_manager.register(req, &device).await?;
    let jar = jar.add(refresh_cookie(result.refresh_token.clone()));

    Ok((StatusCode::CREATED, jar, Json(result)))
}

async fn login(
    State(ctx): State<AppContext>,
    ClientDevice(device): ClientDevice,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> WardenResult<(CookieJar, Json<AuthenticatedAccount>)> {
    let result = ctx
        .account_manager
        .login(&req.email, &req.password, &device)
        .await?;
    let jar = jar.add(refresh_cookie(result.refresh_token.clone()));

    Ok((jar, Json(result)))
}

/// Start the Google handshake
async fn google_login(State(ctx): State<AppContext>) -> WardenResult<impl IntoResponse> {
    let url = ctx.identity_provider()?.authorize_url();
    Ok((StatusCode::FOUND, [(LOCATION, url)]))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

async fn google_callback(
    State(ctx): State<AppContext>,
    ClientDevice(device): ClientDevice,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> WardenResult<impl IntoResponse> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "identity provider declined sign-in");
        return Err(WardenError::NotAuthorized);
    }

    let code = params
        .code
        .ok_or_else(|| WardenError::Validation("Missing authorization code".to_string()))?;

    let identity = ctx.identity_provider()?.exchange(&code).await?;
    let result = ctx.account_manager.federated_login(identity, &device).await?;

    let jar = jar.add(refresh_cookie(result.refresh_token.clone()));
    let location = format!(
        "{}/dashboard?token={}",
        ctx.config.service.client_url.trim_end_matches('/'),
        result.access_token
    );

    Ok((StatusCode::FOUND, jar, [(LOCATION, location)]))
}

async fn refresh(
    State(ctx): State<AppContext>,
    ClientDevice(device): ClientDevice,
    jar: CookieJar,
    caller: RefreshSession,
) -> WardenResult<(CookieJar, Json<TokenPair>)> {
    let tokens = ctx
        .account_manager
        .refresh(&caller.account, &caller.session, &device)
        .await?;
    let jar = jar.add(refresh_cookie(tokens.refresh_token.clone()));

    Ok((jar, Json(tokens)))
}

async fn logout(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    caller: RefreshSession,
) -> WardenResult<(StatusCode, CookieJar)> {
    ctx.account_manager.logout(&caller.session).await?;
    let jar = jar.remove(Cookie::build(REFRESH_COOKIE).path("/"));

    Ok((StatusCode::NO_CONTENT, jar))
}

async fn restore_password(
    State(ctx): State<AppContext>,
    Path(key): Path<String>,
    ValidatedJson(req): ValidatedJson<RestorePasswordRequest>,
) -> WardenResult<StatusCode> {
    ctx.account_manager
        .restore_password(&key, &req.password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
