/// API routes and handlers
pub mod auth;
pub mod middleware;

use crate::{context::AppContext, error::WardenError};
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json, Router,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// Build API routes, mounted under `/api`
pub fn routes() -> Router<AppContext> {
    Router::new().nest("/auth", auth::routes())
}

/// JSON body that has passed its `validator` rules
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = WardenError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| WardenError::Validation(e.body_text()))?;

        value
            .validate()
            .map_err(|e| WardenError::Validation(e.to_string()))?;

        Ok(ValidatedJson(value))
    }
}
