use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use tracing::debug;

use super::AuthError;
use crate::error::AppError;
use crate::http_api::AppState;
use crate::models::User;

/// The authenticated caller; rejects the request with 401 otherwise.
pub struct CurrentUser(pub User);

/// The caller if a valid bearer token was sent, anonymous otherwise.
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let user = resolve_user(state, token).await?;
        Ok(CurrentUser(user))
    }
}

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(MaybeUser(None));
        };
        match resolve_user(state, token).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(e) => {
                debug!("Ignoring unusable bearer token: {}", e);
                Ok(MaybeUser(None))
            }
        }
    }
}

async fn resolve_user(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = state.jwt.decode(token)?;
    let user_id = claims.user_id()?;
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AuthError::UnknownUser.into())
}

/// Extract bearer token from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
