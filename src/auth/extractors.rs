use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::cookies::{cookie_value, ACCESS_COOKIE};
use crate::{error::ApiError, state::AppState, users::repo_types::PublicUser};

/// Authenticated caller, resolved from the access token to a sanitized user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub PublicUser);

/// Access token from the `accessToken` cookie, else from `Authorization: Bearer`.
pub fn access_token_from(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = cookie_value(headers, ACCESS_COOKIE) {
        return Some(token);
    }
    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = access_token_from(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

        let claims = state.tokens.verify_access(token).map_err(|e| {
            warn!(error = %e, "access token rejected");
            ApiError::unauthorized("Invalid access token")
        })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

        Ok(AuthUser(user.into()))
    }
}
