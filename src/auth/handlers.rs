use std::path::Path;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use serde_json::Value;
use tracing::{instrument, warn};

use super::{
    cookies::{clear_session_cookies, cookie_value, set_session_cookies, REFRESH_COOKIE},
    dto::{ChangePasswordRequest, LoginData, LoginRequest, RefreshRequest, TokensData},
    extractors::AuthUser,
    session::Registration,
};
use crate::{
    error::{ApiError, ApiResult},
    extract::{Json, Multipart},
    response::ApiResponse,
    state::AppState,
    storage::UploadedAsset,
    uploads::{roll_back_uploads, upload_staged, MultipartForm},
    users::repo_types::PublicUser,
};

pub fn auth_routes(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/users/register",
            post(register).layer(DefaultBodyLimit::max(upload_limit_bytes)),
        )
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/refresh-token", post(refresh_token))
        .route(
            "/users/change-password",
            post(change_password).patch(change_password),
        )
}

/// POST /users/register (multipart: fullName, email, username, password, avatar, coverImage?)
#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let dir = Path::new(&state.config.upload_dir);
    let mut form = MultipartForm::read(mp, dir, &["avatar", "coverImage"]).await?;

    let reg = Registration::parse(
        form.text("username"),
        form.text("email"),
        form.text("fullName"),
        form.fields.get("password").cloned(),
    )?;
    state.sessions.check_registration(&reg).await?;

    let avatar_file = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    let avatar = upload_staged(state.storage.as_ref(), avatar_file, "avatars")
        .await
        .map_err(|e| {
            warn!(error = %e, "avatar upload failed");
            ApiError::bad_request("Avatar file is required")
        })?;

    // cover image is optional; a failed upload leaves it unset
    let cover = match form.take_file("coverImage") {
        Some(file) => match upload_staged(state.storage.as_ref(), file, "covers").await {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!(error = %e, "cover image upload failed; continuing without it");
                None
            }
        },
        None => None,
    };

    match state.sessions.register(reg, avatar.clone(), cover.clone()).await {
        Ok(user) => Ok(ApiResponse::created(user, "User registered successfully")),
        Err(e) => {
            let uploaded: Vec<&UploadedAsset> =
                std::iter::once(&avatar).chain(cover.as_ref()).collect();
            roll_back_uploads(state.storage.as_ref(), &uploaded).await;
            Err(e)
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<ApiResponse<LoginData>> {
    let outcome = state
        .sessions
        .login(
            payload.username.as_deref(),
            payload.email.as_deref(),
            &payload.password,
        )
        .await?;
    let cookies = set_session_cookies(&outcome.tokens.access_token, &outcome.tokens.refresh_token);
    Ok(ApiResponse::ok(
        LoginData {
            user: outcome.user,
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
        },
        "User logged in successfully",
    )
    .with_headers(cookies))
}

#[instrument(skip(state, user))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<ApiResponse<Value>> {
    state.sessions.logout(user.id).await?;
    Ok(ApiResponse::ok(Value::Object(Default::default()), "User logged out")
        .with_headers(clear_session_cookies()))
}

#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<ApiResponse<TokensData>> {
    let from_body = body.and_then(|Json(b)| b.refresh_token);
    let presented = cookie_value(&headers, REFRESH_COOKIE)
        .map(str::to_string)
        .or(from_body);

    let pair = state.sessions.refresh(presented.as_deref()).await?;
    let cookies = set_session_cookies(&pair.access_token, &pair.refresh_token);
    Ok(ApiResponse::ok(
        TokensData {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        },
        "Access token refreshed",
    )
    .with_headers(cookies))
}

#[instrument(skip(state, user, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<Value>> {
    state
        .sessions
        .change_password(user.id, &payload.old_password, &payload.new_password)
        .await?;
    Ok(ApiResponse::ok(
        Value::Object(Default::default()),
        "Password changed successfully",
    ))
}
