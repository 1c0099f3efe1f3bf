use std::path::Path as FsPath;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, patch},
    Router,
};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{
    repo,
    repo_types::{ChannelProfile, HistoryEntry, PublicUser},
};
use crate::{
    auth::{
        session::{is_valid_email, normalize},
        AuthUser,
    },
    error::{ApiError, ApiResult},
    extract::{Json, Multipart, Path},
    response::ApiResponse,
    state::AppState,
    uploads::{delete_asset_quietly, roll_back_uploads, upload_staged, MultipartForm},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

pub fn user_routes(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/users/current-user", get(current_user))
        .route("/users/update-account", patch(update_account))
        .route(
            "/users/avatar",
            patch(update_avatar).layer(DefaultBodyLimit::max(upload_limit_bytes)),
        )
        .route(
            "/users/cover-image",
            patch(update_cover_image).layer(DefaultBodyLimit::max(upload_limit_bytes)),
        )
        .route("/users/c/:username", get(channel_profile))
        .route("/users/history", get(watch_history))
}

#[instrument(skip_all)]
pub async fn current_user(AuthUser(user): AuthUser) -> ApiResponse<PublicUser> {
    ApiResponse::ok(user, "Current user fetched successfully")
}

#[instrument(skip(state, user, payload))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateAccountRequest>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let full_name = payload
        .full_name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let email = payload
        .email
        .map(|s| normalize(&s))
        .filter(|s| !s.is_empty());
    let (Some(full_name), Some(email)) = (full_name, email) else {
        return Err(ApiError::bad_request("All fields are required"));
    };
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }

    if let Some(other) = state
        .users
        .find_by_username_or_email(None, Some(&email))
        .await?
    {
        if other.id != user.id {
            return Err(ApiError::conflict("Email already in use"));
        }
    }

    let updated = state
        .users
        .update_account(user.id, &full_name, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;
    info!(user_id = %user.id, "account details updated");
    Ok(ApiResponse::ok(
        updated.into(),
        "Account details updated successfully",
    ))
}

#[derive(Clone, Copy)]
enum ProfileImage {
    Avatar,
    Cover,
}

impl ProfileImage {
    fn field(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "avatar",
            ProfileImage::Cover => "coverImage",
        }
    }

    fn folder(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "avatars",
            ProfileImage::Cover => "covers",
        }
    }
}

/// Uploads the new image, stores its URL, then drops the replaced asset.
async fn replace_profile_image(
    state: &AppState,
    user_id: uuid::Uuid,
    mp: Multipart,
    kind: ProfileImage,
) -> ApiResult<PublicUser> {
    let dir = FsPath::new(&state.config.upload_dir);
    let mut form = MultipartForm::read(mp, dir, &[kind.field()]).await?;
    let file = form
        .take_file(kind.field())
        .ok_or_else(|| ApiError::bad_request(format!("{} file is missing", kind.field())))?;

    let previous = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    let asset = upload_staged(state.storage.as_ref(), file, kind.folder()).await?;

    let stored = match kind {
        ProfileImage::Avatar => {
            state
                .users
                .update_avatar(user_id, &asset.url, &asset.public_id)
                .await
        }
        ProfileImage::Cover => {
            state
                .users
                .update_cover_image(user_id, &asset.url, &asset.public_id)
                .await
        }
    }
    .and_then(|u| u.ok_or_else(|| ApiError::not_found("User does not exist")));
    let updated = match stored {
        Ok(user) => user,
        Err(e) => {
            roll_back_uploads(state.storage.as_ref(), &[&asset]).await;
            return Err(e);
        }
    };

    let old_public_id = match kind {
        ProfileImage::Avatar => previous.avatar_public_id,
        ProfileImage::Cover => previous.cover_image_public_id,
    };
    delete_asset_quietly(state.storage.as_ref(), old_public_id.as_deref()).await;

    Ok(updated.into())
}

#[instrument(skip(state, user, mp))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let updated = replace_profile_image(&state, user.id, mp, ProfileImage::Avatar).await?;
    Ok(ApiResponse::ok(updated, "Avatar updated successfully"))
}

#[instrument(skip(state, user, mp))]
pub async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let updated = replace_profile_image(&state, user.id, mp, ProfileImage::Cover).await?;
    Ok(ApiResponse::ok(updated, "Cover image updated successfully"))
}

#[instrument(skip(state, user))]
pub async fn channel_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(username): Path<String>,
) -> ApiResult<ApiResponse<ChannelProfile>> {
    let username = normalize(&username);
    if username.is_empty() {
        return Err(ApiError::bad_request("Username is missing"));
    }
    let profile = repo::channel_profile(&state.db, &username, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;
    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

#[instrument(skip(state, user))]
pub async fn watch_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<ApiResponse<Vec<HistoryEntry>>> {
    let history = repo::watch_history(&state.db, user.id).await?;
    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
